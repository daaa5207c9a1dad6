//! 积分支付 API 服务入口

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    Router,
    extract::Request,
    http::{HeaderValue, header},
    middleware::{self, Next},
    response::Response,
};
use points_api::{
    auth::{ROLE_ADMIN, hash_password},
    routes,
    state::AppState,
    worker::{OrderExpireWorker, PointsExpireWorker},
};
use points_shared::{
    config::{AppConfig, DEFAULT_JWT_SECRET},
    database::Database,
    observability::{self, middleware as obs_middleware},
};
use tokio::{net::TcpListener, sync::watch};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};
use tracing::{error, info, warn};

const SERVICE_NAME: &str = "points-api-service";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 仅用于本地开发，文件不存在时忽略
    dotenvy::dotenv().ok();

    let config = AppConfig::load(SERVICE_NAME)?;

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!(
        environment = %config.environment,
        "Starting {} on {}",
        SERVICE_NAME,
        config.server_addr()
    );

    check_production_config(&config)?;

    let db = Database::connect(&config.database).await?;
    if config.database.run_migrations {
        db.run_migrations().await?;
    }

    let state = AppState::from_config(db.pool().clone(), config.clone())?;
    bootstrap_admin(&state, &config).await?;

    // 后台 Worker 共用一个关闭信号
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let order_worker = OrderExpireWorker::from_config(state.ledger.clone(), &config.workers);
    let order_shutdown = shutdown_rx.clone();
    let order_handle = tokio::spawn(async move { order_worker.run(order_shutdown).await });

    let points_worker = PointsExpireWorker::from_config(state.engine.clone(), &config.workers);
    let points_shutdown = shutdown_rx;
    let points_handle = tokio::spawn(async move { points_worker.run(points_shutdown).await });

    let app = build_app(state, &config);

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    // 限流按客户端 IP 兜底，需要 ConnectInfo
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if shutdown_tx.send(true).is_err() {
        warn!("后台 Worker 已提前退出");
    }
    for handle in [order_handle, points_handle] {
        if let Err(e) = handle.await {
            error!(error = %e, "后台 Worker 异常退出");
        }
    }

    db.close().await;
    info!("Server shutdown complete");

    Ok(())
}

/// 生产环境拒绝使用开发期的默认配置启动
fn check_production_config(config: &AppConfig) -> anyhow::Result<()> {
    if config.auth.jwt_secret == DEFAULT_JWT_SECRET {
        if config.is_production() {
            anyhow::bail!("生产环境必须通过 POINTS_AUTH__JWT_SECRET 设置 JWT 密钥");
        }
        warn!("Using default JWT secret - set POINTS_AUTH__JWT_SECRET for production");
    }

    if config.is_production() {
        if config.wechat.api_v3_key.is_none() {
            anyhow::bail!("生产环境必须配置 wechat.api_v3_key，支付通知不能以 passthrough 模式处理");
        }
        if config.wechat.mock_payment_enabled {
            anyhow::bail!("生产环境禁止开启模拟支付接口");
        }
    }

    Ok(())
}

/// 管理员表为空时按配置创建初始管理员
async fn bootstrap_admin(state: &AppState, config: &AppConfig) -> anyhow::Result<()> {
    let Some(password) = config.auth.bootstrap_admin_password.as_deref() else {
        return Ok(());
    };

    if state.admins.count().await? > 0 {
        return Ok(());
    }

    let username = &config.auth.bootstrap_admin_username;
    let password_hash = hash_password(password)?;
    if state
        .admins
        .create(username, &password_hash, Some("系统管理员"), ROLE_ADMIN)
        .await?
    {
        info!(username = %username, "已创建初始管理员账号");
    }

    Ok(())
}

fn build_app(state: AppState, config: &AppConfig) -> Router {
    routes::app(state)
        .layer(middleware::from_fn(security_headers))
        .layer(cors_layer(config))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_seconds.max(1),
        )))
        .layer(CompressionLayer::new())
        // 可观测性中间件：请求追踪和指标收集
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
}

/// CORS 配置：通过 POINTS_CORS_ORIGINS 环境变量控制允许的来源
fn cors_layer(config: &AppConfig) -> CorsLayer {
    let allowed_origins = std::env::var("POINTS_CORS_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3001,http://localhost:5173".to_string());

    if allowed_origins == "*" {
        if config.is_production() {
            warn!("POINTS_CORS_ORIGINS=\"*\" 在生产环境中不安全，请设置为具体域名");
        }
        info!("CORS allowed_origins: * (all origins)");
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    info!("CORS allowed_origins: {}", allowed_origins);
    let origins: Vec<_> = allowed_origins
        .split(',')
        .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// 为所有响应注入 HTTP 安全头
async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::STRICT_TRANSPORT_SECURITY,
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
    headers.insert(header::X_XSS_PROTECTION, HeaderValue::from_static("0"));
    response
}

/// 监听关闭信号
///
/// 收到 SIGTERM 或 Ctrl+C 后返回，触发 axum 的优雅关闭流程。
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "注册 Ctrl+C 处理器失败");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "注册 SIGTERM 处理器失败");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
