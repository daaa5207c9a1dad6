//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

/// 全局 Prometheus handle，用于渲染指标
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 端点。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    let _ = PROMETHEUS_HANDLE.set(handle.clone());

    register_common_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

/// 注册指标描述（出现在 /metrics 的 HELP 注释中）
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!("http_requests_total", "Total number of HTTP requests");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );

    metrics::describe_counter!("orders_created_total", "Total number of payment orders created");
    metrics::describe_counter!(
        "payment_callbacks_total",
        "Total number of payment gateway notifications by outcome"
    );
    metrics::describe_counter!(
        "payment_confirmations_total",
        "Total number of payment confirmations by outcome"
    );
    metrics::describe_histogram!(
        "payment_confirmation_duration_seconds",
        "Payment confirmation transaction duration in seconds"
    );
    metrics::describe_counter!("points_changes_total", "Total number of points ledger entries");
    metrics::describe_counter!("points_delta_total", "Absolute points moved by source");
    metrics::describe_counter!("orders_expired_total", "Total number of orders expired by the sweep");
    metrics::describe_counter!("points_expired_total", "Total number of points retired by expiry");
    metrics::describe_counter!("rate_limited_total", "Total number of rate limited requests");
    metrics::describe_gauge!("worker_last_run_timestamp", "Unix timestamp of the last worker run");

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 启动指标 HTTP 服务器
async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

/// 获取全局 Prometheus handle（用于自定义渲染）
pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录 HTTP 请求
#[inline]
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str.clone()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str
    )
    .record(duration_secs);
}

/// 记录订单创建
#[inline]
pub fn record_order_created() {
    metrics::counter!("orders_created_total").increment(1);
}

/// 记录支付回调处理结果
#[inline]
pub fn record_payment_callback(trade_state: &str, outcome: &str) {
    metrics::counter!(
        "payment_callbacks_total",
        "trade_state" => trade_state.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// 记录支付确认
#[inline]
pub fn record_payment_confirmation(outcome: &str, duration_secs: f64) {
    metrics::counter!(
        "payment_confirmations_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);

    metrics::histogram!("payment_confirmation_duration_seconds").record(duration_secs);
}

/// 记录积分变动
#[inline]
pub fn record_points_change(source: &str, delta: i64) {
    metrics::counter!("points_changes_total", "source" => source.to_string()).increment(1);
    metrics::counter!("points_delta_total", "source" => source.to_string())
        .increment(delta.unsigned_abs());
}

/// 记录过期订单数量
#[inline]
pub fn record_orders_expired(count: u64) {
    metrics::counter!("orders_expired_total").increment(count);
}

/// 记录过期积分
#[inline]
pub fn record_points_expired(points: u64) {
    metrics::counter!("points_expired_total").increment(points);
}

/// 记录限流触发
#[inline]
pub fn record_rate_limited(tier: &str) {
    metrics::counter!("rate_limited_total", "tier" => tier.to_string()).increment(1);
}

/// 记录 Worker 最近一次运行时间
#[inline]
pub fn set_worker_last_run(worker: &str) {
    metrics::gauge!("worker_last_run_timestamp", "worker" => worker.to_string())
        .set(chrono::Utc::now().timestamp() as f64);
}
