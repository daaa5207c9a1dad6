//! 路由配置模块
//!
//! 定义所有 REST API 端点的路由映射

use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::{
    handlers,
    middleware::{Access, auth_middleware, rate_limit_middleware, require_role},
    state::AppState,
};

/// 公开路由（无需认证）
fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route("/api/auth/wechat-login", post(handlers::auth::wechat_login))
        .route("/api/auth/admin/login", post(handlers::auth::admin_login))
        .route(
            "/api/payments/notify",
            post(handlers::notify::payment_notify),
        )
}

/// 小程序路由（user 角色）
fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/user-info", get(handlers::auth::user_info))
        .route("/api/payments", post(handlers::payment::create_payment))
        .route(
            "/api/payments/history",
            get(handlers::payment::payment_history),
        )
        .route(
            "/api/payments/mock-success",
            post(handlers::payment::mock_payment_success),
        )
        .route(
            "/api/payments/{order_no}",
            get(handlers::payment::get_payment),
        )
        .route("/api/points/balance", get(handlers::points::get_balance))
        .route("/api/points/history", get(handlers::points::get_history))
        .route("/api/points/consume", post(handlers::points::consume))
        .route_layer(middleware::from_fn(require_role(Access::User)))
}

/// 后台账号自身的操作（admin / operator 均可，含写请求）
fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/admin/logout", post(handlers::auth::admin_logout))
        .route(
            "/api/auth/admin/change-password",
            post(handlers::auth::change_password),
        )
        .route_layer(middleware::from_fn(require_role(Access::Account)))
}

/// 管理员账号管理（仅 admin）
fn admin_only_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/admin/admin-users",
            get(handlers::admin_users::list_admin_users)
                .post(handlers::admin_users::create_admin_user),
        )
        .route(
            "/api/admin/admin-users/{id}",
            get(handlers::admin_users::get_admin_user)
                .put(handlers::admin_users::update_admin_user)
                .delete(handlers::admin_users::delete_admin_user),
        )
        .route(
            "/api/admin/admin-users/{id}/reset-password",
            post(handlers::admin_users::reset_admin_password),
        )
        .route_layer(middleware::from_fn(require_role(Access::Admin)))
}

/// 后台路由（admin / operator，写操作仅 admin）
fn admin_routes() -> Router<AppState> {
    Router::new()
        // 订单
        .route("/api/admin/orders", get(handlers::orders::list_orders))
        .route("/api/admin/orders/stats", get(handlers::orders::order_stats))
        .route(
            "/api/admin/orders/expire",
            post(handlers::orders::expire_orders),
        )
        .route(
            "/api/admin/orders/{order_no}",
            get(handlers::orders::get_order),
        )
        .route(
            "/api/admin/orders/{order_no}/refund",
            post(handlers::orders::refund_order),
        )
        // 用户
        .route("/api/admin/users", get(handlers::users::list_users))
        .route("/api/admin/users/{id}", get(handlers::users::get_user))
        .route(
            "/api/admin/users/{id}/status",
            put(handlers::users::update_user_status),
        )
        .route(
            "/api/admin/users/{id}/adjust-points",
            post(handlers::users::adjust_points),
        )
        .route(
            "/api/admin/users/{id}/points/verify",
            get(handlers::users::verify_points),
        )
        // 积分
        .route("/api/admin/points/stats", get(handlers::stats::points_stats))
        // 商户
        .route(
            "/api/admin/merchants",
            get(handlers::merchants::list_merchants).post(handlers::merchants::create_merchant),
        )
        .route(
            "/api/admin/merchants/stats",
            get(handlers::merchants::merchant_stats),
        )
        .route(
            "/api/admin/merchants/{id}",
            get(handlers::merchants::get_merchant).put(handlers::merchants::update_merchant),
        )
        .route(
            "/api/admin/merchants/{id}/stats",
            get(handlers::merchants::merchant_detail_stats),
        )
        // 看板
        .route(
            "/api/admin/dashboard/stats",
            get(handlers::stats::dashboard_stats),
        )
        .route_layer(middleware::from_fn(require_role(Access::Staff)))
}

/// 构建完整应用路由
///
/// 认证在限流之前执行，限流按用户 ID 计数
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(public_routes())
        .merge(user_routes())
        .merge(account_routes())
        .merge(admin_only_routes())
        .merge(admin_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
