//! 后台订单管理

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use points_ledger::PaymentOrder;
use points_ledger::service::dto::{OrderFilter, OrderStatistics, RefundResult};
use serde::Serialize;
use tracing::{info, instrument};
use validator::Validate;

use crate::auth::Claims;
use crate::dto::{
    ApiResponse, ExpireOrdersRequest, OrderQueryFilter, PageResponse, PaginationParams,
    RefundRequest,
};
use crate::error::Result;
use crate::state::AppState;

/// 订单列表
///
/// GET /api/admin/orders
pub async fn list_orders(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<OrderQueryFilter>,
) -> Result<Json<ApiResponse<PageResponse<PaymentOrder>>>> {
    let filter = OrderFilter::from(filter);
    let page = state
        .ledger
        .list_orders(&filter, pagination.limit(), pagination.offset())
        .await?;
    Ok(Json(ApiResponse::success(PageResponse::from_page(
        page,
        &pagination,
    ))))
}

/// 订单统计
///
/// GET /api/admin/orders/stats
pub async fn order_stats(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<OrderStatistics>>> {
    let stats = state.ledger.order_statistics(Utc::now()).await?;
    Ok(Json(ApiResponse::success(stats)))
}

/// 订单详情
///
/// GET /api/admin/orders/{order_no}
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_no): Path<String>,
) -> Result<Json<ApiResponse<PaymentOrder>>> {
    let order = state.ledger.get_order(&order_no).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// 订单退款
///
/// POST /api/admin/orders/{order_no}/refund
#[instrument(skip_all)]
pub async fn refund_order(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(order_no): Path<String>,
    Json(req): Json<RefundRequest>,
) -> Result<Json<ApiResponse<RefundResult>>> {
    req.validate()?;

    let operator_id = claims.subject_id()?;
    let result = state
        .ledger
        .refund_order(&order_no, &req.reason, Some(operator_id))
        .await?;

    info!(
        order_no = %order_no,
        operator_id,
        deducted = result.deducted_points,
        "后台退款完成"
    );
    Ok(Json(ApiResponse::success_with_message(result, "退款成功")))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpireOrdersResponse {
    pub expired: u64,
}

/// 手动触发超时订单过期
///
/// POST /api/admin/orders/expire?batchSize=500
#[instrument(skip_all)]
pub async fn expire_orders(
    State(state): State<AppState>,
    Query(req): Query<ExpireOrdersRequest>,
) -> Result<Json<ApiResponse<ExpireOrdersResponse>>> {
    req.validate()?;

    let batch_size = req
        .batch_size
        .unwrap_or(state.config.workers.order_expire_batch_size);
    let expired = state
        .ledger
        .expire_stale_orders(Utc::now(), batch_size)
        .await?;

    Ok(Json(ApiResponse::success(ExpireOrdersResponse { expired })))
}
