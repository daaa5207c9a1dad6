//! 小程序积分接口

use axum::{
    Extension, Json,
    extract::{Query, State},
};
use chrono::Utc;
use points_ledger::PointsLedgerEntry;
use points_ledger::service::dto::BalanceSummary;
use tracing::instrument;
use validator::Validate;

use crate::auth::Claims;
use crate::dto::{ApiResponse, ConsumePointsRequest, PageResponse, PaginationParams, PointsHistoryQuery};
use crate::error::Result;
use crate::state::AppState;

/// 积分余额概览
///
/// GET /api/points/balance
pub async fn get_balance(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ApiResponse<BalanceSummary>>> {
    let summary = state
        .query
        .balance_summary(claims.subject_id()?, Utc::now())
        .await?;
    Ok(Json(ApiResponse::success(summary)))
}

/// 积分流水，按时间倒序
///
/// GET /api/points/history
pub async fn get_history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<PointsHistoryQuery>,
) -> Result<Json<ApiResponse<PageResponse<PointsLedgerEntry>>>> {
    let page = state
        .query
        .history(
            claims.subject_id()?,
            filter.into(),
            pagination.limit(),
            pagination.offset(),
        )
        .await?;
    Ok(Json(ApiResponse::success(PageResponse::from_page(
        page,
        &pagination,
    ))))
}

/// 积分商城消费
///
/// POST /api/points/consume
#[instrument(skip_all)]
pub async fn consume(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ConsumePointsRequest>,
) -> Result<Json<ApiResponse<PointsLedgerEntry>>> {
    req.validate()?;

    let entry = state
        .engine
        .consume_points(claims.subject_id()?, req.points, req.description.as_deref())
        .await?;
    Ok(Json(ApiResponse::success_with_message(entry, "积分消费成功")))
}
