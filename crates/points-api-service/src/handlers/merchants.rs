//! 后台商户管理

use axum::{
    Json,
    extract::{Path, Query, State},
};
use points_ledger::Merchant;
use chrono::Utc;
use points_ledger::service::dto::{MerchantDetailStatistics, MerchantFilter, MerchantStatistics};
use tracing::instrument;
use validator::Validate;

use crate::dto::{
    ApiResponse, CreateMerchantRequest, MerchantQueryFilter, PageResponse, PaginationParams,
    UpdateMerchantRequest,
};
use crate::error::Result;
use crate::state::AppState;

/// 商户列表
///
/// GET /api/admin/merchants
pub async fn list_merchants(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<MerchantQueryFilter>,
) -> Result<Json<ApiResponse<PageResponse<Merchant>>>> {
    let filter = MerchantFilter::from(filter);
    let page = state
        .merchants
        .list(&filter, pagination.limit(), pagination.offset())
        .await?;
    Ok(Json(ApiResponse::success(PageResponse::from_page(
        page,
        &pagination,
    ))))
}

/// 创建商户
///
/// POST /api/admin/merchants
#[instrument(skip_all)]
pub async fn create_merchant(
    State(state): State<AppState>,
    Json(req): Json<CreateMerchantRequest>,
) -> Result<Json<ApiResponse<Merchant>>> {
    req.validate()?;
    let merchant = state.merchants.create(req.into()).await?;
    Ok(Json(ApiResponse::success_with_message(merchant, "商户创建成功")))
}

/// 商户详情
///
/// GET /api/admin/merchants/{id}
pub async fn get_merchant(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Merchant>>> {
    let merchant = state.merchants.get(id).await?;
    Ok(Json(ApiResponse::success(merchant)))
}

/// 更新商户
///
/// PUT /api/admin/merchants/{id}
#[instrument(skip_all)]
pub async fn update_merchant(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateMerchantRequest>,
) -> Result<Json<ApiResponse<Merchant>>> {
    req.validate()?;
    let merchant = state.merchants.update(id, req.into()).await?;
    Ok(Json(ApiResponse::success(merchant)))
}

/// 商户数量统计
///
/// GET /api/admin/merchants/stats
pub async fn merchant_stats(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<MerchantStatistics>>> {
    let stats = state.merchants.statistics().await?;
    Ok(Json(ApiResponse::success(stats)))
}

/// 单个商户的订单概览和近 7 天趋势
///
/// GET /api/admin/merchants/{id}/stats
pub async fn merchant_detail_stats(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<MerchantDetailStatistics>>> {
    let stats = state.merchants.merchant_statistics(id, Utc::now()).await?;
    Ok(Json(ApiResponse::success(stats)))
}
