//! 后台用户管理

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use points_ledger::service::dto::{BalanceVerification, UserFilter};
use points_ledger::{PointsLedgerEntry, User};
use tracing::{info, instrument};
use validator::Validate;

use crate::auth::Claims;
use crate::dto::{
    AdjustPointsRequest, ApiResponse, PageResponse, PaginationParams, UpdateUserStatusRequest,
    UserDetailDto, UserQueryFilter,
};
use crate::error::Result;
use crate::state::AppState;

/// 用户列表
///
/// GET /api/admin/users
pub async fn list_users(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<UserQueryFilter>,
) -> Result<Json<ApiResponse<PageResponse<User>>>> {
    let filter = UserFilter::from(filter);
    let page = state
        .users
        .list(&filter, pagination.limit(), pagination.offset())
        .await?;
    Ok(Json(ApiResponse::success(PageResponse::from_page(
        page,
        &pagination,
    ))))
}

/// 用户详情，附带积分概览
///
/// GET /api/admin/users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<UserDetailDto>>> {
    let user = state.users.get(id).await?;
    let summary = state.query.balance_summary(id, Utc::now()).await?;

    Ok(Json(ApiResponse::success(UserDetailDto {
        user,
        total_earned: summary.total_earned,
        total_spent: summary.total_spent,
        expiring_soon: summary.expiring_soon,
    })))
}

/// 启用或封禁用户
///
/// PUT /api/admin/users/{id}/status
#[instrument(skip_all)]
pub async fn update_user_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateUserStatusRequest>,
) -> Result<Json<ApiResponse<User>>> {
    let user = state.users.update_status(id, req.status).await?;
    info!(user_id = id, status = ?req.status, operator = %claims.sub, "用户状态已变更");
    Ok(Json(ApiResponse::success(user)))
}

/// 手动调整积分
///
/// POST /api/admin/users/{id}/adjust-points
#[instrument(skip_all)]
pub async fn adjust_points(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(req): Json<AdjustPointsRequest>,
) -> Result<Json<ApiResponse<PointsLedgerEntry>>> {
    req.validate()?;

    let entry = state
        .engine
        .adjust_manually(id, req.points, &req.reason, Some(claims.subject_id()?))
        .await?;
    Ok(Json(ApiResponse::success_with_message(entry, "积分调整成功")))
}

/// 余额对账
///
/// GET /api/admin/users/{id}/points/verify
pub async fn verify_points(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<BalanceVerification>>> {
    let verification = state.query.verify_balance(id).await?;
    Ok(Json(ApiResponse::success(verification)))
}
