//! 后台统计看板

use axum::{Json, extract::State};
use chrono::Utc;
use points_ledger::service::dto::PointsStatistics;

use crate::dto::{ApiResponse, DashboardStats};
use crate::error::Result;
use crate::state::AppState;

/// 看板汇总
///
/// GET /api/admin/dashboard/stats
pub async fn dashboard_stats(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<DashboardStats>>> {
    let now = Utc::now();
    let (users, orders, points) = tokio::try_join!(
        state.users.statistics(now),
        state.ledger.order_statistics(now),
        state.query.statistics(),
    )?;

    Ok(Json(ApiResponse::success(DashboardStats {
        users,
        orders,
        points,
    })))
}

/// 积分统计
///
/// GET /api/admin/points/stats
pub async fn points_stats(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<PointsStatistics>>> {
    let stats = state.query.statistics().await?;
    Ok(Json(ApiResponse::success(stats)))
}
