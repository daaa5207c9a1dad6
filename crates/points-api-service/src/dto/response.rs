//! 响应 DTO 定义

use chrono::{DateTime, Utc};
use points_ledger::service::dto::{OrderStatistics, Page, PointsStatistics, UserStatistics};
use points_ledger::{PaymentOrder, User};
use serde::Serialize;

use super::request::PaginationParams;
use crate::repository::AdminUser;

/// 分页响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

impl<T> PageResponse<T> {
    pub fn new(items: Vec<T>, total: i64, page: i64, page_size: i64) -> Self {
        let total_pages = if page_size > 0 {
            (total + page_size - 1) / page_size
        } else {
            0
        };

        Self {
            items,
            total,
            page,
            page_size,
            total_pages,
        }
    }

    pub fn empty(page: i64, page_size: i64) -> Self {
        Self::new(Vec::new(), 0, page, page_size)
    }

    /// 由服务层分页结果构造
    pub fn from_page(page: Page<T>, params: &PaginationParams) -> Self {
        Self::new(page.items, page.total, params.page(), params.limit())
    }
}

/// API 统一响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub code: String,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self::success_with_message(data, "操作成功")
    }

    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            code: "SUCCESS".to_string(),
            message: message.into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn success_empty() -> Self {
        Self {
            success: true,
            code: "SUCCESS".to_string(),
            message: "操作成功".to_string(),
            data: None,
        }
    }
}

/// 登录响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse<U> {
    pub token: String,
    pub expires_at: i64,
    pub user: U,
}

/// 管理员信息，不含密码哈希
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserDto {
    pub id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub role: String,
    pub status: String,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<AdminUser> for AdminUserDto {
    fn from(admin: AdminUser) -> Self {
        Self {
            id: admin.id,
            username: admin.username,
            display_name: admin.display_name,
            role: admin.role,
            status: admin.status,
            last_login_at: admin.last_login_at,
            created_at: admin.created_at,
        }
    }
}

/// 创建订单响应
///
/// 小程序拿到订单号后发起支付
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentResponse {
    pub order: PaymentOrder,
    /// 支付成功后预计获得的积分
    pub expected_points: i64,
}

/// 后台用户详情
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetailDto {
    pub user: User,
    pub total_earned: i64,
    pub total_spent: i64,
    pub expiring_soon: i64,
}

/// 看板统计
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub users: UserStatistics,
    pub orders: OrderStatistics,
    pub points: PointsStatistics,
}
