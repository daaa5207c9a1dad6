//! 请求 DTO 定义
//!
//! 所有请求体使用 camelCase，写接口在进入服务层前用 validator 校验

use chrono::{DateTime, Utc};
use points_ledger::models::{MerchantUpdate, NewMerchant};
use points_ledger::service::dto::{LedgerFilter, MerchantFilter, OrderFilter, UserFilter};
use points_ledger::{MerchantStatus, OrderStatus, PointsSource, UserStatus};
use serde::Deserialize;
use validator::Validate;

use crate::auth::{ROLE_ADMIN, ROLE_OPERATOR};

// ==================== 认证 ====================

/// 小程序登录请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WechatLoginRequest {
    /// wx.login 返回的临时 code
    #[validate(length(min = 1, max = 128, message = "code 不能为空"))]
    pub code: String,
    #[validate(length(max = 100, message = "昵称不能超过 100 个字符"))]
    pub nickname: Option<String>,
    #[validate(length(max = 500, message = "头像地址过长"))]
    pub avatar_url: Option<String>,
}

/// 管理员登录请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdminLoginRequest {
    #[validate(length(min = 1, max = 50, message = "用户名长度必须在 1-50 之间"))]
    pub username: String,
    #[validate(length(min = 1, max = 100, message = "密码长度必须在 1-100 之间"))]
    pub password: String,
}

/// 修改本人密码请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, max = 100, message = "原密码不能为空"))]
    pub old_password: String,
    #[validate(length(min = 8, max = 100, message = "新密码长度必须在 8-100 之间"))]
    pub new_password: String,
}

// ==================== 管理员账号 ====================

/// 后台角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminRole {
    Admin,
    Operator,
}

impl AdminRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => ROLE_ADMIN,
            Self::Operator => ROLE_OPERATOR,
        }
    }
}

/// 管理员账号状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminStatus {
    Active,
    Disabled,
}

impl AdminStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Disabled => "disabled",
        }
    }
}

/// 创建管理员请求，未指定角色时为 operator
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAdminUserRequest {
    #[validate(length(min = 3, max = 50, message = "用户名长度必须在 3-50 之间"))]
    pub username: String,
    #[validate(length(min = 8, max = 100, message = "密码长度必须在 8-100 之间"))]
    pub password: String,
    #[validate(length(max = 100, message = "显示名称不能超过 100 个字符"))]
    pub display_name: Option<String>,
    pub role: Option<AdminRole>,
}

/// 更新管理员请求，只更新提供的字段
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAdminUserRequest {
    #[validate(length(max = 100, message = "显示名称不能超过 100 个字符"))]
    pub display_name: Option<String>,
    pub role: Option<AdminRole>,
    pub status: Option<AdminStatus>,
}

/// 重置管理员密码请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(length(min = 8, max = 100, message = "新密码长度必须在 8-100 之间"))]
    pub new_password: String,
}

// ==================== 支付 ====================

/// 创建支付订单请求
///
/// 金额范围由订单服务校验，超出范围返回 INVALID_AMOUNT
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    #[validate(range(min = 1, message = "商户 ID 无效"))]
    pub merchant_id: i64,
    /// 金额（分）
    pub amount: i64,
    #[validate(length(max = 255, message = "订单描述不能超过 255 个字符"))]
    pub description: Option<String>,
}

/// 模拟支付成功请求（开发环境）
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MockPaymentRequest {
    #[validate(length(min = 1, max = 64, message = "订单号不能为空"))]
    pub order_no: String,
}

// ==================== 积分 ====================

/// 积分消费请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConsumePointsRequest {
    #[validate(range(min = 1, message = "消费积分必须大于 0"))]
    pub points: i64,
    #[validate(length(max = 255, message = "描述不能超过 255 个字符"))]
    pub description: Option<String>,
}

/// 积分流水查询
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsHistoryQuery {
    pub source: Option<PointsSource>,
}

impl From<PointsHistoryQuery> for LedgerFilter {
    fn from(query: PointsHistoryQuery) -> Self {
        LedgerFilter {
            source: query.source,
        }
    }
}

/// 手动调整积分请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdjustPointsRequest {
    /// 正数增加，负数扣减
    #[validate(range(min = -10_000_000, max = 10_000_000, message = "调整幅度超出范围"))]
    pub points: i64,
    #[validate(length(min = 1, max = 255, message = "调整原因长度必须在 1-255 之间"))]
    pub reason: String,
}

// ==================== 订单管理 ====================

/// 后台订单查询过滤
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderQueryFilter {
    pub status: Option<OrderStatus>,
    pub user_id: Option<i64>,
    pub merchant_id: Option<i64>,
    pub order_no: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl From<OrderQueryFilter> for OrderFilter {
    fn from(query: OrderQueryFilter) -> Self {
        OrderFilter {
            status: query.status,
            user_id: query.user_id,
            merchant_id: query.merchant_id,
            order_no: non_blank(query.order_no),
            start_time: query.start_time,
            end_time: query.end_time,
        }
    }
}

/// 退款请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    #[validate(length(min = 1, max = 255, message = "退款原因长度必须在 1-255 之间"))]
    pub reason: String,
}

/// 手动触发订单过期请求
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ExpireOrdersRequest {
    #[validate(range(min = 1, max = 5000, message = "批次大小必须在 1-5000 之间"))]
    pub batch_size: Option<i64>,
}

// ==================== 用户管理 ====================

/// 后台用户查询过滤
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQueryFilter {
    pub keyword: Option<String>,
    pub status: Option<UserStatus>,
}

impl From<UserQueryFilter> for UserFilter {
    fn from(query: UserQueryFilter) -> Self {
        UserFilter {
            keyword: non_blank(query.keyword),
            status: query.status,
        }
    }
}

/// 用户状态变更请求
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserStatusRequest {
    pub status: UserStatus,
}

// ==================== 商户管理 ====================

/// 后台商户查询过滤
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantQueryFilter {
    pub keyword: Option<String>,
    pub status: Option<MerchantStatus>,
}

impl From<MerchantQueryFilter> for MerchantFilter {
    fn from(query: MerchantQueryFilter) -> Self {
        MerchantFilter {
            keyword: non_blank(query.keyword),
            status: query.status,
        }
    }
}

/// 创建商户请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMerchantRequest {
    #[validate(length(min = 1, max = 32, message = "商户编号长度必须在 1-32 之间"))]
    pub merchant_no: String,
    #[validate(length(min = 1, max = 100, message = "商户名称长度必须在 1-100 之间"))]
    pub name: String,
    #[validate(length(max = 50))]
    pub contact_person: Option<String>,
    #[validate(length(max = 20))]
    pub contact_phone: Option<String>,
    #[validate(length(max = 100))]
    pub business_license: Option<String>,
    pub status: Option<MerchantStatus>,
}

impl From<CreateMerchantRequest> for NewMerchant {
    fn from(req: CreateMerchantRequest) -> Self {
        NewMerchant {
            merchant_no: req.merchant_no,
            name: req.name,
            contact_person: req.contact_person,
            contact_phone: req.contact_phone,
            business_license: req.business_license,
            status: req.status.unwrap_or_default(),
        }
    }
}

/// 更新商户请求，只更新提供的字段
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMerchantRequest {
    #[validate(length(min = 1, max = 100, message = "商户名称长度必须在 1-100 之间"))]
    pub name: Option<String>,
    #[validate(length(max = 50))]
    pub contact_person: Option<String>,
    #[validate(length(max = 20))]
    pub contact_phone: Option<String>,
    #[validate(length(max = 100))]
    pub business_license: Option<String>,
    pub status: Option<MerchantStatus>,
}

impl From<UpdateMerchantRequest> for MerchantUpdate {
    fn from(req: UpdateMerchantRequest) -> Self {
        MerchantUpdate {
            name: req.name,
            contact_person: req.contact_person,
            contact_phone: req.contact_phone,
            business_license: req.business_license,
            status: req.status,
        }
    }
}

// ==================== 分页 ====================

/// 分页参数
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

impl PaginationParams {
    /// 计算数据库查询的 offset
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1) * self.limit()
    }

    /// 获取限制条数（最大100）
    pub fn limit(&self) -> i64 {
        self.page_size.clamp(1, 100)
    }

    pub fn page(&self) -> i64 {
        self.page.max(1)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
