//! HTTP 层错误类型定义
//!
//! 将账本服务错误、认证错误和外部服务错误统一映射为 HTTP 状态码和 JSON 响应

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use points_ledger::PointsError;
use serde_json::json;

/// 系统错误对外统一展示的提示
pub const GENERIC_ERROR_MESSAGE: &str = "服务内部错误，请稍后重试";

/// API 错误类型
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // 认证错误
    #[error("未授权: {0}")]
    Unauthorized(String),
    #[error("禁止访问: {0}")]
    Forbidden(String),
    #[error("用户名或密码错误")]
    InvalidCredentials,
    #[error("账号已被禁用")]
    AccountDisabled,
    #[error("账号已被锁定，请稍后重试")]
    AccountLocked,

    // 管理员账号
    #[error("管理员不存在: {0}")]
    AdminNotFound(i64),
    #[error("用户名已存在: {0}")]
    DuplicateUsername(String),

    // 请求错误
    #[error("参数验证失败: {0}")]
    Validation(String),
    #[error("请求过于频繁，请稍后再试")]
    RateLimited,

    // 业务错误
    #[error(transparent)]
    Points(#[from] PointsError),

    // 外部服务错误
    #[error("微信接口调用失败: {0}")]
    Wechat(String),

    // 系统错误
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("内部错误: {0}")]
    Internal(String),
}

impl ApiError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) | Self::AccountDisabled | Self::AccountLocked => {
                StatusCode::FORBIDDEN
            }
            Self::AdminNotFound(_) => StatusCode::NOT_FOUND,
            Self::DuplicateUsername(_) => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Points(e) => points_status_code(e),
            Self::Wechat(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 返回错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::AccountDisabled => "ACCOUNT_DISABLED",
            Self::AccountLocked => "ACCOUNT_LOCKED",
            Self::AdminNotFound(_) => "ADMIN_NOT_FOUND",
            Self::DuplicateUsername(_) => "DUPLICATE_USERNAME",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::RateLimited => "RATE_LIMITED",
            Self::Points(e) => e.error_code(),
            Self::Wechat(_) => "WECHAT_API_ERROR",
            Self::Database(_) => "STORAGE_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为系统错误（详细信息只记日志）
    pub fn is_system_error(&self) -> bool {
        match self {
            Self::Database(_) | Self::Internal(_) => true,
            Self::Points(e) => !e.is_business_error(),
            _ => false,
        }
    }
}

fn points_status_code(err: &PointsError) -> StatusCode {
    match err {
        PointsError::InvalidAmount(_)
        | PointsError::AmountMismatch { .. }
        | PointsError::Validation(_) => StatusCode::BAD_REQUEST,
        PointsError::UserUnavailable(_) | PointsError::MerchantUnavailable(_) => {
            StatusCode::FORBIDDEN
        }
        PointsError::OrderNotFound(_)
        | PointsError::UserNotFound(_)
        | PointsError::MerchantNotFound(_) => StatusCode::NOT_FOUND,
        PointsError::InvalidOrderStatus { .. }
        | PointsError::OrderNotPaid(_)
        | PointsError::AlreadyProcessed(_)
        | PointsError::DuplicateMerchantNo(_)
        | PointsError::InsufficientBalance { .. } => StatusCode::CONFLICT,
        PointsError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        PointsError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if self.is_system_error() {
            tracing::error!(error = %self, code = self.error_code(), "请求处理失败");
            GENERIC_ERROR_MESSAGE.to_string()
        } else {
            self.to_string()
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "message": message,
            "data": serde_json::Value::Null
        });

        (status, axum::Json(body)).into_response()
    }
}

/// 从 validator 错误转换
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

/// API 层 Result 类型别名
pub type Result<T> = std::result::Result<T, ApiError>;
