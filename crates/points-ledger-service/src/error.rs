//! 积分与订单服务错误类型
//!
//! 定义服务层的业务错误和系统错误

use thiserror::Error;

/// 积分与订单服务错误类型
#[derive(Debug, Error)]
pub enum PointsError {
    // === 订单相关错误 ===
    #[error("支付金额无效: {0}，有效范围 1 ~ 10000000 分")]
    InvalidAmount(i64),

    #[error("订单不存在: {0}")]
    OrderNotFound(String),

    #[error("支付金额不一致: order_no={order_no}, 订单金额={expected}, 回调金额={actual}")]
    AmountMismatch {
        order_no: String,
        expected: i64,
        actual: i64,
    },

    #[error("订单状态不允许此操作: order_no={order_no}, current_status={current_status}")]
    InvalidOrderStatus {
        order_no: String,
        current_status: String,
    },

    #[error("订单尚未支付: {0}")]
    OrderNotPaid(String),

    #[error("订单已处理: {0}")]
    AlreadyProcessed(String),

    // === 用户与商户相关错误 ===
    #[error("用户不存在: {0}")]
    UserNotFound(i64),

    #[error("用户已被禁用: {0}")]
    UserUnavailable(i64),

    #[error("商户不存在: {0}")]
    MerchantNotFound(i64),

    #[error("商户暂停营业: {0}")]
    MerchantUnavailable(i64),

    #[error("商户编号已存在: {0}")]
    DuplicateMerchantNo(String),

    // === 积分相关错误 ===
    #[error("积分余额不足: 需要 {required}, 可用 {available}")]
    InsufficientBalance { required: i64, available: i64 },

    // === 系统错误 ===
    #[error("存储不可用: {0}")]
    StorageUnavailable(#[from] sqlx::Error),

    #[error("参数校验失败: {0}")]
    Validation(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 积分服务 Result 类型别名
pub type Result<T> = std::result::Result<T, PointsError>;

impl PointsError {
    /// 检查是否为可重试的错误
    ///
    /// 确认与发放均为幂等操作，存储层失败后重试是安全的
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }

    /// 检查是否为业务错误（非系统错误）
    pub fn is_business_error(&self) -> bool {
        !matches!(self, Self::StorageUnavailable(_) | Self::Internal(_))
    }

    /// 获取错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::OrderNotFound(_) => "ORDER_NOT_FOUND",
            Self::AmountMismatch { .. } => "AMOUNT_MISMATCH",
            Self::InvalidOrderStatus { .. } => "INVALID_ORDER_STATUS",
            Self::OrderNotPaid(_) => "ORDER_NOT_PAID",
            Self::AlreadyProcessed(_) => "ALREADY_PROCESSED",
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::UserUnavailable(_) => "USER_UNAVAILABLE",
            Self::MerchantNotFound(_) => "MERCHANT_NOT_FOUND",
            Self::MerchantUnavailable(_) => "MERCHANT_UNAVAILABLE",
            Self::DuplicateMerchantNo(_) => "DUPLICATE_MERCHANT_NO",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
