//! 支付订单实体定义

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::enums::OrderStatus;

/// 单笔支付最小金额（分）
pub const MIN_ORDER_AMOUNT: i64 = 1;
/// 单笔支付最大金额（分），即 10 万元
pub const MAX_ORDER_AMOUNT: i64 = 10_000_000;
/// 订单未支付的有效期
pub const ORDER_TTL_MINUTES: i64 = 60;
/// 未填写描述时的默认订单描述
pub const DEFAULT_ORDER_DESCRIPTION: &str = "积分赠送支付";
pub const PAYMENT_METHOD_WECHAT: &str = "wechat";

/// 支付订单
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOrder {
    pub id: i64,
    /// 对外订单号
    pub order_no: String,
    pub user_id: i64,
    pub merchant_id: i64,
    /// 金额（分）
    pub amount: i64,
    /// 已发放积分
    pub points_awarded: i64,
    pub status: OrderStatus,
    pub description: String,
    pub payment_method: String,
    /// 微信支付交易号
    #[sqlx(default)]
    pub transaction_id: Option<String>,
    #[sqlx(default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[sqlx(default)]
    pub refunded_at: Option<DateTime<Utc>>,
    #[sqlx(default)]
    pub refund_reason: Option<String>,
    /// 未支付的过期时间
    pub expired_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentOrder {
    /// 待支付订单是否已超过有效期
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == OrderStatus::Pending && now > self.expired_at
    }
}

/// 新建订单参数
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_no: String,
    pub user_id: i64,
    pub merchant_id: i64,
    pub amount: i64,
    pub description: String,
    pub expired_at: DateTime<Utc>,
}

/// 生成订单号：`NO{毫秒时间戳}{3 位随机数}`
pub fn generate_order_no(now: DateTime<Utc>) -> String {
    let suffix: u16 = rand::rng().random_range(0..1000);
    format!("NO{}{:03}", now.timestamp_millis(), suffix)
}

/// 计算订单的过期时间
pub fn order_expires_at(created_at: DateTime<Utc>) -> DateTime<Utc> {
    created_at + Duration::minutes(ORDER_TTL_MINUTES)
}

/// 校验支付金额是否在允许范围内
pub fn is_valid_amount(amount: i64) -> bool {
    (MIN_ORDER_AMOUNT..=MAX_ORDER_AMOUNT).contains(&amount)
}
