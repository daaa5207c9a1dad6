//! 积分流水实体定义

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::enums::PointsSource;

/// 支付奖励积分的有效期（天）
pub const POINTS_VALIDITY_DAYS: i64 = 365;

/// 流水说明的最大长度（字符），与 `points_ledger.description` 列宽一致
pub const MAX_LEDGER_DESCRIPTION_CHARS: usize = 255;

/// 积分流水
///
/// 只追加不修改，`balance_after` 为该笔变动后的余额快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PointsLedgerEntry {
    pub id: i64,
    pub user_id: i64,
    /// 关联订单（非支付来源为空）
    #[sqlx(default)]
    pub order_id: Option<i64>,
    /// 积分变动（正为增加，负为扣减）
    pub points_change: i64,
    pub balance_after: i64,
    pub source: PointsSource,
    #[sqlx(default)]
    pub description: Option<String>,
    /// 积分过期时间（仅支付奖励）
    #[sqlx(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// 被核销的奖励流水（过期扣减或退款扣回）
    #[sqlx(default)]
    pub ref_entry_id: Option<i64>,
    /// 操作管理员
    #[sqlx(default)]
    pub operator_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// 待写入的积分流水
#[derive(Debug, Clone, PartialEq)]
pub struct NewLedgerEntry {
    pub user_id: i64,
    pub order_id: Option<i64>,
    pub points_change: i64,
    pub balance_after: i64,
    pub source: PointsSource,
    pub description: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub ref_entry_id: Option<i64>,
    pub operator_id: Option<i64>,
}

impl NewLedgerEntry {
    pub fn new(user_id: i64, source: PointsSource, points_change: i64, balance_after: i64) -> Self {
        Self {
            user_id,
            order_id: None,
            points_change,
            balance_after,
            source,
            description: None,
            expires_at: None,
            ref_entry_id: None,
            operator_id: None,
        }
    }

    pub fn with_order(mut self, order_id: i64) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_ref_entry(mut self, ref_entry_id: i64) -> Self {
        self.ref_entry_id = Some(ref_entry_id);
        self
    }

    pub fn with_operator(mut self, operator_id: Option<i64>) -> Self {
        self.operator_id = operator_id;
        self
    }
}

/// 支付奖励积分的过期时间
pub fn reward_expires_at(awarded_at: DateTime<Utc>) -> DateTime<Utc> {
    awarded_at + Duration::days(POINTS_VALIDITY_DAYS)
}
