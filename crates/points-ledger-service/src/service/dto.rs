//! 服务层数据传输对象
//!
//! 定义服务层与外部交互使用的命令、查询条件和结果类型

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    MerchantStatus, OrderStatus, PaymentOrder, PointsLedgerEntry, PointsSource, UserStatus,
};

// ==================== 订单 ====================

/// 创建订单命令
#[derive(Debug, Clone)]
pub struct CreateOrderCommand {
    pub user_id: i64,
    pub merchant_id: i64,
    /// 金额（分）
    pub amount: i64,
    pub description: Option<String>,
}

impl CreateOrderCommand {
    pub fn new(user_id: i64, merchant_id: i64, amount: i64) -> Self {
        Self {
            user_id,
            merchant_id,
            amount,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// 支付确认结果
///
/// `already_processed` 为 true 表示重复回调，未产生任何副作用
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfirmation {
    pub order: PaymentOrder,
    /// 本订单的支付奖励流水
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward: Option<PointsLedgerEntry>,
    pub points_awarded: i64,
    pub already_processed: bool,
}

/// 支付失败处理结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentFailure {
    pub order: PaymentOrder,
    pub already_processed: bool,
}

/// 退款结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundResult {
    pub order: PaymentOrder,
    /// 实际扣回的积分（不含已过期部分，受当前余额限制）
    pub deducted_points: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<PointsLedgerEntry>,
}

/// 订单查询条件
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub user_id: Option<i64>,
    pub merchant_id: Option<i64>,
    /// 订单号模糊匹配
    pub order_no: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// 订单统计
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatistics {
    pub total_orders: i64,
    pub pending_orders: i64,
    pub paid_orders: i64,
    pub failed_orders: i64,
    pub expired_orders: i64,
    pub refunded_orders: i64,
    /// 已支付订单的金额合计（分）
    pub paid_amount: i64,
    pub today_orders: i64,
    pub today_paid_amount: i64,
}

// ==================== 积分 ====================

/// 积分过期处理结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpireOutcome {
    /// 处理的用户数
    pub users: u64,
    /// 核销的奖励流水数
    pub entries: u64,
    /// 扣减的积分合计
    pub points: u64,
}

impl ExpireOutcome {
    pub fn merge(&mut self, other: ExpireOutcome) {
        self.users += other.users;
        self.entries += other.entries;
        self.points += other.points;
    }
}

/// 用户积分流水汇总
#[derive(Debug, Clone, Default, PartialEq, sqlx::FromRow)]
pub struct LedgerTotals {
    /// 所有正向变动之和
    pub total_earned: i64,
    /// 所有负向变动的绝对值之和
    pub total_spent: i64,
    /// 所有变动之和
    pub ledger_sum: i64,
    pub entry_count: i64,
    /// 最新一条流水的余额快照
    pub latest_balance: Option<i64>,
}

/// 积分余额概览
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSummary {
    pub user_id: i64,
    pub balance: i64,
    pub total_earned: i64,
    pub total_spent: i64,
    /// 30 天内即将过期的积分（不超过当前余额）
    pub expiring_soon: i64,
}

/// 余额对账结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceVerification {
    pub user_id: i64,
    /// users 表中的冗余余额
    pub cached_balance: i64,
    /// 流水变动之和
    pub ledger_sum: i64,
    /// 最新流水的余额快照
    pub latest_snapshot: i64,
    pub entry_count: i64,
    pub consistent: bool,
}

/// 积分统计
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PointsStatistics {
    pub total_awarded: i64,
    pub total_consumed: i64,
    pub total_expired: i64,
    pub total_adjusted: i64,
    pub active_users: i64,
    pub average_balance: f64,
}

/// 积分流水查询条件
#[derive(Debug, Clone, Copy, Default)]
pub struct LedgerFilter {
    pub source: Option<PointsSource>,
}

// ==================== 用户与商户 ====================

/// 用户查询条件
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// 昵称/手机号/openid 模糊匹配
    pub keyword: Option<String>,
    pub status: Option<UserStatus>,
}

/// 用户统计
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserStatistics {
    pub total_users: i64,
    pub active_users: i64,
    pub banned_users: i64,
    pub new_users_today: i64,
    pub total_points_balance: i64,
}

/// 商户查询条件
#[derive(Debug, Clone, Default)]
pub struct MerchantFilter {
    pub keyword: Option<String>,
    pub status: Option<MerchantStatus>,
}

/// 商户数量统计
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MerchantStatistics {
    pub total_merchants: i64,
    pub active_merchants: i64,
    pub inactive_merchants: i64,
    pub pending_merchants: i64,
}

/// 单个商户的订单汇总
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MerchantOrderOverview {
    /// 下过单的用户数
    pub total_users: i64,
    pub total_orders: i64,
    pub paid_orders: i64,
    /// 已支付订单金额合计（分）
    pub paid_amount: i64,
    pub points_awarded: i64,
}

/// 商户按日（UTC）的订单趋势
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MerchantDailyTrend {
    pub day: NaiveDate,
    pub orders: i64,
    pub paid_amount: i64,
}

/// 商户详细统计
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantDetailStatistics {
    pub merchant_id: i64,
    pub overview: MerchantOrderOverview,
    /// 最近若干天的趋势，只包含有订单的日期
    pub trends: Vec<MerchantDailyTrend>,
}

/// 分页结果
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64) -> Self {
        Self { items, total }
    }

    pub fn empty() -> Self {
        Self {
            items: vec![],
            total: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_order_command_builder() {
        let cmd = CreateOrderCommand::new(1, 2, 1999).with_description("咖啡");
        assert_eq!(cmd.amount, 1999);
        assert_eq!(cmd.description.as_deref(), Some("咖啡"));
    }

    #[test]
    fn test_expire_outcome_merge() {
        let mut total = ExpireOutcome::default();
        total.merge(ExpireOutcome {
            users: 1,
            entries: 2,
            points: 30,
        });
        total.merge(ExpireOutcome {
            users: 2,
            entries: 2,
            points: 0,
        });
        assert_eq!(
            total,
            ExpireOutcome {
                users: 3,
                entries: 4,
                points: 30
            }
        );
    }
}
