//! 积分服务枚举类型定义
//!
//! 所有枚举都支持数据库（sqlx）和 JSON（serde）序列化，数据库中以小写 varchar 存储

use serde::{Deserialize, Serialize};

/// 支付订单状态
///
/// 状态只能单向流转：pending → paid | failed | expired，paid → refunded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum OrderStatus {
    /// 待支付
    #[default]
    Pending,
    /// 已支付
    Paid,
    /// 支付失败
    Failed,
    /// 已过期（超时未支付）
    Expired,
    /// 已退款
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Expired => "expired",
            Self::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 积分流水来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum PointsSource {
    /// 支付奖励（+）
    PaymentReward,
    /// 商城消费（-）
    MallConsumption,
    /// 管理员调整（+/-）
    AdminAdjust,
    /// 过期扣减（-）
    ExpiredDeduct,
}

impl PointsSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaymentReward => "payment_reward",
            Self::MallConsumption => "mall_consumption",
            Self::AdminAdjust => "admin_adjust",
            Self::ExpiredDeduct => "expired_deduct",
        }
    }
}

impl std::fmt::Display for PointsSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 用户状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
    /// 封禁 - 禁止登录和消费
    Banned,
}

impl UserStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// 商户状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum MerchantStatus {
    #[default]
    Active,
    Inactive,
    /// 待审核
    Pending,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_representation() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Refunded).unwrap(),
            "\"refunded\""
        );
        assert_eq!(
            serde_json::to_string(&PointsSource::PaymentReward).unwrap(),
            "\"payment_reward\""
        );
        let source: PointsSource = serde_json::from_str("\"expired_deduct\"").unwrap();
        assert_eq!(source, PointsSource::ExpiredDeduct);
    }

    #[test]
    fn test_as_str_matches_serde() {
        for source in [
            PointsSource::PaymentReward,
            PointsSource::MallConsumption,
            PointsSource::AdminAdjust,
            PointsSource::ExpiredDeduct,
        ] {
            assert_eq!(
                serde_json::to_string(&source).unwrap(),
                format!("\"{}\"", source.as_str())
            );
        }
    }
}
