//! 仓储 Trait 定义
//!
//! 服务层依赖抽象而非具体实现，支持 mock 测试。
//! 需要行锁的写操作以 `*_in_tx` 关联函数的形式由具体仓储提供，不进入 trait。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{
    Merchant, MerchantUpdate, NewMerchant, NewOrder, PaymentOrder, PointsLedgerEntry,
    PointsSource, User, UserProfile, UserStatus,
};
use crate::service::dto::{
    LedgerTotals, MerchantDailyTrend, MerchantFilter, MerchantOrderOverview, MerchantStatistics,
    OrderFilter, OrderStatistics, PointsStatistics, UserFilter, UserStatistics,
};

/// 支付订单仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderRepositoryTrait: Send + Sync {
    /// 创建订单，订单号冲突时返回 None
    async fn create(&self, order: &NewOrder) -> Result<Option<PaymentOrder>>;
    async fn get_by_order_no(&self, order_no: &str) -> Result<Option<PaymentOrder>>;
    async fn list_by_user(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<PaymentOrder>, i64)>;
    async fn list(
        &self,
        filter: &OrderFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<PaymentOrder>, i64)>;
    /// `today_start` 之后的数据计入当日统计
    async fn statistics(&self, today_start: DateTime<Utc>) -> Result<OrderStatistics>;
    /// 将一批超时未支付订单置为过期，返回被过期的订单号
    async fn expire_stale(&self, now: DateTime<Utc>, batch_size: i64) -> Result<Vec<String>>;
}

/// 用户仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepositoryTrait: Send + Sync {
    async fn get(&self, id: i64) -> Result<Option<User>>;
    async fn get_by_openid(&self, openid: &str) -> Result<Option<User>>;
    /// 按 openid 创建或更新用户资料
    async fn upsert_by_openid(&self, profile: &UserProfile) -> Result<User>;
    async fn list(&self, filter: &UserFilter, limit: i64, offset: i64) -> Result<(Vec<User>, i64)>;
    async fn update_status(&self, id: i64, status: UserStatus) -> Result<Option<User>>;
    async fn statistics(&self, today_start: DateTime<Utc>) -> Result<UserStatistics>;
}

/// 商户仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MerchantRepositoryTrait: Send + Sync {
    async fn get(&self, id: i64) -> Result<Option<Merchant>>;
    async fn create(&self, merchant: &NewMerchant) -> Result<Merchant>;
    async fn update(&self, id: i64, update: &MerchantUpdate) -> Result<Option<Merchant>>;
    async fn list(
        &self,
        filter: &MerchantFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Merchant>, i64)>;
    async fn statistics(&self) -> Result<MerchantStatistics>;
    async fn order_overview(&self, merchant_id: i64) -> Result<MerchantOrderOverview>;
    /// `since` 之后创建的订单按日汇总，日期升序
    async fn daily_trend(
        &self,
        merchant_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<MerchantDailyTrend>>;
}

/// 积分流水仓储接口（只读）
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerRepositoryTrait: Send + Sync {
    /// 按时间倒序分页查询用户流水
    async fn list_by_user(
        &self,
        user_id: i64,
        source: Option<PointsSource>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<PointsLedgerEntry>, i64)>;
    async fn get_reward_by_order(&self, order_id: i64) -> Result<Option<PointsLedgerEntry>>;
    async fn totals_by_user(&self, user_id: i64) -> Result<LedgerTotals>;
    /// 在 `[from, until)` 内到期且尚未核销的奖励积分之和
    async fn expiring_between(
        &self,
        user_id: i64,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<i64>;
    async fn statistics(&self) -> Result<PointsStatistics>;
    /// 存在已到期未核销奖励的用户
    async fn users_with_expired_rewards(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<i64>>;
}
