//! 积分流水仓储
//!
//! 流水只追加不修改。写入都发生在已锁定用户行的事务中，
//! 因此同一用户的流水 ID 顺序即余额变动顺序。
//!
//! 带 `ref_entry_id` 的扣减流水用于核销某条支付奖励：
//! `expired_deduct` 为过期核销，`admin_adjust` 为退款扣回。
//! 退款扣回视为撤销该奖励本身，不参与先进先出的消费抵扣。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use super::traits::LedgerRepositoryTrait;
use crate::error::Result;
use crate::models::{NewLedgerEntry, PointsLedgerEntry, PointsSource};
use crate::service::dto::{LedgerTotals, PointsStatistics};

const LEDGER_COLUMNS: &str = r#"
    id, user_id, order_id, points_change, balance_after, source, description, expires_at,
    ref_entry_id, operator_id, created_at
"#;

/// 积分流水仓储
pub struct PointsLedgerRepository {
    pool: PgPool,
}

impl PointsLedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 分页查询用户流水，最新的在前
    pub async fn list_by_user(
        &self,
        user_id: i64,
        source: Option<PointsSource>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<PointsLedgerEntry>, i64)> {
        const WHERE: &str = "WHERE user_id = $1 AND ($2::varchar IS NULL OR source = $2)";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM points_ledger {WHERE}"))
            .bind(user_id)
            .bind(source)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {LEDGER_COLUMNS} FROM points_ledger {WHERE} ORDER BY id DESC LIMIT $3 OFFSET $4"
        );
        let entries = sqlx::query_as::<_, PointsLedgerEntry>(&sql)
            .bind(user_id)
            .bind(source)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok((entries, total))
    }

    pub async fn get_reward_by_order(&self, order_id: i64) -> Result<Option<PointsLedgerEntry>> {
        let sql = format!(
            "SELECT {LEDGER_COLUMNS} FROM points_ledger WHERE order_id = $1 AND source = 'payment_reward'"
        );
        let entry = sqlx::query_as::<_, PointsLedgerEntry>(&sql)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(entry)
    }

    /// 用户流水汇总，用于余额概览和对账
    pub async fn totals_by_user(&self, user_id: i64) -> Result<LedgerTotals> {
        let totals = sqlx::query_as::<_, LedgerTotals>(
            r#"
            SELECT
                COALESCE(SUM(points_change) FILTER (WHERE points_change > 0), 0)::bigint  AS total_earned,
                COALESCE(-SUM(points_change) FILTER (WHERE points_change < 0), 0)::bigint AS total_spent,
                COALESCE(SUM(points_change), 0)::bigint                                   AS ledger_sum,
                COUNT(*)                                                                  AS entry_count,
                (SELECT balance_after FROM points_ledger
                 WHERE user_id = $1 ORDER BY id DESC LIMIT 1)                             AS latest_balance
            FROM points_ledger
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(totals)
    }

    pub async fn expiring_between(
        &self,
        user_id: i64,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<i64> {
        let points: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(r.points_change + COALESCE((
                       SELECT SUM(a.points_change) FROM points_ledger a
                       WHERE a.source = 'admin_adjust' AND a.ref_entry_id = r.id
                   ), 0)), 0)::bigint
            FROM points_ledger r
            WHERE r.user_id = $1
              AND r.source = 'payment_reward'
              AND r.expires_at >= $2 AND r.expires_at < $3
              AND NOT EXISTS (
                  SELECT 1 FROM points_ledger d
                  WHERE d.source = 'expired_deduct' AND d.ref_entry_id = r.id
              )
            "#,
        )
        .bind(user_id)
        .bind(from)
        .bind(until)
        .fetch_one(&self.pool)
        .await?;

        Ok(points)
    }

    /// 全局积分统计
    pub async fn statistics(&self) -> Result<PointsStatistics> {
        let stats = sqlx::query_as::<_, PointsStatistics>(
            r#"
            SELECT
                COALESCE(SUM(points_change) FILTER (WHERE source = 'payment_reward'), 0)::bigint    AS total_awarded,
                COALESCE(-SUM(points_change) FILTER (WHERE source = 'mall_consumption'), 0)::bigint AS total_consumed,
                COALESCE(-SUM(points_change) FILTER (WHERE source = 'expired_deduct'), 0)::bigint   AS total_expired,
                COALESCE(SUM(points_change) FILTER (WHERE source = 'admin_adjust'), 0)::bigint      AS total_adjusted,
                (SELECT COUNT(*) FROM users WHERE points_balance > 0)                               AS active_users,
                (SELECT COALESCE(AVG(points_balance), 0)::float8 FROM users)                        AS average_balance
            FROM points_ledger
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }

    pub async fn users_with_expired_rewards(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<i64>> {
        let users = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT DISTINCT r.user_id
            FROM points_ledger r
            WHERE r.source = 'payment_reward'
              AND r.expires_at <= $1
              AND NOT EXISTS (
                  SELECT 1 FROM points_ledger d
                  WHERE d.source = 'expired_deduct' AND d.ref_entry_id = r.id
              )
            ORDER BY r.user_id
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    // ==================== 事务内操作 ====================

    /// 在事务中追加流水
    ///
    /// 违反部分唯一索引（同一订单重复奖励、同一奖励重复核销）时不写入并返回 None。
    /// `created_at` 取语句执行时刻而非事务开始时刻，保证与写入顺序一致。
    pub async fn insert_in_tx(
        tx: &mut PgConnection,
        entry: &NewLedgerEntry,
    ) -> Result<Option<PointsLedgerEntry>> {
        let sql = format!(
            r#"
            INSERT INTO points_ledger
                (user_id, order_id, points_change, balance_after, source, description,
                 expires_at, ref_entry_id, operator_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, clock_timestamp())
            ON CONFLICT DO NOTHING
            RETURNING {LEDGER_COLUMNS}
            "#
        );
        let created = sqlx::query_as::<_, PointsLedgerEntry>(&sql)
            .bind(entry.user_id)
            .bind(entry.order_id)
            .bind(entry.points_change)
            .bind(entry.balance_after)
            .bind(entry.source)
            .bind(&entry.description)
            .bind(entry.expires_at)
            .bind(entry.ref_entry_id)
            .bind(entry.operator_id)
            .fetch_optional(tx)
            .await?;

        Ok(created)
    }

    /// 在事务中查询订单的支付奖励流水
    pub async fn find_reward_by_order_in_tx(
        tx: &mut PgConnection,
        order_id: i64,
    ) -> Result<Option<PointsLedgerEntry>> {
        let sql = format!(
            "SELECT {LEDGER_COLUMNS} FROM points_ledger WHERE order_id = $1 AND source = 'payment_reward'"
        );
        let entry = sqlx::query_as::<_, PointsLedgerEntry>(&sql)
            .bind(order_id)
            .fetch_optional(tx)
            .await?;

        Ok(entry)
    }

    /// 在事务中列出用户已到期且未核销的奖励流水，按发放顺序排列
    pub async fn expired_rewards_for_user_in_tx(
        tx: &mut PgConnection,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<PointsLedgerEntry>> {
        let sql = format!(
            r#"
            SELECT {LEDGER_COLUMNS} FROM points_ledger r
            WHERE r.user_id = $1
              AND r.source = 'payment_reward'
              AND r.expires_at <= $2
              AND NOT EXISTS (
                  SELECT 1 FROM points_ledger d
                  WHERE d.source = 'expired_deduct' AND d.ref_entry_id = r.id
              )
            ORDER BY r.id
            "#
        );
        let entries = sqlx::query_as::<_, PointsLedgerEntry>(&sql)
            .bind(user_id)
            .bind(now)
            .fetch_all(tx)
            .await?;

        Ok(entries)
    }

    /// 在事务中查询某条奖励已被指定来源核销的积分
    pub async fn retired_points_in_tx(
        tx: &mut PgConnection,
        reward_id: i64,
        source: PointsSource,
    ) -> Result<i64> {
        let points: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(-SUM(points_change), 0)::bigint
            FROM points_ledger
            WHERE ref_entry_id = $1 AND source = $2
            "#,
        )
        .bind(reward_id)
        .bind(source)
        .fetch_one(tx)
        .await?;

        Ok(points)
    }

    /// 截至某条流水（含）为止用户获得的积分总和，扣除其中已被退款撤销的部分
    pub async fn credits_through_in_tx(
        tx: &mut PgConnection,
        user_id: i64,
        entry_id: i64,
    ) -> Result<i64> {
        let credits: i64 = sqlx::query_scalar(
            r#"
            SELECT (
                COALESCE(SUM(points_change) FILTER (WHERE points_change > 0 AND id <= $2), 0)
              + COALESCE(SUM(points_change) FILTER (
                    WHERE source = 'admin_adjust' AND ref_entry_id <= $2
                ), 0)
            )::bigint
            FROM points_ledger
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(entry_id)
        .fetch_one(tx)
        .await?;

        Ok(credits)
    }

    /// 参与先进先出抵扣的扣减积分之和，不含退款扣回
    pub async fn total_debits_in_tx(tx: &mut PgConnection, user_id: i64) -> Result<i64> {
        let debits: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(-SUM(points_change), 0)::bigint
            FROM points_ledger
            WHERE user_id = $1
              AND points_change < 0
              AND NOT (source = 'admin_adjust' AND ref_entry_id IS NOT NULL)
            "#,
        )
        .bind(user_id)
        .fetch_one(tx)
        .await?;

        Ok(debits)
    }
}

#[async_trait]
impl LedgerRepositoryTrait for PointsLedgerRepository {
    async fn list_by_user(
        &self,
        user_id: i64,
        source: Option<PointsSource>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<PointsLedgerEntry>, i64)> {
        self.list_by_user(user_id, source, limit, offset).await
    }

    async fn get_reward_by_order(&self, order_id: i64) -> Result<Option<PointsLedgerEntry>> {
        self.get_reward_by_order(order_id).await
    }

    async fn totals_by_user(&self, user_id: i64) -> Result<LedgerTotals> {
        self.totals_by_user(user_id).await
    }

    async fn expiring_between(
        &self,
        user_id: i64,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<i64> {
        self.expiring_between(user_id, from, until).await
    }

    async fn statistics(&self) -> Result<PointsStatistics> {
        self.statistics().await
    }

    async fn users_with_expired_rewards(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<i64>> {
        self.users_with_expired_rewards(now, limit).await
    }
}
