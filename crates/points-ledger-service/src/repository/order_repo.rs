//! 支付订单仓储
//!
//! 订单行的状态变更都带有 `WHERE status = ...` 条件，
//! 配合 `SELECT ... FOR UPDATE` 保证并发回调下只有一次状态流转生效

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use super::traits::OrderRepositoryTrait;
use crate::error::Result;
use crate::models::{NewOrder, OrderStatus, PaymentOrder};
use crate::service::dto::{OrderFilter, OrderStatistics};

const ORDER_COLUMNS: &str = r#"
    id, order_no, user_id, merchant_id, amount, points_awarded, status, description,
    payment_method, transaction_id, paid_at, refunded_at, refund_reason, expired_at,
    created_at, updated_at
"#;

/// 支付订单仓储
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 创建订单
    ///
    /// 订单号唯一冲突时返回 None，由调用方重新生成订单号
    pub async fn create(&self, order: &NewOrder) -> Result<Option<PaymentOrder>> {
        let sql = format!(
            r#"
            INSERT INTO payment_orders (order_no, user_id, merchant_id, amount, description, expired_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (order_no) DO NOTHING
            RETURNING {ORDER_COLUMNS}
            "#
        );
        let created = sqlx::query_as::<_, PaymentOrder>(&sql)
            .bind(&order.order_no)
            .bind(order.user_id)
            .bind(order.merchant_id)
            .bind(order.amount)
            .bind(&order.description)
            .bind(order.expired_at)
            .fetch_optional(&self.pool)
            .await?;

        Ok(created)
    }

    pub async fn get_by_order_no(&self, order_no: &str) -> Result<Option<PaymentOrder>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM payment_orders WHERE order_no = $1");
        let order = sqlx::query_as::<_, PaymentOrder>(&sql)
            .bind(order_no)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    /// 分页查询用户订单，按创建时间倒序
    pub async fn list_by_user(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<PaymentOrder>, i64)> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM payment_orders WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        let sql = format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM payment_orders
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#
        );
        let orders = sqlx::query_as::<_, PaymentOrder>(&sql)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok((orders, total))
    }

    /// 按条件分页查询订单
    pub async fn list(
        &self,
        filter: &OrderFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<PaymentOrder>, i64)> {
        const WHERE: &str = r#"
            WHERE ($1::varchar IS NULL OR status = $1)
              AND ($2::bigint IS NULL OR user_id = $2)
              AND ($3::bigint IS NULL OR merchant_id = $3)
              AND ($4::text IS NULL OR order_no ILIKE $4)
              AND ($5::timestamptz IS NULL OR created_at >= $5)
              AND ($6::timestamptz IS NULL OR created_at < $6)
        "#;

        let status = filter.status.map(|s| s.as_str());
        let order_no_pattern = filter.order_no.as_ref().map(|no| format!("%{no}%"));

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM payment_orders {WHERE}"))
            .bind(status)
            .bind(filter.user_id)
            .bind(filter.merchant_id)
            .bind(&order_no_pattern)
            .bind(filter.start_time)
            .bind(filter.end_time)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM payment_orders {WHERE} ORDER BY created_at DESC, id DESC LIMIT $7 OFFSET $8"
        );
        let orders = sqlx::query_as::<_, PaymentOrder>(&sql)
            .bind(status)
            .bind(filter.user_id)
            .bind(filter.merchant_id)
            .bind(&order_no_pattern)
            .bind(filter.start_time)
            .bind(filter.end_time)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok((orders, total))
    }

    /// 订单统计
    pub async fn statistics(&self, today_start: DateTime<Utc>) -> Result<OrderStatistics> {
        let stats = sqlx::query_as::<_, OrderStatistics>(
            r#"
            SELECT
                COUNT(*)                                                AS total_orders,
                COUNT(*) FILTER (WHERE status = 'pending')              AS pending_orders,
                COUNT(*) FILTER (WHERE status = 'paid')                 AS paid_orders,
                COUNT(*) FILTER (WHERE status = 'failed')               AS failed_orders,
                COUNT(*) FILTER (WHERE status = 'expired')              AS expired_orders,
                COUNT(*) FILTER (WHERE status = 'refunded')             AS refunded_orders,
                COALESCE(SUM(amount) FILTER (WHERE status = 'paid'), 0)::bigint AS paid_amount,
                COUNT(*) FILTER (WHERE created_at >= $1)                AS today_orders,
                COALESCE(SUM(amount) FILTER (WHERE status = 'paid' AND paid_at >= $1), 0)::bigint
                                                                        AS today_paid_amount
            FROM payment_orders
            "#,
        )
        .bind(today_start)
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }

    /// 过期一批超时未支付的订单
    ///
    /// `SKIP LOCKED` 跳过正在被支付回调锁定的订单，多个实例并发执行互不阻塞
    pub async fn expire_stale(&self, now: DateTime<Utc>, batch_size: i64) -> Result<Vec<String>> {
        let order_nos = sqlx::query_scalar::<_, String>(
            r#"
            WITH stale AS (
                SELECT id FROM payment_orders
                WHERE status = 'pending' AND expired_at < $1
                ORDER BY expired_at
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            UPDATE payment_orders o
            SET status = 'expired', updated_at = NOW()
            FROM stale
            WHERE o.id = stale.id AND o.status = 'pending'
            RETURNING o.order_no
            "#,
        )
        .bind(now)
        .bind(batch_size)
        .fetch_all(&self.pool)
        .await?;

        Ok(order_nos)
    }

    // ==================== 事务内操作 ====================

    /// 在事务中锁定订单行
    pub async fn lock_by_order_no_in_tx(
        tx: &mut PgConnection,
        order_no: &str,
    ) -> Result<Option<PaymentOrder>> {
        let sql =
            format!("SELECT {ORDER_COLUMNS} FROM payment_orders WHERE order_no = $1 FOR UPDATE");
        let order = sqlx::query_as::<_, PaymentOrder>(&sql)
            .bind(order_no)
            .fetch_optional(tx)
            .await?;

        Ok(order)
    }

    /// 在事务中按 ID 锁定订单行
    pub async fn lock_by_id_in_tx(tx: &mut PgConnection, id: i64) -> Result<Option<PaymentOrder>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM payment_orders WHERE id = $1 FOR UPDATE");
        let order = sqlx::query_as::<_, PaymentOrder>(&sql)
            .bind(id)
            .fetch_optional(tx)
            .await?;

        Ok(order)
    }

    /// 待支付 → 已支付
    ///
    /// 返回 None 表示订单已不处于待支付状态
    pub async fn mark_paid_in_tx(
        tx: &mut PgConnection,
        id: i64,
        transaction_id: Option<&str>,
        paid_at: DateTime<Utc>,
    ) -> Result<Option<PaymentOrder>> {
        let sql = format!(
            r#"
            UPDATE payment_orders
            SET status = 'paid', transaction_id = COALESCE($2, transaction_id),
                paid_at = $3, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {ORDER_COLUMNS}
            "#
        );
        let order = sqlx::query_as::<_, PaymentOrder>(&sql)
            .bind(id)
            .bind(transaction_id)
            .bind(paid_at)
            .fetch_optional(tx)
            .await?;

        Ok(order)
    }

    /// 待支付 → 支付失败
    pub async fn mark_failed_in_tx(
        tx: &mut PgConnection,
        id: i64,
        transaction_id: Option<&str>,
    ) -> Result<Option<PaymentOrder>> {
        let sql = format!(
            r#"
            UPDATE payment_orders
            SET status = 'failed', transaction_id = COALESCE($2, transaction_id), updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {ORDER_COLUMNS}
            "#
        );
        let order = sqlx::query_as::<_, PaymentOrder>(&sql)
            .bind(id)
            .bind(transaction_id)
            .fetch_optional(tx)
            .await?;

        Ok(order)
    }

    /// 已支付 → 已退款
    pub async fn mark_refunded_in_tx(
        tx: &mut PgConnection,
        id: i64,
        reason: &str,
        refunded_at: DateTime<Utc>,
    ) -> Result<Option<PaymentOrder>> {
        let sql = format!(
            r#"
            UPDATE payment_orders
            SET status = $2, refund_reason = $3, refunded_at = $4, updated_at = NOW()
            WHERE id = $1 AND status = $5
            RETURNING {ORDER_COLUMNS}
            "#
        );
        let order = sqlx::query_as::<_, PaymentOrder>(&sql)
            .bind(id)
            .bind(OrderStatus::Refunded)
            .bind(reason)
            .bind(refunded_at)
            .bind(OrderStatus::Paid)
            .fetch_optional(tx)
            .await?;

        Ok(order)
    }

    /// 记录订单已发放的积分
    pub async fn set_points_awarded_in_tx(tx: &mut PgConnection, id: i64, points: i64) -> Result<()> {
        sqlx::query("UPDATE payment_orders SET points_awarded = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(points)
            .execute(tx)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl OrderRepositoryTrait for OrderRepository {
    async fn create(&self, order: &NewOrder) -> Result<Option<PaymentOrder>> {
        self.create(order).await
    }

    async fn get_by_order_no(&self, order_no: &str) -> Result<Option<PaymentOrder>> {
        self.get_by_order_no(order_no).await
    }

    async fn list_by_user(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<PaymentOrder>, i64)> {
        self.list_by_user(user_id, limit, offset).await
    }

    async fn list(
        &self,
        filter: &OrderFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<PaymentOrder>, i64)> {
        self.list(filter, limit, offset).await
    }

    async fn statistics(&self, today_start: DateTime<Utc>) -> Result<OrderStatistics> {
        self.statistics(today_start).await
    }

    async fn expire_stale(&self, now: DateTime<Utc>, batch_size: i64) -> Result<Vec<String>> {
        self.expire_stale(now, batch_size).await
    }
}
