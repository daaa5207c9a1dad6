//! 商户仓储

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use super::traits::MerchantRepositoryTrait;
use crate::error::{PointsError, Result};
use crate::models::{Merchant, MerchantUpdate, NewMerchant};
use crate::service::dto::{
    MerchantDailyTrend, MerchantFilter, MerchantOrderOverview, MerchantStatistics,
};

const MERCHANT_COLUMNS: &str = r#"
    id, merchant_no, name, contact_person, contact_phone, business_license, status,
    total_amount, total_orders, created_at, updated_at
"#;

/// Postgres 唯一约束冲突错误码
const UNIQUE_VIOLATION: &str = "23505";

/// 商户仓储
pub struct MerchantRepository {
    pool: PgPool,
}

impl MerchantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i64) -> Result<Option<Merchant>> {
        let sql = format!("SELECT {MERCHANT_COLUMNS} FROM merchants WHERE id = $1");
        let merchant = sqlx::query_as::<_, Merchant>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(merchant)
    }

    pub async fn create(&self, merchant: &NewMerchant) -> Result<Merchant> {
        let sql = format!(
            r#"
            INSERT INTO merchants (merchant_no, name, contact_person, contact_phone, business_license, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {MERCHANT_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Merchant>(&sql)
            .bind(&merchant.merchant_no)
            .bind(&merchant.name)
            .bind(&merchant.contact_person)
            .bind(&merchant.contact_phone)
            .bind(&merchant.business_license)
            .bind(merchant.status)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                    PointsError::DuplicateMerchantNo(merchant.merchant_no.clone())
                }
                other => PointsError::from(other),
            })
    }

    pub async fn update(&self, id: i64, update: &MerchantUpdate) -> Result<Option<Merchant>> {
        let sql = format!(
            r#"
            UPDATE merchants SET
                name = COALESCE($2, name),
                contact_person = COALESCE($3, contact_person),
                contact_phone = COALESCE($4, contact_phone),
                business_license = COALESCE($5, business_license),
                status = COALESCE($6, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {MERCHANT_COLUMNS}
            "#
        );
        let merchant = sqlx::query_as::<_, Merchant>(&sql)
            .bind(id)
            .bind(&update.name)
            .bind(&update.contact_person)
            .bind(&update.contact_phone)
            .bind(&update.business_license)
            .bind(update.status)
            .fetch_optional(&self.pool)
            .await?;

        Ok(merchant)
    }

    pub async fn list(
        &self,
        filter: &MerchantFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Merchant>, i64)> {
        const WHERE: &str = r#"
            WHERE ($1::text IS NULL OR name ILIKE $1 OR merchant_no ILIKE $1)
              AND ($2::varchar IS NULL OR status = $2)
        "#;

        let keyword = filter.keyword.as_ref().map(|k| format!("%{k}%"));

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM merchants {WHERE}"))
            .bind(&keyword)
            .bind(filter.status)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {MERCHANT_COLUMNS} FROM merchants {WHERE} ORDER BY created_at DESC, id DESC LIMIT $3 OFFSET $4"
        );
        let merchants = sqlx::query_as::<_, Merchant>(&sql)
            .bind(&keyword)
            .bind(filter.status)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok((merchants, total))
    }

    pub async fn statistics(&self) -> Result<MerchantStatistics> {
        let stats = sqlx::query_as::<_, MerchantStatistics>(
            r#"
            SELECT
                COUNT(*)                                   AS total_merchants,
                COUNT(*) FILTER (WHERE status = 'active')   AS active_merchants,
                COUNT(*) FILTER (WHERE status = 'inactive') AS inactive_merchants,
                COUNT(*) FILTER (WHERE status = 'pending')  AS pending_merchants
            FROM merchants
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }

    pub async fn order_overview(&self, merchant_id: i64) -> Result<MerchantOrderOverview> {
        let overview = sqlx::query_as::<_, MerchantOrderOverview>(
            r#"
            SELECT
                COUNT(DISTINCT user_id)                                          AS total_users,
                COUNT(*)                                                         AS total_orders,
                COUNT(*) FILTER (WHERE status = 'paid')                          AS paid_orders,
                COALESCE(SUM(amount) FILTER (WHERE status = 'paid'), 0)::bigint  AS paid_amount,
                COALESCE(SUM(points_awarded) FILTER (WHERE status = 'paid'), 0)::bigint
                                                                                 AS points_awarded
            FROM payment_orders
            WHERE merchant_id = $1
            "#,
        )
        .bind(merchant_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(overview)
    }

    pub async fn daily_trend(
        &self,
        merchant_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<MerchantDailyTrend>> {
        let trend = sqlx::query_as::<_, MerchantDailyTrend>(
            r#"
            SELECT
                (created_at AT TIME ZONE 'UTC')::date                           AS day,
                COUNT(*)                                                        AS orders,
                COALESCE(SUM(amount) FILTER (WHERE status = 'paid'), 0)::bigint AS paid_amount
            FROM payment_orders
            WHERE merchant_id = $1 AND created_at >= $2
            GROUP BY day
            ORDER BY day
            "#,
        )
        .bind(merchant_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(trend)
    }

    // ==================== 事务内操作 ====================

    /// 在支付确认事务中累加商户收款统计
    pub async fn add_payment_in_tx(tx: &mut PgConnection, id: i64, amount: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE merchants
            SET total_amount = total_amount + $2, total_orders = total_orders + 1, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(amount)
        .execute(tx)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl MerchantRepositoryTrait for MerchantRepository {
    async fn get(&self, id: i64) -> Result<Option<Merchant>> {
        self.get(id).await
    }

    async fn create(&self, merchant: &NewMerchant) -> Result<Merchant> {
        self.create(merchant).await
    }

    async fn update(&self, id: i64, update: &MerchantUpdate) -> Result<Option<Merchant>> {
        self.update(id, update).await
    }

    async fn list(
        &self,
        filter: &MerchantFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Merchant>, i64)> {
        self.list(filter, limit, offset).await
    }

    async fn statistics(&self) -> Result<MerchantStatistics> {
        self.statistics().await
    }

    async fn order_overview(&self, merchant_id: i64) -> Result<MerchantOrderOverview> {
        self.order_overview(merchant_id).await
    }

    async fn daily_trend(
        &self,
        merchant_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<MerchantDailyTrend>> {
        self.daily_trend(merchant_id, since).await
    }
}
