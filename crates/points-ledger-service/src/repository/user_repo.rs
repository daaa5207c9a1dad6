//! 用户仓储

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use super::traits::UserRepositoryTrait;
use crate::error::Result;
use crate::models::{User, UserProfile, UserStatus};
use crate::service::dto::{UserFilter, UserStatistics};

const USER_COLUMNS: &str = r#"
    id, wechat_openid, wechat_unionid, nickname, avatar_url, phone, status, points_balance,
    created_at, updated_at
"#;

/// 用户仓储
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    pub async fn get_by_openid(&self, openid: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE wechat_openid = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(openid)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// 按 openid 创建或更新用户
    ///
    /// 已存在的用户只补充非空的资料字段，不影响状态和余额
    pub async fn upsert_by_openid(&self, profile: &UserProfile) -> Result<User> {
        let sql = format!(
            r#"
            INSERT INTO users (wechat_openid, wechat_unionid, nickname, avatar_url)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (wechat_openid) DO UPDATE SET
                wechat_unionid = COALESCE(EXCLUDED.wechat_unionid, users.wechat_unionid),
                nickname = COALESCE(EXCLUDED.nickname, users.nickname),
                avatar_url = COALESCE(EXCLUDED.avatar_url, users.avatar_url),
                updated_at = NOW()
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(&profile.openid)
            .bind(&profile.unionid)
            .bind(&profile.nickname)
            .bind(&profile.avatar_url)
            .fetch_one(&self.pool)
            .await?;

        Ok(user)
    }

    pub async fn list(
        &self,
        filter: &UserFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<User>, i64)> {
        const WHERE: &str = r#"
            WHERE ($1::text IS NULL OR nickname ILIKE $1 OR phone ILIKE $1 OR wechat_openid ILIKE $1)
              AND ($2::varchar IS NULL OR status = $2)
        "#;

        let keyword = filter.keyword.as_ref().map(|k| format!("%{k}%"));
        let status = filter.status;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM users {WHERE}"))
            .bind(&keyword)
            .bind(status)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users {WHERE} ORDER BY created_at DESC, id DESC LIMIT $3 OFFSET $4"
        );
        let users = sqlx::query_as::<_, User>(&sql)
            .bind(&keyword)
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok((users, total))
    }

    pub async fn update_status(&self, id: i64, status: UserStatus) -> Result<Option<User>> {
        let sql = format!(
            "UPDATE users SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(status)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    pub async fn statistics(&self, today_start: DateTime<Utc>) -> Result<UserStatistics> {
        let stats = sqlx::query_as::<_, UserStatistics>(
            r#"
            SELECT
                COUNT(*)                                     AS total_users,
                COUNT(*) FILTER (WHERE status = 'active')    AS active_users,
                COUNT(*) FILTER (WHERE status = 'banned')    AS banned_users,
                COUNT(*) FILTER (WHERE created_at >= $1)     AS new_users_today,
                COALESCE(SUM(points_balance), 0)::bigint     AS total_points_balance
            FROM users
            "#,
        )
        .bind(today_start)
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }

    // ==================== 事务内操作 ====================

    /// 在事务中锁定用户行，串行化同一用户的余额变动
    pub async fn lock_in_tx(tx: &mut PgConnection, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(tx)
            .await?;

        Ok(user)
    }

    /// 在事务中写入新余额
    pub async fn update_balance_in_tx(tx: &mut PgConnection, id: i64, balance: i64) -> Result<()> {
        sqlx::query("UPDATE users SET points_balance = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(balance)
            .execute(tx)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl UserRepositoryTrait for UserRepository {
    async fn get(&self, id: i64) -> Result<Option<User>> {
        self.get(id).await
    }

    async fn get_by_openid(&self, openid: &str) -> Result<Option<User>> {
        self.get_by_openid(openid).await
    }

    async fn upsert_by_openid(&self, profile: &UserProfile) -> Result<User> {
        self.upsert_by_openid(profile).await
    }

    async fn list(&self, filter: &UserFilter, limit: i64, offset: i64) -> Result<(Vec<User>, i64)> {
        self.list(filter, limit, offset).await
    }

    async fn update_status(&self, id: i64, status: UserStatus) -> Result<Option<User>> {
        self.update_status(id, status).await
    }

    async fn statistics(&self, today_start: DateTime<Utc>) -> Result<UserStatistics> {
        self.statistics(today_start).await
    }
}
