//! 后台管理员数据访问

use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, PgPool};

/// 连续登录失败达到该次数后锁定账号
pub const MAX_FAILED_LOGIN_ATTEMPTS: i32 = 5;
/// 锁定时长（分钟）
pub const LOCK_DURATION_MINUTES: i64 = 30;

/// 管理员账号
#[derive(Debug, Clone, FromRow)]
pub struct AdminUser {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub display_name: Option<String>,
    pub role: String,
    pub status: String,
    pub failed_login_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl AdminUser {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }

    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }
}

/// 计算一次密码错误后的失败次数和锁定截止时间
pub fn failed_login_state(
    previous_attempts: i32,
    now: DateTime<Utc>,
) -> (i32, Option<DateTime<Utc>>) {
    let attempts = previous_attempts.saturating_add(1);
    let locked_until = (attempts >= MAX_FAILED_LOGIN_ATTEMPTS)
        .then(|| now + Duration::minutes(LOCK_DURATION_MINUTES));
    (attempts, locked_until)
}

/// 管理员信息更新，None 表示保持原值
#[derive(Debug, Clone, Default)]
pub struct AdminUserUpdate {
    pub display_name: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
}

const ADMIN_COLUMNS: &str = r#"
    id, username, password_hash, display_name, role, status,
    failed_login_attempts, locked_until, last_login_at, created_at
"#;

pub struct AdminUserRepository {
    pool: PgPool,
}

impl AdminUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<AdminUser>, sqlx::Error> {
        sqlx::query_as::<_, AdminUser>(&format!(
            "SELECT {ADMIN_COLUMNS} FROM admin_users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn record_failed_login(
        &self,
        id: i64,
        attempts: i32,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE admin_users
            SET failed_login_attempts = $1, locked_until = $2, updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(attempts)
        .bind(locked_until)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// 重置失败次数并更新最后登录时间
    pub async fn record_successful_login(&self, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE admin_users
            SET failed_login_attempts = 0, locked_until = NULL,
                last_login_at = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM admin_users")
            .fetch_one(&self.pool)
            .await
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<AdminUser>, sqlx::Error> {
        sqlx::query_as::<_, AdminUser>(&format!(
            "SELECT {ADMIN_COLUMNS} FROM admin_users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// 分页列出管理员，按 id 升序
    pub async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<AdminUser>, i64), sqlx::Error> {
        let admins = sqlx::query_as::<_, AdminUser>(&format!(
            "SELECT {ADMIN_COLUMNS} FROM admin_users ORDER BY id ASC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        let total = self.count().await?;
        Ok((admins, total))
    }

    /// 创建管理员，用户名已存在时返回 None
    pub async fn insert(
        &self,
        username: &str,
        password_hash: &str,
        display_name: Option<&str>,
        role: &str,
    ) -> Result<Option<AdminUser>, sqlx::Error> {
        sqlx::query_as::<_, AdminUser>(&format!(
            r#"
            INSERT INTO admin_users (username, password_hash, display_name, role)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (username) DO NOTHING
            RETURNING {ADMIN_COLUMNS}
            "#
        ))
        .bind(username)
        .bind(password_hash)
        .bind(display_name)
        .bind(role)
        .fetch_optional(&self.pool)
        .await
    }

    /// 创建管理员，用户名已存在时不做任何修改并返回 false
    pub async fn create(
        &self,
        username: &str,
        password_hash: &str,
        display_name: Option<&str>,
        role: &str,
    ) -> Result<bool, sqlx::Error> {
        Ok(self
            .insert(username, password_hash, display_name, role)
            .await?
            .is_some())
    }

    /// 更新显示名称、角色和状态，账号不存在时返回 None
    pub async fn update(
        &self,
        id: i64,
        update: &AdminUserUpdate,
    ) -> Result<Option<AdminUser>, sqlx::Error> {
        sqlx::query_as::<_, AdminUser>(&format!(
            r#"
            UPDATE admin_users
            SET display_name = COALESCE($2, display_name),
                role = COALESCE($3, role),
                status = COALESCE($4, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ADMIN_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(update.display_name.as_deref())
        .bind(update.role.as_deref())
        .bind(update.status.as_deref())
        .fetch_optional(&self.pool)
        .await
    }

    /// 写入新密码哈希，同时解除登录锁定
    pub async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE admin_users
            SET password_hash = $2, failed_login_attempts = 0, locked_until = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM admin_users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin(status: &str, locked_until: Option<DateTime<Utc>>) -> AdminUser {
        AdminUser {
            id: 1,
            username: "admin".to_string(),
            password_hash: String::new(),
            display_name: None,
            role: "admin".to_string(),
            status: status.to_string(),
            failed_login_attempts: 0,
            locked_until,
            last_login_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_lock_after_max_attempts() {
        let now = Utc::now();

        let (attempts, locked) = failed_login_state(3, now);
        assert_eq!(attempts, 4);
        assert!(locked.is_none());

        let (attempts, locked) = failed_login_state(4, now);
        assert_eq!(attempts, MAX_FAILED_LOGIN_ATTEMPTS);
        assert_eq!(locked, Some(now + Duration::minutes(LOCK_DURATION_MINUTES)));
    }

    #[test]
    fn test_lock_expires() {
        let now = Utc::now();
        assert!(admin("active", Some(now + Duration::minutes(1))).is_locked(now));
        assert!(!admin("active", Some(now - Duration::minutes(1))).is_locked(now));
        assert!(!admin("active", None).is_locked(now));
    }

    #[test]
    fn test_inactive_admin() {
        assert!(admin("active", None).is_active());
        assert!(!admin("disabled", None).is_active());
    }
}
