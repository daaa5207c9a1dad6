//! 用户服务
//!
//! 小程序用户的登录注册和后台管理

use std::sync::Arc;

use chrono::{DateTime, Utc};
use points_shared::crypto::mask_openid;
use tracing::{info, instrument};

use crate::error::{PointsError, Result};
use crate::models::{User, UserProfile, UserStatus};
use crate::repository::UserRepositoryTrait;
use crate::service::dto::{Page, UserFilter, UserStatistics};
use crate::service::order_ledger::start_of_day;

pub struct UserService<UR>
where
    UR: UserRepositoryTrait,
{
    user_repo: Arc<UR>,
}

impl<UR> UserService<UR>
where
    UR: UserRepositoryTrait,
{
    pub fn new(user_repo: Arc<UR>) -> Self {
        Self { user_repo }
    }

    pub async fn get(&self, user_id: i64) -> Result<User> {
        self.user_repo
            .get(user_id)
            .await?
            .ok_or(PointsError::UserNotFound(user_id))
    }

    /// 微信登录：首次登录自动注册，已有用户补充资料
    ///
    /// 被禁用的用户不能登录
    #[instrument(skip(self, profile), fields(openid = %mask_openid(&profile.openid)))]
    pub async fn login_or_register(&self, profile: &UserProfile) -> Result<User> {
        if profile.openid.trim().is_empty() {
            return Err(PointsError::Validation("openid 不能为空".to_string()));
        }

        let user = self.user_repo.upsert_by_openid(profile).await?;
        if !user.status.is_active() {
            return Err(PointsError::UserUnavailable(user.id));
        }

        info!(user_id = user.id, "用户登录");
        Ok(user)
    }

    pub async fn list(&self, filter: &UserFilter, limit: i64, offset: i64) -> Result<Page<User>> {
        let (items, total) = self.user_repo.list(filter, limit, offset).await?;
        Ok(Page::new(items, total))
    }

    #[instrument(skip(self))]
    pub async fn update_status(&self, user_id: i64, status: UserStatus) -> Result<User> {
        let user = self
            .user_repo
            .update_status(user_id, status)
            .await?
            .ok_or(PointsError::UserNotFound(user_id))?;

        info!(user_id, status = ?status, "用户状态已更新");
        Ok(user)
    }

    pub async fn statistics(&self, now: DateTime<Utc>) -> Result<UserStatistics> {
        self.user_repo.statistics(start_of_day(now)).await
    }
}
