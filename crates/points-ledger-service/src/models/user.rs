//! 用户实体定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::UserStatus;

/// 小程序用户
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub wechat_openid: String,
    #[sqlx(default)]
    pub wechat_unionid: Option<String>,
    #[sqlx(default)]
    pub nickname: Option<String>,
    #[sqlx(default)]
    pub avatar_url: Option<String>,
    #[sqlx(default)]
    pub phone: Option<String>,
    pub status: UserStatus,
    /// 当前积分余额（流水最新快照的冗余）
    pub points_balance: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 微信登录时的用户资料
#[derive(Debug, Clone, Default)]
pub struct UserProfile {
    pub openid: String,
    pub unionid: Option<String>,
    pub nickname: Option<String>,
    pub avatar_url: Option<String>,
}
