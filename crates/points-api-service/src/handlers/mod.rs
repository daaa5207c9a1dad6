//! HTTP 请求处理器
//!
//! - 小程序：`auth`、`payment`、`points`
//! - 支付通知：`notify`
//! - 后台：`orders`、`users`、`merchants`、`stats`
//! - 管理员账号：`admin_users`

pub mod admin_users;
pub mod auth;
pub mod health;
pub mod merchants;
pub mod notify;
pub mod orders;
pub mod payment;
pub mod points;
pub mod stats;
pub mod users;
