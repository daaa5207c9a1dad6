//! API 服务自有的数据访问

pub mod admin_user_repo;

pub use admin_user_repo::{AdminUser, AdminUserRepository, AdminUserUpdate};
