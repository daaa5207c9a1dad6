//! 共享库
//!
//! 包含积分与支付服务共用的配置、错误处理、数据库连接、加解密和可观测性等基础设施代码。

pub mod config;
pub mod crypto;
pub mod database;
pub mod error;
pub mod observability;
pub mod test_utils;
