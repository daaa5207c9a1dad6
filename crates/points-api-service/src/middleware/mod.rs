//! 中间件模块
//!
//! 提供认证、角色检查和限流中间件

mod auth;
mod permission;
mod rate_limit;

pub use auth::{auth_middleware, is_public_path};
pub use permission::{Access, require_role};
pub use rate_limit::{RateDecision, RateLimiter, RateTier, classify, rate_limit_middleware};
