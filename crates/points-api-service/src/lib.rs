//! 积分支付 API 服务
//!
//! 面向微信小程序和运营后台的 REST API。
//!
//! ## 核心功能
//!
//! - **登录认证**：小程序 code 换取 openid 登录，后台账号密码登录（失败锁定）
//! - **支付下单**：创建订单、查询订单、接收微信支付 v3 回调
//! - **积分**：余额、流水、消费
//! - **后台管理**：订单退款、手动过期、用户封禁、积分调整与对账、商户维护、统计看板
//! - **后台任务**：超时订单过期、积分到期回收
//!
//! ## 模块结构
//!
//! - `auth`: JWT 与密码哈希
//! - `dto`: 请求和响应的数据传输对象
//! - `error`: 错误类型与统一响应
//! - `handlers`: HTTP 请求处理器
//! - `middleware`: 认证、角色校验、限流
//! - `repository`: 后台管理员账号存储
//! - `routes`: 路由配置
//! - `state`: 应用状态
//! - `wechat`: 微信登录客户端与支付通知解码
//! - `worker`: 后台定时任务
//!
//! ## 技术栈
//!
//! - Web 框架：Axum
//! - 数据验证：validator
//! - 序列化：serde (camelCase)

pub mod auth;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod repository;
pub mod routes;
pub mod state;
pub mod wechat;
pub mod worker;

pub use error::{ApiError, Result};
pub use state::AppState;
