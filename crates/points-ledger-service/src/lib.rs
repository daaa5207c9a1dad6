//! 支付订单与积分账本服务
//!
//! 负责支付订单的生命周期（创建、确认、失败、过期、退款）以及积分的发放、
//! 消费、调整和过期。所有余额变动都在单个数据库事务内同时写入流水和用户余额。
//!
//! ## 模块结构
//!
//! - `models`: 领域模型与枚举
//! - `repository`: 数据访问层
//! - `service`: 订单账本、积分发放引擎和查询服务
//! - `error`: 错误类型

pub mod error;
pub mod models;
pub mod repository;
pub mod service;

pub use error::{PointsError, Result};
pub use models::{
    Merchant, MerchantStatus, OrderStatus, PaymentOrder, PointsLedgerEntry, PointsSource, User,
    UserStatus,
};
