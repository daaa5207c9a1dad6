//! 服务层
//!
//! - `order_ledger`: 支付订单生命周期
//! - `award_engine`: 积分发放、消费、调整和过期
//! - `query_service`: 积分只读查询与对账
//! - `user_service` / `merchant_service`: 用户与商户管理

pub mod award_engine;
pub mod dto;
pub mod merchant_service;
pub mod order_ledger;
pub mod query_service;
pub mod user_service;

pub use award_engine::{AwardOutcome, PointsAwardEngine, calculate_points};
pub use merchant_service::MerchantService;
pub use order_ledger::{OrderLedgerService, start_of_day};
pub use query_service::PointsQueryService;
pub use user_service::UserService;
