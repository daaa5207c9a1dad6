//! 数据库仓储层
//!
//! 提供所有实体的数据访问接口，封装 SQL 操作细节。
//!
//! - 仓储只负责数据持久化，不包含业务逻辑
//! - 事务控制由调用方（服务层）决定，事务内操作以 `*_in_tx` 命名
//! - 定义 trait 接口以支持 mock 测试

mod ledger_repo;
mod merchant_repo;
mod order_repo;
mod traits;
mod user_repo;

pub use ledger_repo::PointsLedgerRepository;
pub use merchant_repo::MerchantRepository;
pub use order_repo::OrderRepository;
pub use traits::*;
pub use user_repo::UserRepository;
