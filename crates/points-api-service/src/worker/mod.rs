//! 后台定时任务

pub mod order_expire_worker;
pub mod points_expire_worker;

pub use order_expire_worker::OrderExpireWorker;
pub use points_expire_worker::PointsExpireWorker;
