//! 超时订单过期 Worker
//!
//! 定期将超过支付时限仍未支付的订单标记为 expired。
//! 过期语句使用 `FOR UPDATE SKIP LOCKED`，多实例同时运行不会重复处理。

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use points_shared::config::WorkerConfig;
use points_shared::observability::metrics;
use tokio::sync::watch;
use tracing::{error, info};

use crate::state::Ledger;

const WORKER_NAME: &str = "order_expire_worker";

pub struct OrderExpireWorker {
    ledger: Arc<Ledger>,
    /// 轮询间隔
    poll_interval: Duration,
    /// 每批处理的最大订单数
    batch_size: i64,
}

impl OrderExpireWorker {
    pub fn new(ledger: Arc<Ledger>, poll_interval_secs: u64, batch_size: i64) -> Self {
        Self {
            ledger,
            poll_interval: Duration::from_secs(poll_interval_secs.max(1)),
            batch_size,
        }
    }

    pub fn from_config(ledger: Arc<Ledger>, config: &WorkerConfig) -> Self {
        Self::new(
            ledger,
            config.order_expire_interval_secs,
            config.order_expire_batch_size,
        )
    }

    /// 主循环：收到关闭信号后退出
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            poll_interval = ?self.poll_interval,
            batch_size = self.batch_size,
            "OrderExpireWorker 已启动"
        );

        loop {
            self.run_once().await;
            metrics::set_worker_last_run(WORKER_NAME);

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!("OrderExpireWorker 已停止");
    }

    /// 执行一轮过期扫描，返回过期的订单数
    pub async fn run_once(&self) -> u64 {
        match self
            .ledger
            .expire_stale_orders(Utc::now(), self.batch_size)
            .await
        {
            Ok(expired) => {
                if expired > 0 {
                    info!(expired, "超时订单已过期");
                }
                expired
            }
            Err(e) => {
                error!(error = %e, "处理超时订单出错");
                0
            }
        }
    }
}
