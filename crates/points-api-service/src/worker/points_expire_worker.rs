//! 积分过期 Worker
//!
//! 定期核销已到期的支付奖励，按先进先出扣减其中尚未消费的积分

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use points_ledger::service::dto::ExpireOutcome;
use points_shared::config::WorkerConfig;
use points_shared::observability::metrics;
use tokio::sync::watch;
use tracing::{error, info};

use crate::state::Engine;

const WORKER_NAME: &str = "points_expire_worker";

pub struct PointsExpireWorker {
    engine: Arc<Engine>,
    poll_interval: Duration,
    batch_size: i64,
}

impl PointsExpireWorker {
    pub fn new(engine: Arc<Engine>, poll_interval_secs: u64, batch_size: i64) -> Self {
        Self {
            engine,
            poll_interval: Duration::from_secs(poll_interval_secs.max(1)),
            batch_size,
        }
    }

    pub fn from_config(engine: Arc<Engine>, config: &WorkerConfig) -> Self {
        Self::new(
            engine,
            config.points_expire_interval_secs,
            config.points_expire_batch_size,
        )
    }

    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            poll_interval = ?self.poll_interval,
            batch_size = self.batch_size,
            "PointsExpireWorker 已启动"
        );

        loop {
            self.run_once().await;
            metrics::set_worker_last_run(WORKER_NAME);

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!("PointsExpireWorker 已停止");
    }

    pub async fn run_once(&self) -> ExpireOutcome {
        match self.engine.expire_points(Utc::now(), self.batch_size).await {
            Ok(outcome) => {
                if outcome.entries > 0 {
                    info!(
                        users = outcome.users,
                        entries = outcome.entries,
                        points = outcome.points,
                        "到期积分已核销"
                    );
                }
                outcome
            }
            Err(e) => {
                error!(error = %e, "处理积分过期出错");
                ExpireOutcome::default()
            }
        }
    }
}
