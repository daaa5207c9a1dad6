//! 积分查询服务
//!
//! 只读操作：余额概览、流水历史、全局统计和余额对账

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{instrument, warn};

use crate::error::{PointsError, Result};
use crate::models::PointsLedgerEntry;
use crate::repository::{LedgerRepositoryTrait, UserRepositoryTrait};
use crate::service::dto::{
    BalanceSummary, BalanceVerification, LedgerFilter, Page, PointsStatistics,
};

/// 统计"即将过期"积分的时间窗口
pub const EXPIRING_SOON_DAYS: i64 = 30;

pub struct PointsQueryService<LR, UR>
where
    LR: LedgerRepositoryTrait,
    UR: UserRepositoryTrait,
{
    ledger_repo: Arc<LR>,
    user_repo: Arc<UR>,
}

impl<LR, UR> PointsQueryService<LR, UR>
where
    LR: LedgerRepositoryTrait,
    UR: UserRepositoryTrait,
{
    pub fn new(ledger_repo: Arc<LR>, user_repo: Arc<UR>) -> Self {
        Self {
            ledger_repo,
            user_repo,
        }
    }

    /// 用户积分余额概览
    #[instrument(skip(self))]
    pub async fn balance_summary(&self, user_id: i64, now: DateTime<Utc>) -> Result<BalanceSummary> {
        let user = self
            .user_repo
            .get(user_id)
            .await?
            .ok_or(PointsError::UserNotFound(user_id))?;

        let totals = self.ledger_repo.totals_by_user(user_id).await?;
        let expiring = self
            .ledger_repo
            .expiring_between(user_id, now, now + Duration::days(EXPIRING_SOON_DAYS))
            .await?;

        Ok(BalanceSummary {
            user_id,
            balance: user.points_balance,
            total_earned: totals.total_earned,
            total_spent: totals.total_spent,
            expiring_soon: expiring.clamp(0, user.points_balance.max(0)),
        })
    }

    /// 用户积分流水，最新的在前
    pub async fn history(
        &self,
        user_id: i64,
        filter: LedgerFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Page<PointsLedgerEntry>> {
        let (items, total) = self
            .ledger_repo
            .list_by_user(user_id, filter.source, limit, offset)
            .await?;
        Ok(Page::new(items, total))
    }

    pub async fn statistics(&self) -> Result<PointsStatistics> {
        self.ledger_repo.statistics().await
    }

    /// 对账：冗余余额 = 流水之和 = 最新快照
    #[instrument(skip(self))]
    pub async fn verify_balance(&self, user_id: i64) -> Result<BalanceVerification> {
        let user = self
            .user_repo
            .get(user_id)
            .await?
            .ok_or(PointsError::UserNotFound(user_id))?;
        let totals = self.ledger_repo.totals_by_user(user_id).await?;

        let latest_snapshot = totals.latest_balance.unwrap_or(0);
        let consistent =
            user.points_balance == totals.ledger_sum && user.points_balance == latest_snapshot;

        if !consistent {
            warn!(
                user_id,
                cached = user.points_balance,
                ledger_sum = totals.ledger_sum,
                latest_snapshot,
                "积分余额与流水不一致"
            );
        }

        Ok(BalanceVerification {
            user_id,
            cached_balance: user.points_balance,
            ledger_sum: totals.ledger_sum,
            latest_snapshot,
            entry_count: totals.entry_count,
            consistent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{User, UserStatus};
    use crate::repository::{MockLedgerRepositoryTrait, MockUserRepositoryTrait};
    use crate::service::dto::LedgerTotals;

    fn user_with_balance(id: i64, balance: i64) -> User {
        let now = Utc::now();
        User {
            id,
            wechat_openid: format!("openid_{id}"),
            wechat_unionid: None,
            nickname: None,
            avatar_url: None,
            phone: None,
            status: UserStatus::Active,
            points_balance: balance,
            created_at: now,
            updated_at: now,
        }
    }

    fn user_repo_with(balance: i64) -> MockUserRepositoryTrait {
        let mut repo = MockUserRepositoryTrait::new();
        repo.expect_get()
            .returning(move |id| Ok(Some(user_with_balance(id, balance))));
        repo
    }

    #[tokio::test]
    async fn test_balance_summary_caps_expiring_at_balance() {
        let mut ledger_repo = MockLedgerRepositoryTrait::new();
        ledger_repo.expect_totals_by_user().returning(|_| {
            Ok(LedgerTotals {
                total_earned: 500,
                total_spent: 420,
                ledger_sum: 80,
                entry_count: 4,
                latest_balance: Some(80),
            })
        });
        ledger_repo
            .expect_expiring_between()
            .withf(|_, from, until| *until - *from == Duration::days(EXPIRING_SOON_DAYS))
            .returning(|_, _, _| Ok(200));

        let service = PointsQueryService::new(Arc::new(ledger_repo), Arc::new(user_repo_with(80)));
        let summary = service.balance_summary(1, Utc::now()).await.unwrap();

        assert_eq!(summary.balance, 80);
        assert_eq!(summary.total_earned, 500);
        assert_eq!(summary.total_spent, 420);
        assert_eq!(summary.expiring_soon, 80);
    }

    #[tokio::test]
    async fn test_balance_summary_unknown_user() {
        let mut user_repo = MockUserRepositoryTrait::new();
        user_repo.expect_get().returning(|_| Ok(None));

        let service =
            PointsQueryService::new(Arc::new(MockLedgerRepositoryTrait::new()), Arc::new(user_repo));
        assert!(matches!(
            service.balance_summary(9, Utc::now()).await,
            Err(PointsError::UserNotFound(9))
        ));
    }

    #[tokio::test]
    async fn test_verify_balance_consistent() {
        let mut ledger_repo = MockLedgerRepositoryTrait::new();
        ledger_repo.expect_totals_by_user().returning(|_| {
            Ok(LedgerTotals {
                total_earned: 300,
                total_spent: 0,
                ledger_sum: 300,
                entry_count: 2,
                latest_balance: Some(300),
            })
        });

        let service = PointsQueryService::new(Arc::new(ledger_repo), Arc::new(user_repo_with(300)));
        let result = service.verify_balance(1).await.unwrap();
        assert!(result.consistent);
        assert_eq!(result.entry_count, 2);
    }

    #[tokio::test]
    async fn test_verify_balance_detects_drift() {
        let mut ledger_repo = MockLedgerRepositoryTrait::new();
        ledger_repo.expect_totals_by_user().returning(|_| {
            Ok(LedgerTotals {
                total_earned: 300,
                total_spent: 0,
                ledger_sum: 300,
                entry_count: 2,
                latest_balance: Some(300),
            })
        });

        let service = PointsQueryService::new(Arc::new(ledger_repo), Arc::new(user_repo_with(350)));
        let result = service.verify_balance(1).await.unwrap();
        assert!(!result.consistent);
        assert_eq!(result.cached_balance, 350);
        assert_eq!(result.ledger_sum, 300);
    }

    #[tokio::test]
    async fn test_verify_balance_without_entries() {
        let mut ledger_repo = MockLedgerRepositoryTrait::new();
        ledger_repo
            .expect_totals_by_user()
            .returning(|_| Ok(LedgerTotals::default()));

        let service = PointsQueryService::new(Arc::new(ledger_repo), Arc::new(user_repo_with(0)));
        let result = service.verify_balance(1).await.unwrap();
        assert!(result.consistent);
        assert_eq!(result.latest_snapshot, 0);
    }
}
