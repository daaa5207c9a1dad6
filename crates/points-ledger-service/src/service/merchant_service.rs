//! 商户服务

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument};

use crate::error::{PointsError, Result};
use crate::models::{Merchant, MerchantUpdate, NewMerchant};
use crate::repository::MerchantRepositoryTrait;
use crate::service::dto::{MerchantDetailStatistics, MerchantFilter, MerchantStatistics, Page};
use crate::service::order_ledger::start_of_day;

const MAX_MERCHANT_NAME_CHARS: usize = 100;
const MAX_MERCHANT_NO_CHARS: usize = 32;
/// 商户趋势统计覆盖的天数（含当天）
pub const MERCHANT_TREND_DAYS: i64 = 7;

pub struct MerchantService<MR>
where
    MR: MerchantRepositoryTrait,
{
    merchant_repo: Arc<MR>,
}

impl<MR> MerchantService<MR>
where
    MR: MerchantRepositoryTrait,
{
    pub fn new(merchant_repo: Arc<MR>) -> Self {
        Self { merchant_repo }
    }

    pub async fn get(&self, merchant_id: i64) -> Result<Merchant> {
        self.merchant_repo
            .get(merchant_id)
            .await?
            .ok_or(PointsError::MerchantNotFound(merchant_id))
    }

    #[instrument(skip(self, merchant), fields(merchant_no = %merchant.merchant_no))]
    pub async fn create(&self, mut merchant: NewMerchant) -> Result<Merchant> {
        merchant.name = merchant.name.trim().to_string();
        merchant.merchant_no = merchant.merchant_no.trim().to_string();
        validate_name(&merchant.name)?;
        validate_merchant_no(&merchant.merchant_no)?;

        let created = self.merchant_repo.create(&merchant).await?;
        info!(merchant_id = created.id, "商户已创建");
        Ok(created)
    }

    #[instrument(skip(self, update))]
    pub async fn update(&self, merchant_id: i64, mut update: MerchantUpdate) -> Result<Merchant> {
        if let Some(name) = update.name.take() {
            let name = name.trim().to_string();
            validate_name(&name)?;
            update.name = Some(name);
        }

        let merchant = self
            .merchant_repo
            .update(merchant_id, &update)
            .await?
            .ok_or(PointsError::MerchantNotFound(merchant_id))?;

        info!(merchant_id, "商户信息已更新");
        Ok(merchant)
    }

    pub async fn list(
        &self,
        filter: &MerchantFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Page<Merchant>> {
        let (items, total) = self.merchant_repo.list(filter, limit, offset).await?;
        Ok(Page::new(items, total))
    }

    pub async fn statistics(&self) -> Result<MerchantStatistics> {
        self.merchant_repo.statistics().await
    }

    /// 单个商户的订单汇总和最近 7 天趋势
    pub async fn merchant_statistics(
        &self,
        merchant_id: i64,
        now: DateTime<Utc>,
    ) -> Result<MerchantDetailStatistics> {
        self.get(merchant_id).await?;

        let since = start_of_day(now) - Duration::days(MERCHANT_TREND_DAYS - 1);
        let overview = self.merchant_repo.order_overview(merchant_id).await?;
        let trends = self.merchant_repo.daily_trend(merchant_id, since).await?;

        Ok(MerchantDetailStatistics {
            merchant_id,
            overview,
            trends,
        })
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(PointsError::Validation("商户名称不能为空".to_string()));
    }
    if name.chars().count() > MAX_MERCHANT_NAME_CHARS {
        return Err(PointsError::Validation(format!(
            "商户名称不能超过 {MAX_MERCHANT_NAME_CHARS} 个字符"
        )));
    }
    Ok(())
}

fn validate_merchant_no(merchant_no: &str) -> Result<()> {
    if merchant_no.is_empty() || merchant_no.len() > MAX_MERCHANT_NO_CHARS {
        return Err(PointsError::Validation(format!(
            "商户编号长度必须在 1 ~ {MAX_MERCHANT_NO_CHARS} 之间"
        )));
    }
    if !merchant_no.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(PointsError::Validation(
            "商户编号只能包含字母、数字、下划线和连字符".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MerchantStatus;
    use crate::repository::MockMerchantRepositoryTrait;
    use crate::service::dto::{MerchantDailyTrend, MerchantOrderOverview};
    use chrono::Utc;
    use fake::Fake;
    use fake::faker::company::en::CompanyName;

    fn new_merchant(merchant_no: &str, name: &str) -> NewMerchant {
        NewMerchant {
            merchant_no: merchant_no.to_string(),
            name: name.to_string(),
            contact_person: None,
            contact_phone: None,
            business_license: None,
            status: MerchantStatus::Active,
        }
    }

    fn merchant_from(new: &NewMerchant, id: i64) -> Merchant {
        let now = Utc::now();
        Merchant {
            id,
            merchant_no: new.merchant_no.clone(),
            name: new.name.clone(),
            contact_person: new.contact_person.clone(),
            contact_phone: new.contact_phone.clone(),
            business_license: new.business_license.clone(),
            status: new.status,
            total_amount: 0,
            total_orders: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_trims_and_persists() {
        let mut repo = MockMerchantRepositoryTrait::new();
        repo.expect_create()
            .withf(|m| m.merchant_no == "M0001" && !m.name.starts_with(' '))
            .times(1)
            .returning(|m| Ok(merchant_from(m, 1)));

        let name: String = CompanyName().fake();
        let service = MerchantService::new(Arc::new(repo));
        let merchant = service
            .create(new_merchant(" M0001 ", &format!("  {name}")))
            .await
            .unwrap();
        assert_eq!(merchant.name, name);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_input() {
        let mut repo = MockMerchantRepositoryTrait::new();
        repo.expect_create().never();
        let service = MerchantService::new(Arc::new(repo));

        let long_name = "长".repeat(101);
        for (no, name) in [("M1", ""), ("", "商户"), ("M 1", "商户"), ("M1", long_name.as_str())] {
            let result = service.create(new_merchant(no, name)).await;
            assert!(matches!(result, Err(PointsError::Validation(_))), "no={no}");
        }
    }

    #[tokio::test]
    async fn test_create_duplicate_merchant_no() {
        let mut repo = MockMerchantRepositoryTrait::new();
        repo.expect_create()
            .returning(|m| Err(PointsError::DuplicateMerchantNo(m.merchant_no.clone())));

        let service = MerchantService::new(Arc::new(repo));
        assert!(matches!(
            service.create(new_merchant("M0001", "商户")).await,
            Err(PointsError::DuplicateMerchantNo(_))
        ));
    }

    #[tokio::test]
    async fn test_merchant_statistics_unknown_merchant() {
        let mut repo = MockMerchantRepositoryTrait::new();
        repo.expect_get().returning(|_| Ok(None));
        repo.expect_order_overview().never();
        repo.expect_daily_trend().never();

        let service = MerchantService::new(Arc::new(repo));
        assert!(matches!(
            service.merchant_statistics(9, Utc::now()).await,
            Err(PointsError::MerchantNotFound(9))
        ));
    }

    #[tokio::test]
    async fn test_merchant_statistics_covers_last_seven_days() {
        let now = Utc::now();
        let expected_since = start_of_day(now) - Duration::days(6);

        let mut repo = MockMerchantRepositoryTrait::new();
        repo.expect_get().returning(|id| {
            Ok(Some(merchant_from(&new_merchant("M0001", "咖啡店"), id)))
        });
        repo.expect_order_overview().times(1).returning(|_| {
            Ok(MerchantOrderOverview {
                total_users: 2,
                total_orders: 3,
                paid_orders: 2,
                paid_amount: 5000,
                points_awarded: 50,
            })
        });
        repo.expect_daily_trend()
            .withf(move |id, since| *id == 4 && *since == expected_since)
            .times(1)
            .returning(|_, since| {
                Ok(vec![MerchantDailyTrend {
                    day: since.date_naive(),
                    orders: 3,
                    paid_amount: 5000,
                }])
            });

        let service = MerchantService::new(Arc::new(repo));
        let stats = service.merchant_statistics(4, now).await.unwrap();
        assert_eq!(stats.merchant_id, 4);
        assert_eq!(stats.overview.paid_amount, 5000);
        assert_eq!(stats.trends.len(), 1);
    }

    #[tokio::test]
    async fn test_update_unknown_merchant() {
        let mut repo = MockMerchantRepositoryTrait::new();
        repo.expect_update().returning(|_, _| Ok(None));

        let service = MerchantService::new(Arc::new(repo));
        let update = MerchantUpdate {
            status: Some(MerchantStatus::Inactive),
            ..Default::default()
        };
        assert!(matches!(
            service.update(8, update).await,
            Err(PointsError::MerchantNotFound(8))
        ));
    }
}
