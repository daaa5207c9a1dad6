//! 商户实体定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::MerchantStatus;

/// 商户
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Merchant {
    pub id: i64,
    pub merchant_no: String,
    pub name: String,
    #[sqlx(default)]
    pub contact_person: Option<String>,
    #[sqlx(default)]
    pub contact_phone: Option<String>,
    #[sqlx(default)]
    pub business_license: Option<String>,
    pub status: MerchantStatus,
    /// 累计收款（分）
    pub total_amount: i64,
    pub total_orders: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Merchant {
    pub fn is_accepting_payments(&self) -> bool {
        self.status == MerchantStatus::Active
    }
}

/// 新建商户参数
#[derive(Debug, Clone)]
pub struct NewMerchant {
    pub merchant_no: String,
    pub name: String,
    pub contact_person: Option<String>,
    pub contact_phone: Option<String>,
    pub business_license: Option<String>,
    pub status: MerchantStatus,
}

/// 商户更新参数，None 表示不修改
#[derive(Debug, Clone, Default)]
pub struct MerchantUpdate {
    pub name: Option<String>,
    pub contact_person: Option<String>,
    pub contact_phone: Option<String>,
    pub business_license: Option<String>,
    pub status: Option<MerchantStatus>,
}
