//! 微信支付 APIv3 支付通知解析
//!
//! 通知体为 JSON 信封，交易详情在 `resource` 中以 AEAD_AES_256_GCM 加密。
//! 能用商户 APIv3 密钥解密即视为通知来源可信。

use chrono::Utc;
use points_shared::crypto::{CryptoError, ResourceCipher, random_nonce_str};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// 加密算法标识
pub const ALGORITHM_AES_256_GCM: &str = "AEAD_AES_256_GCM";
/// 支付成功通知的事件类型
pub const EVENT_TRANSACTION_SUCCESS: &str = "TRANSACTION.SUCCESS";

const RESOURCE_ASSOCIATED_DATA: &str = "transaction";
const NONCE_LEN: usize = 12;

/// 通知解析错误
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("通知格式错误: {0}")]
    Malformed(String),

    #[error("不支持的加密算法: {0}")]
    UnsupportedAlgorithm(String),

    #[error("通知解密失败: {0}")]
    Decrypt(#[from] CryptoError),
}

/// 通知信封
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyEnvelope {
    pub id: String,
    #[serde(default)]
    pub create_time: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub resource_type: Option<String>,
    pub resource: NotifyResource,
    #[serde(default)]
    pub summary: Option<String>,
}

/// 加密的通知资源
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyResource {
    pub algorithm: String,
    pub ciphertext: String,
    #[serde(default)]
    pub associated_data: Option<String>,
    pub nonce: String,
    #[serde(default)]
    pub original_type: Option<String>,
}

/// 解密后的交易详情
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub out_trade_no: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
    pub trade_state: String,
    #[serde(default)]
    pub trade_state_desc: Option<String>,
    #[serde(default)]
    pub success_time: Option<String>,
    pub amount: TransactionAmount,
}

/// 交易金额（分）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionAmount {
    pub total: i64,
    #[serde(default)]
    pub payer_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// 按交易状态决定的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeAction {
    /// 确认支付并发放积分
    Confirm,
    /// 标记支付失败
    Fail,
    /// 仅应答，不改变订单
    Acknowledge,
}

impl Transaction {
    pub fn action(&self) -> TradeAction {
        match self.trade_state.as_str() {
            "SUCCESS" => TradeAction::Confirm,
            "PAYERROR" | "CLOSED" | "REVOKED" => TradeAction::Fail,
            _ => TradeAction::Acknowledge,
        }
    }
}

/// 支付通知解码器
#[derive(Clone)]
pub struct NotifyDecoder {
    cipher: ResourceCipher,
}

impl NotifyDecoder {
    pub fn new(cipher: ResourceCipher) -> Self {
        Self { cipher }
    }

    /// 根据 APIv3 密钥创建，未配置时为 passthrough 模式
    pub fn from_api_v3_key(key: Option<&str>) -> Result<Self, NotifyError> {
        Ok(Self::new(ResourceCipher::from_api_v3_key(key)?))
    }

    /// 是否启用了解密（非 passthrough）
    pub fn is_verifying(&self) -> bool {
        self.cipher.is_enabled()
    }

    /// 解析通知体并解密出交易详情
    pub fn decode(&self, body: &[u8]) -> Result<(NotifyEnvelope, Transaction), NotifyError> {
        let envelope: NotifyEnvelope = serde_json::from_slice(body)
            .map_err(|e| NotifyError::Malformed(format!("信封解析失败: {e}")))?;

        let resource = &envelope.resource;
        if self.cipher.is_enabled() && resource.algorithm != ALGORITHM_AES_256_GCM {
            return Err(NotifyError::UnsupportedAlgorithm(resource.algorithm.clone()));
        }

        let plaintext = self.cipher.decrypt(
            &resource.nonce,
            resource.associated_data.as_deref().unwrap_or_default(),
            &resource.ciphertext,
        )?;

        let transaction: Transaction = serde_json::from_str(&plaintext)
            .map_err(|e| NotifyError::Malformed(format!("交易详情解析失败: {e}")))?;

        if transaction.out_trade_no.trim().is_empty() {
            return Err(NotifyError::Malformed("缺少 out_trade_no".to_string()));
        }

        Ok((envelope, transaction))
    }

    /// 按通知格式封装交易详情
    ///
    /// 供模拟支付接口复用通知处理流程
    pub fn seal(&self, transaction: &Transaction) -> Result<Vec<u8>, NotifyError> {
        let plaintext = serde_json::to_string(transaction)
            .map_err(|e| NotifyError::Malformed(e.to_string()))?;
        let nonce = random_nonce_str(NONCE_LEN);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, RESOURCE_ASSOCIATED_DATA, &plaintext)?;

        let envelope = json!({
            "id": uuid::Uuid::new_v4().to_string(),
            "create_time": Utc::now().to_rfc3339(),
            "event_type": EVENT_TRANSACTION_SUCCESS,
            "resource_type": "encrypt-resource",
            "resource": {
                "algorithm": ALGORITHM_AES_256_GCM,
                "ciphertext": ciphertext,
                "associated_data": RESOURCE_ASSOCIATED_DATA,
                "nonce": nonce,
                "original_type": "transaction"
            },
            "summary": "支付成功"
        });

        serde_json::to_vec(&envelope).map_err(|e| NotifyError::Malformed(e.to_string()))
    }
}
