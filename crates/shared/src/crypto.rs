//! 支付通知加解密与脱敏模块
//!
//! 微信支付 APIv3 的回调通知使用 AEAD_AES_256_GCM 加密 `resource` 字段：
//! 密钥为商户 APIv3 密钥（32 字节），nonce 为 12 字节字符串，
//! `associated_data` 作为附加认证数据，密文为 `base64(ciphertext || tag)`。
//!
//! ## 设计决策
//!
//! - **AEAD 解密即验签**：只有持有 APIv3 密钥的一方才能构造出可解密的密文，
//!   认证标签校验失败即视为伪造通知
//! - **Passthrough 模式**：未配置密钥时 `ciphertext` 按 base64 明文处理，
//!   方便开发环境联调；生产环境启动时拒绝该模式

use aes_gcm::{
    Aes256Gcm, KeyInit, Nonce,
    aead::{Aead, Payload},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use rand::Rng;
use thiserror::Error;

/// 加解密错误类型
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("加密失败: {0}")]
    EncryptionFailed(String),

    #[error("解密失败: {0}")]
    DecryptionFailed(String),

    #[error("无效的密钥长度: 预期 32 字节, 实际 {0} 字节")]
    InvalidKeyLength(usize),

    #[error("无效的 nonce 长度: 预期 12 字节, 实际 {0} 字节")]
    InvalidNonceLength(usize),

    #[error("无效的密文格式: {0}")]
    InvalidCiphertext(String),
}

/// AES-256-GCM Nonce 长度
const NONCE_SIZE: usize = 12;

/// 支付通知资源解密器
#[derive(Clone)]
pub struct ResourceCipher {
    /// None 表示 passthrough 模式
    cipher: Option<Aes256Gcm>,
}

// 编译期验证 Send + Sync，可注入到 Axum 的共享状态中
const _: () = {
    fn _assert_send_sync<T: Send + Sync>() {}
    fn _check() {
        _assert_send_sync::<ResourceCipher>();
    }
};

impl ResourceCipher {
    /// 从 32 字节密钥创建解密器
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        if key.len() != 32 {
            return Err(CryptoError::InvalidKeyLength(key.len()));
        }
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
        Ok(Self {
            cipher: Some(cipher),
        })
    }

    /// 创建 passthrough 模式的解密器
    pub fn passthrough() -> Self {
        Self { cipher: None }
    }

    /// 根据可选的 APIv3 密钥创建解密器，未配置时降级为 passthrough
    pub fn from_api_v3_key(key: Option<&str>) -> Result<Self, CryptoError> {
        match key.map(str::trim).filter(|k| !k.is_empty()) {
            Some(key) => Self::new(key.as_bytes()),
            None => Ok(Self::passthrough()),
        }
    }

    /// 是否处于解密模式（非 passthrough）
    pub fn is_enabled(&self) -> bool {
        self.cipher.is_some()
    }

    /// 解密通知资源，返回 UTF-8 明文
    pub fn decrypt(
        &self,
        nonce: &str,
        associated_data: &str,
        ciphertext: &str,
    ) -> Result<String, CryptoError> {
        let combined = BASE64
            .decode(ciphertext)
            .map_err(|e| CryptoError::InvalidCiphertext(format!("base64 解码失败: {e}")))?;

        let plaintext = match self.cipher {
            None => combined,
            Some(ref cipher) => {
                let nonce_bytes = nonce.as_bytes();
                if nonce_bytes.len() != NONCE_SIZE {
                    return Err(CryptoError::InvalidNonceLength(nonce_bytes.len()));
                }
                cipher
                    .decrypt(
                        Nonce::from_slice(nonce_bytes),
                        Payload {
                            msg: &combined,
                            aad: associated_data.as_bytes(),
                        },
                    )
                    .map_err(|_| CryptoError::DecryptionFailed("密文损坏或密钥不匹配".to_string()))?
            }
        };

        String::from_utf8(plaintext)
            .map_err(|e| CryptoError::DecryptionFailed(format!("解密结果非 UTF-8: {e}")))
    }

    /// 按通知格式加密明文
    ///
    /// 服务端只解密；该方法供模拟支付和测试构造通知使用。
    pub fn encrypt(
        &self,
        nonce: &str,
        associated_data: &str,
        plaintext: &str,
    ) -> Result<String, CryptoError> {
        let Some(ref cipher) = self.cipher else {
            return Ok(BASE64.encode(plaintext.as_bytes()));
        };

        let nonce_bytes = nonce.as_bytes();
        if nonce_bytes.len() != NONCE_SIZE {
            return Err(CryptoError::InvalidNonceLength(nonce_bytes.len()));
        }
        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(nonce_bytes),
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: associated_data.as_bytes(),
                },
            )
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        Ok(BASE64.encode(ciphertext))
    }
}

/// 生成指定长度的随机字母数字串（用作通知 nonce 等）
pub fn random_nonce_str(len: usize) -> String {
    rand::rng()
        .sample_iter(rand::distr::Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

// ============================================================
// 脱敏辅助函数
// ============================================================

/// openid 脱敏：保留前 4 位和后 4 位
///
/// 示例: `oUpF8uMuAJO_M2pxb1Q9zNjWeS6o` -> `oUpF****eS6o`
pub fn mask_openid(openid: &str) -> String {
    let chars: Vec<char> = openid.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let prefix: String = chars[..4].iter().collect();
    let suffix: String = chars[chars.len() - 4..].iter().collect();
    format!("{prefix}****{suffix}")
}

/// 手机号脱敏：保留前 3 位和后 4 位
///
/// 示例: `13812345678` -> `138****5678`
pub fn mask_phone(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 7 {
        return "****".to_string();
    }
    let prefix: String = digits[..3].iter().collect();
    let suffix: String = digits[digits.len() - 4..].iter().collect();
    format!("{prefix}****{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    const API_V3_KEY: &str = "0123456789abcdefghijklmnopqrstuv";
    const NONCE: &str = "fdasflkja484";
    const AAD: &str = "transaction";

    #[test]
    fn decrypts_resource_encrypted_with_same_key() {
        let cipher = ResourceCipher::from_api_v3_key(Some(API_V3_KEY)).unwrap();
        assert!(cipher.is_enabled());

        let plaintext = r#"{"out_trade_no":"NO1700000000000123","trade_state":"SUCCESS"}"#;
        let ciphertext = assert_ok!(cipher.encrypt(NONCE, AAD, plaintext));

        assert_eq!(assert_ok!(cipher.decrypt(NONCE, AAD, &ciphertext)), plaintext);
    }

    #[test]
    fn tampered_associated_data_is_rejected() {
        let cipher = ResourceCipher::new(API_V3_KEY.as_bytes()).unwrap();
        let ciphertext = cipher.encrypt(NONCE, AAD, "payload").unwrap();

        let result = cipher.decrypt(NONCE, "refund", &ciphertext);
        assert!(matches!(result, Err(CryptoError::DecryptionFailed(_))));
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let sender = ResourceCipher::new(API_V3_KEY.as_bytes()).unwrap();
        let receiver = ResourceCipher::new(b"vutsrqponmlkjihgfedcba9876543210").unwrap();

        let ciphertext = assert_ok!(sender.encrypt(NONCE, AAD, "secret"));
        assert_err!(receiver.decrypt(NONCE, AAD, &ciphertext));
    }

    #[test]
    fn invalid_lengths_rejected() {
        assert!(matches!(
            ResourceCipher::new(&[0u8; 16]),
            Err(CryptoError::InvalidKeyLength(16))
        ));

        let cipher = ResourceCipher::new(API_V3_KEY.as_bytes()).unwrap();
        assert!(matches!(
            cipher.decrypt("short", AAD, "AAAA"),
            Err(CryptoError::InvalidNonceLength(5))
        ));
        assert!(matches!(
            cipher.decrypt(NONCE, AAD, "not base64!!"),
            Err(CryptoError::InvalidCiphertext(_))
        ));
    }

    #[test]
    fn passthrough_mode_decodes_base64_plaintext() {
        let cipher = ResourceCipher::from_api_v3_key(None).unwrap();
        assert!(!cipher.is_enabled());

        let encoded = BASE64.encode(r#"{"trade_state":"SUCCESS"}"#);
        assert_eq!(
            cipher.decrypt("", "", &encoded).unwrap(),
            r#"{"trade_state":"SUCCESS"}"#
        );

        // 空白密钥同样视为未配置
        assert!(!ResourceCipher::from_api_v3_key(Some("  ")).unwrap().is_enabled());
    }

    #[test]
    fn random_nonce_has_requested_length() {
        let nonce = random_nonce_str(NONCE_SIZE);
        assert_eq!(nonce.len(), NONCE_SIZE);
        assert!(nonce.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_mask_openid() {
        assert_eq!(mask_openid("oUpF8uMuAJO_M2pxb1Q9zNjWeS6o"), "oUpF****eS6o");
        assert_eq!(mask_openid("short"), "****");
    }

    #[test]
    fn test_mask_phone() {
        assert_eq!(mask_phone("13812345678"), "138****5678");
        assert_eq!(mask_phone("12345"), "****");
    }
}
