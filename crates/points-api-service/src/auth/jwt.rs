//! JWT Token 处理
//!
//! 小程序用户和后台管理员共用一套签名密钥，通过 `role` 区分身份

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use points_shared::config::AuthConfig;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// 小程序用户
pub const ROLE_USER: &str = "user";
/// 管理员，拥有全部后台权限
pub const ROLE_ADMIN: &str = "admin";
/// 运营人员，只读后台
pub const ROLE_OPERATOR: &str = "operator";

/// JWT 配置
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// 签名密钥
    pub secret: String,
    /// Token 过期时间（秒）
    pub expires_in_secs: i64,
    /// Token 签发者
    pub issuer: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self::from(&AuthConfig::default())
    }
}

impl From<&AuthConfig> for JwtConfig {
    fn from(config: &AuthConfig) -> Self {
        Self {
            secret: config.jwt_secret.clone(),
            expires_in_secs: config.jwt_expires_secs,
            issuer: config.jwt_issuer.clone(),
        }
    }
}

/// JWT Claims（Token 载荷）
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// 用户 ID 或管理员 ID
    pub sub: String,
    /// 昵称或管理员用户名
    pub name: Option<String>,
    /// user / admin / operator
    pub role: String,
    /// 签发时间
    pub iat: i64,
    /// 过期时间
    pub exp: i64,
    /// 签发者
    pub iss: String,
}

impl Claims {
    /// 解析 sub 中的数字 ID
    pub fn subject_id(&self) -> Result<i64, ApiError> {
        self.sub
            .parse()
            .map_err(|_| ApiError::Unauthorized("无效的用户标识".to_string()))
    }

    pub fn is_user(&self) -> bool {
        self.role == ROLE_USER
    }

    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }

    /// 管理员或运营人员
    pub fn is_staff(&self) -> bool {
        self.role == ROLE_ADMIN || self.role == ROLE_OPERATOR
    }
}

/// JWT 管理器
#[derive(Clone)]
pub struct JwtManager {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtManager {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// 生成 JWT Token，返回 (token, 过期时间戳)
    pub fn generate_token(
        &self,
        subject_id: i64,
        name: Option<&str>,
        role: &str,
    ) -> Result<(String, i64), ApiError> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.config.expires_in_secs);

        let claims = Claims {
            sub: subject_id.to_string(),
            name: name.map(|s| s.to_string()),
            role: role.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.config.issuer.clone(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ApiError::Internal(format!("JWT 生成失败: {}", e)))?;

        Ok((token, exp.timestamp()))
    }

    /// 验证并解析 JWT Token
    pub fn verify_token(&self, token: &str) -> Result<Claims, ApiError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.config.issuer]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(
            |e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    ApiError::Unauthorized("Token 已过期".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidToken => {
                    ApiError::Unauthorized("无效的 Token".to_string())
                }
                _ => ApiError::Unauthorized(format!("Token 验证失败: {}", e)),
            },
        )?;

        Ok(token_data.claims)
    }

    pub fn expires_in_secs(&self) -> i64 {
        self.config.expires_in_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_generate_and_verify_token() {
        let manager = JwtManager::new(JwtConfig::default());

        let (token, exp) = assert_ok!(manager.generate_token(42, Some("微信用户"), ROLE_USER));

        let claims = assert_ok!(manager.verify_token(&token));
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.subject_id().unwrap(), 42);
        assert_eq!(claims.exp, exp);
        assert!(claims.is_user());
        assert!(!claims.is_staff());
    }

    #[test]
    fn test_staff_roles() {
        let manager = JwtManager::new(JwtConfig::default());

        let (token, _) = manager.generate_token(1, Some("ops"), ROLE_OPERATOR).unwrap();
        let claims = manager.verify_token(&token).unwrap();
        assert!(claims.is_staff());
        assert!(!claims.is_admin());
    }

    #[test]
    fn test_invalid_token() {
        let manager = JwtManager::new(JwtConfig::default());
        assert!(matches!(
            manager.verify_token("invalid.token.here"),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_token_from_other_secret_rejected() {
        let issuer = JwtManager::new(JwtConfig {
            secret: "another-secret".to_string(),
            ..JwtConfig::default()
        });
        let (token, _) = assert_ok!(issuer.generate_token(1, None, ROLE_ADMIN));

        let manager = JwtManager::new(JwtConfig::default());
        assert_err!(manager.verify_token(&token));
    }

    #[test]
    fn test_expired_token_rejected() {
        // 超出默认 60 秒的时钟容差
        let manager = JwtManager::new(JwtConfig {
            expires_in_secs: -120,
            ..JwtConfig::default()
        });
        let (token, _) = manager.generate_token(1, None, ROLE_USER).unwrap();

        let err = manager.verify_token(&token).unwrap_err();
        assert!(err.to_string().contains("过期"));
    }
}
