//! 微信小程序登录凭证校验
//!
//! 通过 `jscode2session` 将 wx.login 返回的 code 换成 openid

use std::time::Duration;

use async_trait::async_trait;
use points_shared::config::WechatConfig;
use serde::Deserialize;
use tracing::{instrument, warn};

use crate::error::ApiError;

const JSCODE2SESSION_URL: &str = "https://api.weixin.qq.com/sns/jscode2session";

/// code 换取的会话信息
#[derive(Debug, Clone, PartialEq)]
pub struct WechatSession {
    pub openid: String,
    pub unionid: Option<String>,
}

/// 微信登录客户端
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WechatClient: Send + Sync {
    async fn code_to_session(&self, code: &str) -> Result<WechatSession, ApiError>;
}

/// jscode2session 响应体，失败时只有 errcode/errmsg
#[derive(Debug, Deserialize)]
struct SessionResponse {
    openid: Option<String>,
    unionid: Option<String>,
    #[serde(default)]
    errcode: i64,
    errmsg: Option<String>,
}

impl SessionResponse {
    fn into_session(self) -> Result<WechatSession, ApiError> {
        if self.errcode != 0 {
            return Err(ApiError::Wechat(format!(
                "errcode={}, errmsg={}",
                self.errcode,
                self.errmsg.unwrap_or_default()
            )));
        }
        match self.openid.filter(|o| !o.is_empty()) {
            Some(openid) => Ok(WechatSession {
                openid,
                unionid: self.unionid,
            }),
            None => Err(ApiError::Wechat("响应缺少 openid".to_string())),
        }
    }
}

/// 调用微信服务器的客户端
pub struct HttpWechatClient {
    client: reqwest::Client,
    app_id: String,
    app_secret: String,
}

impl HttpWechatClient {
    pub fn new(config: &WechatConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| ApiError::Internal(format!("创建 HTTP 客户端失败: {}", e)))?;

        Ok(Self {
            client,
            app_id: config.app_id.clone(),
            app_secret: config.app_secret.clone(),
        })
    }
}

#[async_trait]
impl WechatClient for HttpWechatClient {
    #[instrument(skip_all)]
    async fn code_to_session(&self, code: &str) -> Result<WechatSession, ApiError> {
        let response = self
            .client
            .get(JSCODE2SESSION_URL)
            .query(&[
                ("appid", self.app_id.as_str()),
                ("secret", self.app_secret.as_str()),
                ("js_code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "调用 jscode2session 失败");
                ApiError::Wechat(e.to_string())
            })?;

        // 微信接口出错时也返回 200，错误码在响应体中
        let body: SessionResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Wechat(format!("解析响应失败: {}", e)))?;

        body.into_session()
    }
}

/// 开发环境客户端
///
/// 未配置 AppID 时使用，以 code 派生稳定的 openid，便于本地联调
pub struct DevWechatClient;

#[async_trait]
impl WechatClient for DevWechatClient {
    async fn code_to_session(&self, code: &str) -> Result<WechatSession, ApiError> {
        Ok(WechatSession {
            openid: format!("dev_{}", code),
            unionid: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_response_success() {
        let body: SessionResponse = serde_json::from_str(
            r#"{"openid":"oABC123","session_key":"key","unionid":"uXYZ"}"#,
        )
        .unwrap();
        let session = body.into_session().unwrap();
        assert_eq!(session.openid, "oABC123");
        assert_eq!(session.unionid.as_deref(), Some("uXYZ"));
    }

    #[test]
    fn test_session_response_error_code() {
        let body: SessionResponse =
            serde_json::from_str(r#"{"errcode":40029,"errmsg":"invalid code"}"#).unwrap();
        let err = body.into_session().unwrap_err();
        assert!(matches!(err, ApiError::Wechat(ref msg) if msg.contains("40029")));
    }

    #[test]
    fn test_session_response_missing_openid() {
        let body: SessionResponse = serde_json::from_str(r#"{"errcode":0}"#).unwrap();
        assert!(body.into_session().is_err());
    }

    #[tokio::test]
    async fn test_dev_client_is_stable() {
        let client = DevWechatClient;
        let first = client.code_to_session("abc").await.unwrap();
        let second = client.code_to_session("abc").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.openid, "dev_abc");
    }
}
