//! 分级限流中间件
//!
//! 进程内固定窗口计数器，按接口类型分级：
//! - 下单（POST /api/payments）: 最严格
//! - 写操作（POST/PUT/DELETE）: 中等
//! - 读操作（GET）: 最宽松
//!
//! 已认证请求按用户 ID 计数，匿名请求按客户端地址计数。
//! 只有配置了 `trust_forwarded_for` 时才采信 X-Forwarded-For，否则使用连接的对端地址。
//! 多实例部署时每个实例独立计数。

use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderValue, Method, Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use points_shared::config::RateLimitConfig;
use points_shared::observability::metrics;
use tracing::warn;

use crate::auth::Claims;
use crate::error::ApiError;
use crate::state::AppState;

/// 超过该数量时清理过期窗口的计数器
const MAX_TRACKED_KEYS: usize = 100_000;

/// 限流层级
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateTier {
    Payment,
    Write,
    Read,
}

impl RateTier {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Payment => "payment",
            Self::Write => "write",
            Self::Read => "read",
        }
    }

    fn max_requests(&self, config: &RateLimitConfig) -> u64 {
        match self {
            Self::Payment => config.payment_max_requests,
            Self::Write => config.write_max_requests,
            Self::Read => config.read_max_requests,
        }
    }
}

/// 根据路径和方法确定限流层级
pub fn classify(path: &str, method: &Method) -> RateTier {
    if *method == Method::POST && path.trim_end_matches('/') == "/api/payments" {
        return RateTier::Payment;
    }
    match *method {
        Method::GET | Method::HEAD | Method::OPTIONS => RateTier::Read,
        _ => RateTier::Write,
    }
}

/// 免限流路径
///
/// 支付通知来自微信服务器，被限流会导致重复投递
fn is_exempt_path(path: &str) -> bool {
    matches!(path, "/health" | "/ready" | "/metrics" | "/api/payments/notify")
}

#[derive(Debug, Clone, Copy)]
struct WindowCounter {
    window: u64,
    count: u64,
}

/// 限流判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u64 },
    Limited { retry_after_secs: u64 },
}

/// 固定窗口限流器
pub struct RateLimiter {
    config: RateLimitConfig,
    counters: DashMap<String, WindowCounter>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            counters: DashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn trusts_forwarded_for(&self) -> bool {
        self.config.trust_forwarded_for
    }

    /// 计数并判定，`now_secs` 为 Unix 时间戳
    pub fn check(&self, subject: &str, tier: RateTier, now_secs: u64) -> RateDecision {
        let window_secs = self.config.window_secs.max(1);
        let window = now_secs / window_secs;
        let max_requests = tier.max_requests(&self.config);

        if self.counters.len() > MAX_TRACKED_KEYS {
            self.counters.retain(|_, c| c.window == window);
        }

        let key = format!("{}:{}", tier.name(), subject);
        let count = {
            let mut entry = self
                .counters
                .entry(key)
                .or_insert(WindowCounter { window, count: 0 });
            if entry.window != window {
                *entry = WindowCounter { window, count: 0 };
            }
            entry.count += 1;
            entry.count
        };

        if count > max_requests {
            RateDecision::Limited {
                retry_after_secs: (window + 1) * window_secs - now_secs,
            }
        } else {
            RateDecision::Allowed {
                remaining: max_requests - count,
            }
        }
    }
}

/// 限流中间件
///
/// 放置在 auth 中间件之后，以便从 Claims 中取用户 ID
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if !state.rate_limiter.is_enabled() || is_exempt_path(path) {
        return next.run(request).await;
    }

    let tier = classify(path, request.method());
    let subject = rate_subject(&request, state.rate_limiter.trusts_forwarded_for());

    match state.rate_limiter.check(&subject, tier, unix_now()) {
        RateDecision::Allowed { .. } => next.run(request).await,
        RateDecision::Limited { retry_after_secs } => {
            warn!(subject = %subject, path = %path, tier = tier.name(), "限流触发");
            metrics::record_rate_limited(tier.name());
            too_many_requests_response(retry_after_secs)
        }
    }
}

/// 限流主体：已认证用户按角色和 ID，匿名请求按客户端地址
fn rate_subject(request: &Request<Body>, trust_forwarded_for: bool) -> String {
    if let Some(claims) = request.extensions().get::<Claims>() {
        return format!("{}:{}", claims.role, claims.sub);
    }

    if trust_forwarded_for {
        let forwarded = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());
        if let Some(ip) = forwarded {
            return format!("ip:{ip}");
        }
    }

    match request.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => format!("ip:{}", addr.ip()),
        None => "ip:unknown".to_string(),
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// 生成 429 响应，Retry-After 为当前窗口剩余秒数
fn too_many_requests_response(retry_after_secs: u64) -> Response {
    let mut response = ApiError::RateLimited.into_response();
    if let Ok(val) = HeaderValue::from_str(&retry_after_secs.to_string()) {
        response.headers_mut().insert(header::RETRY_AFTER, val);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            enabled: true,
            window_secs: 60,
            read_max_requests: max,
            write_max_requests: max,
            payment_max_requests: 1,
            trust_forwarded_for: false,
        })
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("/api/payments", &Method::POST), RateTier::Payment);
        assert_eq!(classify("/api/payments/history", &Method::GET), RateTier::Read);
        assert_eq!(classify("/api/points/consume", &Method::POST), RateTier::Write);
        assert_eq!(classify("/api/admin/merchants/1", &Method::PUT), RateTier::Write);
        assert_eq!(classify("/api/admin/orders", &Method::GET), RateTier::Read);
    }

    #[test]
    fn test_exempt_paths() {
        assert!(is_exempt_path("/health"));
        assert!(is_exempt_path("/api/payments/notify"));
        assert!(!is_exempt_path("/api/payments"));
    }

    #[test]
    fn test_limit_within_window() {
        let limiter = limiter(3);
        let now = 120;

        assert_eq!(
            limiter.check("user:1", RateTier::Read, now),
            RateDecision::Allowed { remaining: 2 }
        );
        limiter.check("user:1", RateTier::Read, now);
        limiter.check("user:1", RateTier::Read, now + 1);
        assert_eq!(
            limiter.check("user:1", RateTier::Read, now + 10),
            RateDecision::Limited {
                retry_after_secs: 50
            }
        );

        // 其他用户与其他层级独立计数
        assert!(matches!(
            limiter.check("user:2", RateTier::Read, now),
            RateDecision::Allowed { .. }
        ));
        assert!(matches!(
            limiter.check("user:1", RateTier::Write, now),
            RateDecision::Allowed { .. }
        ));
    }

    #[test]
    fn test_window_rollover_resets_count() {
        let limiter = limiter(1);

        limiter.check("ip:1.2.3.4", RateTier::Payment, 0);
        assert!(matches!(
            limiter.check("ip:1.2.3.4", RateTier::Payment, 59),
            RateDecision::Limited { .. }
        ));
        assert!(matches!(
            limiter.check("ip:1.2.3.4", RateTier::Payment, 60),
            RateDecision::Allowed { remaining: 0 }
        ));
    }

    #[test]
    fn test_rate_subject_ignores_forwarded_for_by_default() {
        let mut request = Request::builder()
            .uri("/api/auth/wechat-login")
            .header("x-forwarded-for", "10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(rate_subject(&request, false), "ip:unknown");

        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 9], 40000))));
        assert_eq!(rate_subject(&request, false), "ip:192.168.1.9");
        assert_eq!(rate_subject(&request, true), "ip:10.0.0.1");
    }

    #[test]
    fn test_rate_subject_prefers_claims() {
        let mut request = Request::builder()
            .uri("/api/points/balance")
            .header("x-forwarded-for", "10.0.0.1, 10.0.0.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(rate_subject(&request, true), "ip:10.0.0.1");

        request.extensions_mut().insert(Claims {
            sub: "7".to_string(),
            name: None,
            role: "user".to_string(),
            iat: 0,
            exp: 0,
            iss: String::new(),
        });
        assert_eq!(rate_subject(&request, true), "user:7");
    }
}
