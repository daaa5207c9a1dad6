//! 应用状态定义
//!
//! 包含 Axum 路由共享的服务实例，通过 Arc 在 handler 间共享

use std::sync::Arc;

use points_ledger::repository::{
    MerchantRepository, OrderRepository, PointsLedgerRepository, UserRepository,
};
use points_ledger::service::{
    MerchantService, OrderLedgerService, PointsAwardEngine, PointsQueryService, UserService,
};
use points_shared::config::AppConfig;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::auth::{JwtConfig, JwtManager};
use crate::error::ApiError;
use crate::middleware::RateLimiter;
use crate::repository::AdminUserRepository;
use crate::wechat::{DevWechatClient, HttpWechatClient, NotifyDecoder, WechatClient};

pub type Ledger = OrderLedgerService<OrderRepository, UserRepository, MerchantRepository>;
pub type Engine = PointsAwardEngine<PointsLedgerRepository>;
pub type Query = PointsQueryService<PointsLedgerRepository, UserRepository>;
pub type Users = UserService<UserRepository>;
pub type Merchants = MerchantService<MerchantRepository>;

/// Axum 应用共享状态
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL 连接池
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub ledger: Arc<Ledger>,
    pub engine: Arc<Engine>,
    pub query: Arc<Query>,
    pub users: Arc<Users>,
    pub merchants: Arc<Merchants>,
    pub admins: Arc<AdminUserRepository>,
    pub jwt_manager: Arc<JwtManager>,
    pub wechat: Arc<dyn WechatClient>,
    pub notify_decoder: Arc<NotifyDecoder>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// 使用指定的微信客户端和通知解码器创建状态
    pub fn new(
        pool: PgPool,
        config: AppConfig,
        wechat: Arc<dyn WechatClient>,
        notify_decoder: NotifyDecoder,
    ) -> Self {
        let order_repo = Arc::new(OrderRepository::new(pool.clone()));
        let user_repo = Arc::new(UserRepository::new(pool.clone()));
        let merchant_repo = Arc::new(MerchantRepository::new(pool.clone()));
        let ledger_repo = Arc::new(PointsLedgerRepository::new(pool.clone()));

        let ledger = OrderLedgerService::new(
            order_repo,
            user_repo.clone(),
            merchant_repo.clone(),
            pool.clone(),
        );
        let engine = PointsAwardEngine::new(ledger_repo.clone(), pool.clone());
        let query = PointsQueryService::new(ledger_repo, user_repo.clone());

        Self {
            ledger: Arc::new(ledger),
            engine: Arc::new(engine),
            query: Arc::new(query),
            users: Arc::new(UserService::new(user_repo)),
            merchants: Arc::new(MerchantService::new(merchant_repo)),
            admins: Arc::new(AdminUserRepository::new(pool.clone())),
            jwt_manager: Arc::new(JwtManager::new(JwtConfig::from(&config.auth))),
            rate_limiter: Arc::new(RateLimiter::new(config.rate_limit.clone())),
            wechat,
            notify_decoder: Arc::new(notify_decoder),
            config: Arc::new(config),
            pool,
        }
    }

    /// 按配置选择微信客户端和通知解码器
    ///
    /// 未配置 AppID 时使用开发客户端，未配置 APIv3 密钥时通知走 passthrough
    pub fn from_config(pool: PgPool, config: AppConfig) -> Result<Self, ApiError> {
        let wechat: Arc<dyn WechatClient> = if config.wechat.app_id.is_empty() {
            warn!("未配置 wechat.app_id，小程序登录使用开发模式");
            Arc::new(DevWechatClient)
        } else {
            Arc::new(HttpWechatClient::new(&config.wechat)?)
        };

        let decoder = NotifyDecoder::from_api_v3_key(config.wechat.api_v3_key.as_deref())
            .map_err(|e| ApiError::Internal(format!("支付通知解码器初始化失败: {}", e)))?;
        if decoder.is_verifying() {
            info!("支付通知解密已启用");
        } else {
            warn!("未配置 wechat.api_v3_key，支付通知以 passthrough 模式处理");
        }

        Ok(Self::new(pool, config, wechat, decoder))
    }
}
