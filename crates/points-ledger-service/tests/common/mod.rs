//! 集成测试公共辅助
//!
//! 每个测试使用独立的 openid 和商户编号，结束时按 ID 清理自己的数据

#![allow(dead_code)]

use std::sync::Arc;

use points_ledger::repository::{
    MerchantRepository, OrderRepository, PointsLedgerRepository, UserRepository,
};
use points_ledger::service::dto::CreateOrderCommand;
use points_ledger::service::{OrderLedgerService, PointsAwardEngine, PointsQueryService};
use points_ledger::PaymentOrder;
use points_shared::database::Database;
use points_shared::test_utils::{test_database_config, test_merchant_no, test_openid};
use sqlx::PgPool;

pub type Ledger = OrderLedgerService<OrderRepository, UserRepository, MerchantRepository>;
pub type Engine = PointsAwardEngine<PointsLedgerRepository>;
pub type Query = PointsQueryService<PointsLedgerRepository, UserRepository>;

pub struct TestContext {
    pub pool: PgPool,
    pub ledger: Ledger,
    pub engine: Engine,
    pub query: Query,
}

impl TestContext {
    pub async fn new() -> Self {
        let db = Database::connect(&test_database_config())
            .await
            .expect("连接测试数据库失败");
        db.run_migrations().await.expect("执行迁移失败");
        let pool = db.pool().clone();

        let order_repo = Arc::new(OrderRepository::new(pool.clone()));
        let user_repo = Arc::new(UserRepository::new(pool.clone()));
        let merchant_repo = Arc::new(MerchantRepository::new(pool.clone()));
        let ledger_repo = Arc::new(PointsLedgerRepository::new(pool.clone()));

        Self {
            ledger: OrderLedgerService::new(order_repo, user_repo.clone(), merchant_repo, pool.clone()),
            engine: PointsAwardEngine::new(ledger_repo.clone(), pool.clone()),
            query: PointsQueryService::new(ledger_repo, user_repo),
            pool,
        }
    }

    /// 插入测试用户和商户，返回 (user_id, merchant_id)
    pub async fn seed_user_and_merchant(&self) -> (i64, i64) {
        let user_id: i64 = sqlx::query_scalar(
            "INSERT INTO users (wechat_openid, nickname) VALUES ($1, '集成测试用户') RETURNING id",
        )
        .bind(test_openid())
        .fetch_one(&self.pool)
        .await
        .expect("插入测试用户失败");

        let merchant_id: i64 = sqlx::query_scalar(
            "INSERT INTO merchants (merchant_no, name, status) VALUES ($1, '集成测试商户', 'active') RETURNING id",
        )
        .bind(test_merchant_no())
        .fetch_one(&self.pool)
        .await
        .expect("插入测试商户失败");

        (user_id, merchant_id)
    }

    pub async fn create_order(&self, user_id: i64, merchant_id: i64, amount: i64) -> PaymentOrder {
        self.ledger
            .create_order(CreateOrderCommand::new(user_id, merchant_id, amount))
            .await
            .expect("创建订单失败")
    }

    pub async fn balance(&self, user_id: i64) -> i64 {
        sqlx::query_scalar("SELECT points_balance FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .expect("查询余额失败")
    }

    pub async fn ledger_count(&self, user_id: i64) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM points_ledger WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .expect("查询流水失败")
    }

    pub async fn order_status(&self, order_no: &str) -> String {
        sqlx::query_scalar("SELECT status FROM payment_orders WHERE order_no = $1")
            .bind(order_no)
            .fetch_one(&self.pool)
            .await
            .expect("查询订单失败")
    }

    /// 直接写入余额和对应的调整流水，作为测试初始状态
    pub async fn grant(&self, user_id: i64, points: i64) {
        self.engine
            .adjust_manually(user_id, points, "测试初始积分", None)
            .await
            .expect("初始化积分失败");
    }

    pub async fn cleanup(&self, user_id: i64, merchant_id: i64) {
        for sql in [
            "DELETE FROM points_ledger WHERE user_id = $1",
            "DELETE FROM payment_orders WHERE user_id = $1",
            "DELETE FROM users WHERE id = $1",
        ] {
            sqlx::query(sql)
                .bind(user_id)
                .execute(&self.pool)
                .await
                .expect("清理测试数据失败");
        }
        sqlx::query("DELETE FROM merchants WHERE id = $1")
            .bind(merchant_id)
            .execute(&self.pool)
            .await
            .expect("清理测试商户失败");
    }
}
