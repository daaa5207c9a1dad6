//! 支付确认与积分发放集成测试
//!
//! 订单确认、积分发放和余额更新都依赖数据库行锁与唯一索引，需要真实 PostgreSQL。
//!
//! ## 运行方式
//!
//! ```bash
//! DATABASE_URL=postgres://... cargo test -p points-ledger-service --test ledger_flow_test -- --ignored
//! ```

mod common;

use chrono::{Duration, Utc};
use common::TestContext;
use points_ledger::{OrderStatus, PointsError, PointsSource};

// ==================== 支付确认 ====================

#[tokio::test]
#[ignore = "需要 PostgreSQL"]
async fn test_confirm_payment_awards_points_once() {
    let ctx = TestContext::new().await;
    let (user_id, merchant_id) = ctx.seed_user_and_merchant().await;

    let order = ctx.create_order(user_id, merchant_id, 1234).await;
    assert_eq!(order.status, OrderStatus::Pending);

    let first = ctx
        .ledger
        .confirm_payment(&order.order_no, 1234, Some("4200000001"))
        .await
        .unwrap();
    assert!(!first.already_processed);
    assert_eq!(first.points_awarded, 12);
    assert_eq!(first.order.status, OrderStatus::Paid);
    assert_eq!(first.order.transaction_id.as_deref(), Some("4200000001"));

    let second = ctx
        .ledger
        .confirm_payment(&order.order_no, 1234, Some("4200000001"))
        .await
        .unwrap();
    assert!(second.already_processed);
    assert_eq!(second.points_awarded, 12);
    assert_eq!(
        second.reward.as_ref().map(|e| e.id),
        first.reward.as_ref().map(|e| e.id),
        "重复确认应返回同一条奖励流水"
    );

    assert_eq!(ctx.balance(user_id).await, 12);
    assert_eq!(ctx.ledger_count(user_id).await, 1);

    let (total_amount, total_orders): (i64, i64) =
        sqlx::query_as("SELECT total_amount, total_orders FROM merchants WHERE id = $1")
            .bind(merchant_id)
            .fetch_one(&ctx.pool)
            .await
            .unwrap();
    assert_eq!(total_amount, 1234);
    assert_eq!(total_orders, 1, "重复确认不应重复累加商户统计");

    ctx.cleanup(user_id, merchant_id).await;
}

#[tokio::test]
#[ignore = "需要 PostgreSQL"]
async fn test_concurrent_confirmations_award_exactly_once() {
    let ctx = TestContext::new().await;
    let (user_id, merchant_id) = ctx.seed_user_and_merchant().await;
    let order = ctx.create_order(user_id, merchant_id, 5000).await;

    let attempts = (0..8).map(|_| ctx.ledger.confirm_payment(&order.order_no, 5000, None));
    let results = futures::future::join_all(attempts).await;

    let confirmed = results
        .iter()
        .filter(|r| matches!(r, Ok(c) if !c.already_processed))
        .count();
    let repeated = results
        .iter()
        .filter(|r| matches!(r, Ok(c) if c.already_processed))
        .count();
    assert_eq!(confirmed, 1, "只能有一次真正的确认");
    assert_eq!(repeated, 7);

    assert_eq!(ctx.balance(user_id).await, 50);
    assert_eq!(ctx.ledger_count(user_id).await, 1);

    ctx.cleanup(user_id, merchant_id).await;
}

#[tokio::test]
#[ignore = "需要 PostgreSQL"]
async fn test_amount_mismatch_leaves_order_pending() {
    let ctx = TestContext::new().await;
    let (user_id, merchant_id) = ctx.seed_user_and_merchant().await;
    let order = ctx.create_order(user_id, merchant_id, 1000).await;

    let result = ctx.ledger.confirm_payment(&order.order_no, 1, None).await;
    assert!(matches!(
        result,
        Err(PointsError::AmountMismatch {
            expected: 1000,
            actual: 1,
            ..
        })
    ));

    assert_eq!(ctx.order_status(&order.order_no).await, "pending");
    assert_eq!(ctx.balance(user_id).await, 0);
    assert_eq!(ctx.ledger_count(user_id).await, 0);

    ctx.cleanup(user_id, merchant_id).await;
}

#[tokio::test]
#[ignore = "需要 PostgreSQL"]
async fn test_confirm_unknown_order() {
    let ctx = TestContext::new().await;
    let result = ctx.ledger.confirm_payment("NO_DOES_NOT_EXIST", 100, None).await;
    assert!(matches!(result, Err(PointsError::OrderNotFound(_))));
}

#[tokio::test]
#[ignore = "需要 PostgreSQL"]
async fn test_small_order_marks_award_with_zero_points() {
    let ctx = TestContext::new().await;
    let (user_id, merchant_id) = ctx.seed_user_and_merchant().await;
    let order = ctx.create_order(user_id, merchant_id, 99).await;

    let confirmation = ctx.ledger.confirm_payment(&order.order_no, 99, None).await.unwrap();
    assert_eq!(confirmation.points_awarded, 0);
    let reward = confirmation.reward.expect("0 积分订单也应写入奖励流水");
    assert_eq!(reward.points_change, 0);
    assert_eq!(reward.source, PointsSource::PaymentReward);

    // 再次发放仍然幂等
    let again = ctx.engine.award_for_order(&confirmation.order).await.unwrap();
    assert!(!again.newly_awarded);
    assert_eq!(again.entry.id, reward.id);
    assert_eq!(ctx.balance(user_id).await, 0);

    ctx.cleanup(user_id, merchant_id).await;
}

#[tokio::test]
#[ignore = "需要 PostgreSQL"]
async fn test_award_requires_paid_order() {
    let ctx = TestContext::new().await;
    let (user_id, merchant_id) = ctx.seed_user_and_merchant().await;
    let order = ctx.create_order(user_id, merchant_id, 800).await;

    let result = ctx.engine.award_for_order(&order).await;
    assert!(matches!(result, Err(PointsError::OrderNotPaid(_))));
    assert_eq!(ctx.ledger_count(user_id).await, 0);

    ctx.cleanup(user_id, merchant_id).await;
}

// ==================== 支付失败与过期 ====================

#[tokio::test]
#[ignore = "需要 PostgreSQL"]
async fn test_fail_payment_then_confirm_rejected() {
    let ctx = TestContext::new().await;
    let (user_id, merchant_id) = ctx.seed_user_and_merchant().await;
    let order = ctx.create_order(user_id, merchant_id, 300).await;

    let failed = ctx.ledger.fail_payment(&order.order_no, None).await.unwrap();
    assert!(!failed.already_processed);
    assert_eq!(failed.order.status, OrderStatus::Failed);

    let again = ctx.ledger.fail_payment(&order.order_no, None).await.unwrap();
    assert!(again.already_processed);

    let confirm = ctx.ledger.confirm_payment(&order.order_no, 300, None).await;
    assert!(matches!(confirm, Err(PointsError::InvalidOrderStatus { .. })));

    ctx.cleanup(user_id, merchant_id).await;
}

#[tokio::test]
#[ignore = "需要 PostgreSQL"]
async fn test_expire_stale_orders_is_idempotent() {
    let ctx = TestContext::new().await;
    let (user_id, merchant_id) = ctx.seed_user_and_merchant().await;
    let stale = ctx.create_order(user_id, merchant_id, 500).await;
    let fresh = ctx.create_order(user_id, merchant_id, 600).await;

    // 订单有效期 1 小时，模拟 2 小时之后的清理
    let later = Utc::now() + Duration::hours(2);
    sqlx::query("UPDATE payment_orders SET expired_at = NOW() + INTERVAL '3 hours' WHERE id = $1")
        .bind(fresh.id)
        .execute(&ctx.pool)
        .await
        .unwrap();

    let first = ctx.ledger.expire_stale_orders(later, 100).await.unwrap();
    assert!(first >= 1);
    assert_eq!(ctx.order_status(&stale.order_no).await, "expired");
    assert_eq!(ctx.order_status(&fresh.order_no).await, "pending");

    // 第二次清理不应再影响本测试的订单
    ctx.ledger.expire_stale_orders(later, 100).await.unwrap();
    assert_eq!(ctx.order_status(&fresh.order_no).await, "pending");

    let confirm = ctx.ledger.confirm_payment(&stale.order_no, 500, None).await;
    assert!(matches!(confirm, Err(PointsError::InvalidOrderStatus { .. })));

    ctx.cleanup(user_id, merchant_id).await;
}

// ==================== 管理员调整与消费 ====================

#[tokio::test]
#[ignore = "需要 PostgreSQL"]
async fn test_negative_adjustment_guard() {
    let ctx = TestContext::new().await;
    let (user_id, merchant_id) = ctx.seed_user_and_merchant().await;
    ctx.grant(user_id, 300).await;

    let result = ctx.engine.adjust_manually(user_id, -500, "扣减", Some(1)).await;
    assert!(matches!(
        result,
        Err(PointsError::InsufficientBalance {
            required: 500,
            available: 300
        })
    ));
    assert_eq!(ctx.balance(user_id).await, 300);
    assert_eq!(ctx.ledger_count(user_id).await, 1);

    let entry = ctx
        .engine
        .adjust_manually(user_id, -300, "清零", Some(1))
        .await
        .unwrap();
    assert_eq!(entry.balance_after, 0);
    assert_eq!(entry.operator_id, Some(1));
    assert_eq!(ctx.balance(user_id).await, 0);

    ctx.cleanup(user_id, merchant_id).await;
}

#[tokio::test]
#[ignore = "需要 PostgreSQL"]
async fn test_balance_matches_ledger_after_mixed_operations() {
    let ctx = TestContext::new().await;
    let (user_id, merchant_id) = ctx.seed_user_and_merchant().await;

    for amount in [1234, 10_000, 99] {
        let order = ctx.create_order(user_id, merchant_id, amount).await;
        ctx.ledger.confirm_payment(&order.order_no, amount, None).await.unwrap();
    }
    ctx.grant(user_id, 50).await;
    ctx.engine.consume_points(user_id, 60, Some("兑换咖啡券")).await.unwrap();

    let insufficient = ctx.engine.consume_points(user_id, 10_000, None).await;
    assert!(matches!(insufficient, Err(PointsError::InsufficientBalance { .. })));

    // 12 + 100 + 0 + 50 - 60
    assert_eq!(ctx.balance(user_id).await, 102);

    let verification = ctx.query.verify_balance(user_id).await.unwrap();
    assert!(verification.consistent, "{verification:?}");
    assert_eq!(verification.ledger_sum, 102);
    assert_eq!(verification.entry_count, 5);

    let summary = ctx.query.balance_summary(user_id, Utc::now()).await.unwrap();
    assert_eq!(summary.total_earned, 162);
    assert_eq!(summary.total_spent, 60);

    let history = ctx
        .query
        .history(user_id, Default::default(), 10, 0)
        .await
        .unwrap();
    assert_eq!(history.total, 5);
    assert_eq!(history.items[0].source, PointsSource::MallConsumption);

    ctx.cleanup(user_id, merchant_id).await;
}

// ==================== 退款 ====================

#[tokio::test]
#[ignore = "需要 PostgreSQL"]
async fn test_refund_deduction_clamped_to_balance() {
    let ctx = TestContext::new().await;
    let (user_id, merchant_id) = ctx.seed_user_and_merchant().await;

    let order = ctx.create_order(user_id, merchant_id, 5000).await;
    ctx.ledger.confirm_payment(&order.order_no, 5000, None).await.unwrap();
    ctx.engine.consume_points(user_id, 30, None).await.unwrap();

    let refund = ctx
        .ledger
        .refund_order(&order.order_no, "用户申请退款", Some(1))
        .await
        .unwrap();
    assert_eq!(refund.order.status, OrderStatus::Refunded);
    assert_eq!(refund.deducted_points, 20);
    assert_eq!(ctx.balance(user_id).await, 0);

    let again = ctx.ledger.refund_order(&order.order_no, "重复退款", Some(1)).await;
    assert!(matches!(again, Err(PointsError::AlreadyProcessed(_))));

    // 已退款订单的支付回调视为重复
    let confirm = ctx.ledger.confirm_payment(&order.order_no, 5000, None).await.unwrap();
    assert!(confirm.already_processed);

    assert!(ctx.query.verify_balance(user_id).await.unwrap().consistent);

    ctx.cleanup(user_id, merchant_id).await;
}
