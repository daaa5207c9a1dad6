//! 积分发放引擎
//!
//! 负责所有积分余额变动：支付奖励、管理员调整、商城消费、退款扣回和过期扣减。
//!
//! ## 一致性保证
//!
//! 每次变动都在一个事务内完成：锁定用户行 → 计算新余额 → 追加流水 → 写回 `users.points_balance`。
//! 流水表上的部分唯一索引保证同一订单最多一条支付奖励、同一奖励最多被核销一次，
//! 即使两个事务同时通过了前置检查，也只有一个能写入。
//!
//! ## 积分过期
//!
//! 消费按先进先出抵扣最早获得的积分。某条奖励到期时，仍未被抵扣的部分为
//! `clamp(截至该奖励的累计获得 - 累计扣减, 0, 奖励积分 - 已退款扣回)`，再受当前余额限制。
//!
//! 订单退款时扣回的积分挂在该订单的奖励流水上（`ref_entry_id`），相当于撤销这条奖励：
//! 累计获得中减去这部分，累计扣减中不计入，已过期核销的部分不再重复扣回。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument, warn};

use points_shared::observability::metrics;

use crate::error::{PointsError, Result};
use crate::models::{
    MAX_LEDGER_DESCRIPTION_CHARS, NewLedgerEntry, OrderStatus, PaymentOrder, PointsLedgerEntry,
    PointsSource, reward_expires_at,
};
use crate::repository::{
    LedgerRepositoryTrait, OrderRepository, PointsLedgerRepository, UserRepository,
};
use crate::service::dto::ExpireOutcome;

/// 每消费 100 分（1 元）获得 1 积分
pub const MINOR_UNITS_PER_POINT: i64 = 100;

const DEFAULT_CONSUME_DESCRIPTION: &str = "积分商城消费";

/// 计算订单可获得的积分：`floor(amount / 100)`
pub fn calculate_points(amount: i64) -> i64 {
    if amount <= 0 {
        return 0;
    }
    amount / MINOR_UNITS_PER_POINT
}

/// 支付奖励发放结果
#[derive(Debug, Clone)]
pub struct AwardOutcome {
    pub entry: PointsLedgerEntry,
    /// false 表示此前已发放，本次未产生任何写入
    pub newly_awarded: bool,
}

/// 积分发放引擎
pub struct PointsAwardEngine<LR>
where
    LR: LedgerRepositoryTrait,
{
    ledger_repo: Arc<LR>,
    pool: PgPool,
}

impl<LR> PointsAwardEngine<LR>
where
    LR: LedgerRepositoryTrait,
{
    pub fn new(ledger_repo: Arc<LR>, pool: PgPool) -> Self {
        Self { ledger_repo, pool }
    }

    /// 为已支付订单发放积分（幂等）
    ///
    /// 已发放过的订单直接返回原有流水
    #[instrument(skip(self, order), fields(order_no = %order.order_no))]
    pub async fn award_for_order(&self, order: &PaymentOrder) -> Result<AwardOutcome> {
        let mut tx = self.pool.begin().await?;

        let current = OrderRepository::lock_by_id_in_tx(&mut tx, order.id)
            .await?
            .ok_or_else(|| PointsError::OrderNotFound(order.order_no.clone()))?;

        let outcome = award_for_order_in_tx(&mut tx, &current).await?;
        tx.commit().await?;

        if outcome.newly_awarded {
            metrics::record_points_change(
                PointsSource::PaymentReward.as_str(),
                outcome.entry.points_change,
            );
        }

        Ok(outcome)
    }

    /// 管理员手动调整积分
    ///
    /// 每次调用都追加一条流水；调整后余额不能为负
    #[instrument(skip(self, reason))]
    pub async fn adjust_manually(
        &self,
        user_id: i64,
        delta: i64,
        reason: &str,
        operator_id: Option<i64>,
    ) -> Result<PointsLedgerEntry> {
        if delta == 0 {
            return Err(PointsError::Validation("调整积分不能为 0".to_string()));
        }
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(PointsError::Validation("调整原因不能为空".to_string()));
        }
        check_description_len(reason, "调整原因")?;

        let mut tx = self.pool.begin().await?;

        let user = UserRepository::lock_in_tx(&mut tx, user_id)
            .await?
            .ok_or(PointsError::UserNotFound(user_id))?;

        let balance_after = apply_delta(user.points_balance, delta)?;

        let entry = NewLedgerEntry::new(user_id, PointsSource::AdminAdjust, delta, balance_after)
            .with_description(reason)
            .with_operator(operator_id);
        let created = write_entry_in_tx(&mut tx, &entry)
            .await?
            .ok_or_else(|| PointsError::Internal("积分调整流水写入失败".to_string()))?;

        tx.commit().await?;

        metrics::record_points_change(PointsSource::AdminAdjust.as_str(), delta);
        info!(
            user_id,
            delta,
            balance_after,
            operator_id = ?operator_id,
            "管理员调整积分"
        );

        Ok(created)
    }

    /// 积分商城消费
    #[instrument(skip(self, description))]
    pub async fn consume_points(
        &self,
        user_id: i64,
        points: i64,
        description: Option<&str>,
    ) -> Result<PointsLedgerEntry> {
        if points <= 0 {
            return Err(PointsError::Validation("消费积分必须大于 0".to_string()));
        }
        let description = description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_CONSUME_DESCRIPTION);
        check_description_len(description, "消费说明")?;

        let mut tx = self.pool.begin().await?;

        let user = UserRepository::lock_in_tx(&mut tx, user_id)
            .await?
            .ok_or(PointsError::UserNotFound(user_id))?;
        if !user.status.is_active() {
            return Err(PointsError::UserUnavailable(user_id));
        }

        let balance_after = apply_delta(user.points_balance, -points)?;

        let entry =
            NewLedgerEntry::new(user_id, PointsSource::MallConsumption, -points, balance_after)
                .with_description(description);
        let created = write_entry_in_tx(&mut tx, &entry)
            .await?
            .ok_or_else(|| PointsError::Internal("消费流水写入失败".to_string()))?;

        tx.commit().await?;

        metrics::record_points_change(PointsSource::MallConsumption.as_str(), -points);
        info!(user_id, points, balance_after, "积分消费成功");

        Ok(created)
    }

    /// 核销所有已到期的支付奖励
    ///
    /// 按用户分批处理，每个用户一个事务；单个用户失败只记录日志，不影响其他用户
    #[instrument(skip(self))]
    pub async fn expire_points(&self, now: DateTime<Utc>, batch_size: i64) -> Result<ExpireOutcome> {
        if batch_size <= 0 {
            return Err(PointsError::Validation("批次大小必须大于 0".to_string()));
        }

        let mut total = ExpireOutcome::default();

        loop {
            let users = self
                .ledger_repo
                .users_with_expired_rewards(now, batch_size)
                .await?;
            let fetched = users.len() as i64;

            let mut round = ExpireOutcome::default();
            for user_id in users {
                match self.expire_user_points(user_id, now).await {
                    Ok(outcome) => round.merge(outcome),
                    Err(e) => warn!(user_id, error = %e, "用户积分过期处理失败"),
                }
            }
            total.merge(round);

            // 本轮没有任何进展时停止，避免对持续失败的用户空转
            if fetched < batch_size || round.entries == 0 {
                break;
            }
        }

        if total.entries > 0 {
            metrics::record_points_expired(total.points);
            info!(
                users = total.users,
                entries = total.entries,
                points = total.points,
                "积分过期处理完成"
            );
        }

        Ok(total)
    }

    /// 在单个事务内核销一个用户的全部到期奖励
    async fn expire_user_points(&self, user_id: i64, now: DateTime<Utc>) -> Result<ExpireOutcome> {
        let mut tx = self.pool.begin().await?;

        let Some(user) = UserRepository::lock_in_tx(&mut tx, user_id).await? else {
            return Ok(ExpireOutcome::default());
        };

        let rewards =
            PointsLedgerRepository::expired_rewards_for_user_in_tx(&mut tx, user_id, now).await?;
        if rewards.is_empty() {
            return Ok(ExpireOutcome::default());
        }

        let mut balance = user.points_balance;
        let mut outcome = ExpireOutcome {
            users: 1,
            ..Default::default()
        };

        for reward in rewards {
            let credits =
                PointsLedgerRepository::credits_through_in_tx(&mut tx, user_id, reward.id).await?;
            let debits = PointsLedgerRepository::total_debits_in_tx(&mut tx, user_id).await?;
            let refunded = PointsLedgerRepository::retired_points_in_tx(
                &mut tx,
                reward.id,
                PointsSource::AdminAdjust,
            )
            .await?;
            let deduct =
                unspent_reward(credits, debits, reward.points_change - refunded).min(balance);

            let entry =
                NewLedgerEntry::new(user_id, PointsSource::ExpiredDeduct, -deduct, balance - deduct)
                    .with_ref_entry(reward.id)
                    .with_description(format!("积分过期: 奖励流水 #{}", reward.id));

            if write_entry_in_tx(&mut tx, &entry).await?.is_some() {
                balance -= deduct;
                outcome.entries += 1;
                outcome.points += deduct as u64;
            }
        }

        tx.commit().await?;

        if outcome.points > 0 {
            metrics::record_points_change(
                PointsSource::ExpiredDeduct.as_str(),
                -(outcome.points as i64),
            );
        }

        Ok(outcome)
    }
}

// ==================== 事务内操作 ====================

/// 在调用方事务中为订单发放积分
///
/// 订单必须处于已支付状态。已存在奖励流水时原样返回，不做任何写入。
pub async fn award_for_order_in_tx(
    tx: &mut PgConnection,
    order: &PaymentOrder,
) -> Result<AwardOutcome> {
    if order.status != OrderStatus::Paid {
        return Err(PointsError::OrderNotPaid(order.order_no.clone()));
    }

    if let Some(existing) = PointsLedgerRepository::find_reward_by_order_in_tx(tx, order.id).await? {
        return Ok(AwardOutcome {
            entry: existing,
            newly_awarded: false,
        });
    }

    let user = UserRepository::lock_in_tx(tx, order.user_id)
        .await?
        .ok_or(PointsError::UserNotFound(order.user_id))?;

    let points = calculate_points(order.amount);
    let balance_after = apply_delta(user.points_balance, points)?;

    // 0 积分的小额订单同样写入流水，作为已处理标记
    let entry = NewLedgerEntry::new(user.id, PointsSource::PaymentReward, points, balance_after)
        .with_order(order.id)
        .with_description(format!("支付奖励: {}", order.order_no))
        .with_expires_at(reward_expires_at(Utc::now()));

    let Some(created) = write_entry_in_tx(tx, &entry).await? else {
        let existing = PointsLedgerRepository::find_reward_by_order_in_tx(tx, order.id)
            .await?
            .ok_or_else(|| PointsError::Internal("支付奖励流水冲突但未找到原记录".to_string()))?;
        return Ok(AwardOutcome {
            entry: existing,
            newly_awarded: false,
        });
    };

    OrderRepository::set_points_awarded_in_tx(tx, order.id, points).await?;

    Ok(AwardOutcome {
        entry: created,
        newly_awarded: true,
    })
}

/// 在调用方事务中扣回退款订单的积分
///
/// 只扣回该订单奖励中尚未过期核销的部分，且不超过用户当前余额；
/// 扣回流水通过 `ref_entry_id` 指向被撤销的奖励。返回实际扣回的积分和对应流水
pub async fn deduct_for_refund_in_tx(
    tx: &mut PgConnection,
    order: &PaymentOrder,
    operator_id: Option<i64>,
) -> Result<(i64, Option<PointsLedgerEntry>)> {
    let user = UserRepository::lock_in_tx(tx, order.user_id)
        .await?
        .ok_or(PointsError::UserNotFound(order.user_id))?;

    let reward = PointsLedgerRepository::find_reward_by_order_in_tx(tx, order.id).await?;
    let expired = match &reward {
        Some(reward) => {
            PointsLedgerRepository::retired_points_in_tx(tx, reward.id, PointsSource::ExpiredDeduct)
                .await?
        }
        None => 0,
    };

    let deduct = refund_deduction(order.points_awarded, expired, user.points_balance);
    if deduct == 0 {
        return Ok((0, None));
    }

    let mut entry = NewLedgerEntry::new(
        user.id,
        PointsSource::AdminAdjust,
        -deduct,
        user.points_balance - deduct,
    )
    .with_order(order.id)
    .with_description(format!("订单退款扣回积分: {}", order.order_no))
    .with_operator(operator_id);
    if let Some(reward) = &reward {
        entry = entry.with_ref_entry(reward.id);
    }

    let created = write_entry_in_tx(tx, &entry)
        .await?
        .ok_or_else(|| PointsError::Internal("退款扣回流水写入失败".to_string()))?;

    Ok((deduct, Some(created)))
}

/// 追加流水并同步用户余额
///
/// 唯一索引冲突时不写入任何内容并返回 None
async fn write_entry_in_tx(
    tx: &mut PgConnection,
    entry: &NewLedgerEntry,
) -> Result<Option<PointsLedgerEntry>> {
    let Some(created) = PointsLedgerRepository::insert_in_tx(tx, entry).await? else {
        return Ok(None);
    };
    UserRepository::update_balance_in_tx(tx, entry.user_id, entry.balance_after).await?;
    Ok(Some(created))
}

// ==================== 纯计算 ====================

/// 应用积分变动，结果不能为负
fn apply_delta(balance: i64, delta: i64) -> Result<i64> {
    let next = balance
        .checked_add(delta)
        .ok_or_else(|| PointsError::Validation("积分变动超出范围".to_string()))?;
    if next < 0 {
        return Err(PointsError::InsufficientBalance {
            required: -delta,
            available: balance,
        });
    }
    Ok(next)
}

/// 退款应扣回的积分：奖励中未过期的部分，受余额限制
fn refund_deduction(points_awarded: i64, expired: i64, balance: i64) -> i64 {
    (points_awarded - expired).min(balance).max(0)
}

fn check_description_len(text: &str, field: &str) -> Result<()> {
    if text.chars().count() > MAX_LEDGER_DESCRIPTION_CHARS {
        return Err(PointsError::Validation(format!(
            "{field}不能超过 {MAX_LEDGER_DESCRIPTION_CHARS} 个字符"
        )));
    }
    Ok(())
}

/// 先进先出口径下某条奖励尚未被消费的积分
fn unspent_reward(credits_through: i64, total_debits: i64, reward_points: i64) -> i64 {
    (credits_through - total_debits).clamp(0, reward_points.max(0))
}
