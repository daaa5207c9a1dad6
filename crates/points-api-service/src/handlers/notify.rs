//! 微信支付结果通知
//!
//! 应答约定：
//! - 处理成功或重复通知返回 200 SUCCESS
//! - 通知无法解密、订单不存在、金额不一致返回 400 FAIL
//! - 存储故障返回 500 FAIL，由微信重新投递

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use points_ledger::PointsError;
use points_ledger::service::dto::{PaymentConfirmation, PaymentFailure};
use points_shared::observability::metrics;
use serde_json::json;
use tracing::{error, info, instrument, warn};

use crate::state::AppState;
use crate::wechat::{TradeAction, Transaction};

/// 单笔交易通知的处理结果
#[derive(Debug)]
pub enum TransactionOutcome {
    Confirmed(PaymentConfirmation),
    Failed(PaymentFailure),
    /// 中间状态，不改变订单
    Acknowledged,
}

impl TransactionOutcome {
    fn label(&self) -> &'static str {
        match self {
            Self::Confirmed(c) if c.already_processed => "duplicate",
            Self::Confirmed(_) => "confirmed",
            Self::Failed(f) if f.already_processed => "duplicate",
            Self::Failed(_) => "failed",
            Self::Acknowledged => "acknowledged",
        }
    }
}

/// 按交易状态调用订单服务
pub async fn handle_transaction(
    state: &AppState,
    transaction: &Transaction,
) -> Result<TransactionOutcome, PointsError> {
    let order_no = transaction.out_trade_no.as_str();
    let transaction_id = transaction.transaction_id.as_deref();

    match transaction.action() {
        TradeAction::Confirm => state
            .ledger
            .confirm_payment(order_no, transaction.amount.total, transaction_id)
            .await
            .map(TransactionOutcome::Confirmed),
        TradeAction::Fail => state
            .ledger
            .fail_payment(order_no, transaction_id)
            .await
            .map(TransactionOutcome::Failed),
        TradeAction::Acknowledge => {
            info!(
                order_no,
                trade_state = %transaction.trade_state,
                "收到中间状态通知，不处理"
            );
            Ok(TransactionOutcome::Acknowledged)
        }
    }
}

/// 支付结果通知
///
/// POST /api/payments/notify
#[instrument(skip_all)]
pub async fn payment_notify(State(state): State<AppState>, body: Bytes) -> Response {
    let (envelope, transaction) = match state.notify_decoder.decode(&body) {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!(error = %e, "支付通知校验失败");
            metrics::record_payment_callback("unknown", "rejected");
            return ack(StatusCode::BAD_REQUEST, "FAIL", "通知校验失败");
        }
    };

    info!(
        notify_id = %envelope.id,
        order_no = %transaction.out_trade_no,
        trade_state = %transaction.trade_state,
        amount = transaction.amount.total,
        "收到支付通知"
    );

    let result = handle_transaction(&state, &transaction).await;
    let (status, code, message, outcome) = match &result {
        Ok(outcome) => (StatusCode::OK, "SUCCESS", "成功", outcome.label()),
        Err(e) => {
            let (status, code, message) = error_ack(e);
            if status == StatusCode::OK {
                error!(
                    order_no = %transaction.out_trade_no,
                    trade_state = %transaction.trade_state,
                    error = %e,
                    "支付通知与订单状态冲突，需人工核对"
                );
            } else {
                warn!(order_no = %transaction.out_trade_no, error = %e, "支付通知处理失败");
            }
            (status, code, message, e.error_code())
        }
    };

    metrics::record_payment_callback(&transaction.trade_state, outcome);
    ack(status, code, message)
}

/// 错误到应答的映射
///
/// 状态冲突无法通过重投解决，应答成功并记录错误日志
fn error_ack(err: &PointsError) -> (StatusCode, &'static str, &'static str) {
    match err {
        PointsError::InvalidOrderStatus { .. }
        | PointsError::AlreadyProcessed(_)
        | PointsError::OrderNotPaid(_) => (StatusCode::OK, "SUCCESS", "成功"),
        PointsError::StorageUnavailable(_) | PointsError::Internal(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "FAIL", "系统繁忙")
        }
        PointsError::OrderNotFound(_) => (StatusCode::BAD_REQUEST, "FAIL", "订单不存在"),
        PointsError::AmountMismatch { .. } => (StatusCode::BAD_REQUEST, "FAIL", "金额不一致"),
        _ => (StatusCode::BAD_REQUEST, "FAIL", "通知处理失败"),
    }
}

fn ack(status: StatusCode, code: &str, message: &str) -> Response {
    (status, axum::Json(json!({ "code": code, "message": message }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_ack_mapping() {
        let cases = [
            (
                PointsError::InvalidOrderStatus {
                    order_no: "NO1".to_string(),
                    current_status: "expired".to_string(),
                },
                StatusCode::OK,
            ),
            (
                PointsError::AlreadyProcessed("NO1".to_string()),
                StatusCode::OK,
            ),
            (
                PointsError::OrderNotFound("NO1".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                PointsError::AmountMismatch {
                    order_no: "NO1".to_string(),
                    expected: 1999,
                    actual: 1,
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                PointsError::StorageUnavailable(sqlx::Error::PoolTimedOut),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            let (status, code, _) = error_ack(&err);
            assert_eq!(status, expected, "{err}");
            assert_eq!(code == "SUCCESS", status == StatusCode::OK);
        }
    }
}
