//! 小程序支付接口

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use points_ledger::PaymentOrder;
use points_ledger::service::calculate_points;
use points_ledger::service::dto::{CreateOrderCommand, PaymentConfirmation};
use tracing::{info, instrument};
use validator::Validate;

use crate::auth::Claims;
use crate::dto::{
    ApiResponse, CreatePaymentRequest, CreatePaymentResponse, MockPaymentRequest, PageResponse,
    PaginationParams,
};
use crate::error::{ApiError, Result};
use crate::handlers::notify::{TransactionOutcome, handle_transaction};
use crate::state::AppState;
use crate::wechat::{NotifyError, Transaction, TransactionAmount};

/// 创建支付订单
///
/// POST /api/payments
#[instrument(skip_all)]
pub async fn create_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<Json<ApiResponse<CreatePaymentResponse>>> {
    req.validate()?;

    let mut cmd = CreateOrderCommand::new(claims.subject_id()?, req.merchant_id, req.amount);
    if let Some(description) = req.description {
        cmd = cmd.with_description(description);
    }

    let order = state.ledger.create_order(cmd).await?;
    let expected_points = calculate_points(order.amount);

    Ok(Json(ApiResponse::success_with_message(
        CreatePaymentResponse {
            order,
            expected_points,
        },
        "订单创建成功",
    )))
}

/// 查询自己的订单
///
/// GET /api/payments/{order_no}
pub async fn get_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(order_no): Path<String>,
) -> Result<Json<ApiResponse<PaymentOrder>>> {
    let order = state
        .ledger
        .get_user_order(&order_no, claims.subject_id()?)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

/// 支付记录
///
/// GET /api/payments/history
pub async fn payment_history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PageResponse<PaymentOrder>>>> {
    let page = state
        .ledger
        .list_user_orders(claims.subject_id()?, pagination.limit(), pagination.offset())
        .await?;
    Ok(Json(ApiResponse::success(PageResponse::from_page(
        page,
        &pagination,
    ))))
}

/// 模拟支付成功（仅开发环境）
///
/// POST /api/payments/mock-success
///
/// 构造一条支付成功通知并走与真实通知相同的解码和确认流程
#[instrument(skip_all)]
pub async fn mock_payment_success(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<MockPaymentRequest>,
) -> Result<Json<ApiResponse<PaymentConfirmation>>> {
    if !state.config.wechat.mock_payment_enabled {
        return Err(ApiError::Forbidden("模拟支付未开启".to_string()));
    }
    req.validate()?;

    let order = state
        .ledger
        .get_user_order(&req.order_no, claims.subject_id()?)
        .await?;

    let transaction = Transaction {
        out_trade_no: order.order_no.clone(),
        transaction_id: Some(format!("MOCK{}", uuid::Uuid::new_v4().simple())),
        trade_state: "SUCCESS".to_string(),
        trade_state_desc: Some("模拟支付成功".to_string()),
        success_time: Some(chrono::Utc::now().to_rfc3339()),
        amount: TransactionAmount {
            total: order.amount,
            payer_total: Some(order.amount),
            currency: Some("CNY".to_string()),
        },
    };

    let body = state.notify_decoder.seal(&transaction).map_err(notify_error)?;
    let (_, decoded) = state.notify_decoder.decode(&body).map_err(notify_error)?;

    match handle_transaction(&state, &decoded).await? {
        TransactionOutcome::Confirmed(confirmation) => {
            info!(
                order_no = %order.order_no,
                points = confirmation.points_awarded,
                "模拟支付完成"
            );
            Ok(Json(ApiResponse::success_with_message(
                confirmation,
                "模拟支付成功",
            )))
        }
        other => Err(ApiError::Internal(format!("模拟支付结果异常: {:?}", other))),
    }
}

fn notify_error(err: NotifyError) -> ApiError {
    ApiError::Internal(format!("构造模拟通知失败: {}", err))
}
