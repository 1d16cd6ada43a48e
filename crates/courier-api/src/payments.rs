use axum::{
    Json,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use tracing::info;

use courier_types::api::{
    OkResponse, PaymentCreatedResponse, PaymentQuery, PaymentRequest, PaymentsResponse,
};

use crate::auth::AppState;
use crate::error::ApiError;

/// Action-dispatched POST /payments. `confirm_payment` and `fail_payment`
/// arrive from the payment gateway's callback, which is untrusted input:
/// both settle idempotently, so a replayed callback cannot double-grant.
pub async fn payment_actions(
    State(state): State<AppState>,
    Json(req): Json<PaymentRequest>,
) -> Result<Response, ApiError> {
    match req {
        PaymentRequest::CreatePayment {
            user_id,
            payment_type,
            payment_method,
            amount,
        } => {
            let db = state.clone();
            let tx = tokio::task::spawn_blocking(move || {
                db.db
                    .create_payment(user_id, &payment_type, &payment_method, amount)
            })
            .await??;

            let payment_url = format!(
                "{}/{}",
                state.payment_base_url.trim_end_matches('/'),
                tx.reference
            );
            info!("Payment {} created for {} ({})", tx.reference, tx.user_id, tx.amount);

            Ok(Json(PaymentCreatedResponse {
                success: true,
                payment_id: tx.id,
                transaction_id: tx.reference,
                amount: tx.amount,
                payment_url,
            })
            .into_response())
        }

        PaymentRequest::ConfirmPayment { transaction_id } => {
            let db = state.clone();
            let tx =
                tokio::task::spawn_blocking(move || db.db.confirm_payment(&transaction_id))
                    .await??;
            info!("Payment {} confirmed", tx.reference);
            Ok(Json(OkResponse { success: true }).into_response())
        }

        PaymentRequest::FailPayment { transaction_id } => {
            let db = state.clone();
            let tx = tokio::task::spawn_blocking(move || db.db.fail_payment(&transaction_id))
                .await??;
            info!("Payment {} failed", tx.reference);
            Ok(Json(OkResponse { success: true }).into_response())
        }
    }
}

/// GET /payments?user_id= — billing history, newest first.
pub async fn payment_history(
    State(state): State<AppState>,
    Query(query): Query<PaymentQuery>,
) -> Result<Json<PaymentsResponse>, ApiError> {
    let db = state.clone();
    let payments =
        tokio::task::spawn_blocking(move || db.db.list_payments(query.user_id)).await??;
    Ok(Json(PaymentsResponse {
        success: true,
        payments,
    }))
}
