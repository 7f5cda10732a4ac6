use std::collections::HashMap;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::gateways::worldpay;
use crate::gateways::AdapterResult;
use crate::AppState;

/// Gateway-pushed status callback. Set this URL up in the merchant channel.
/// Malformed or unknown payloads are acknowledged without mutating anything;
/// in live mode the caller's address must be allowlisted.
pub async fn worldpay_status_update(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if state.config.live {
        let ip = addr.ip().to_string();
        if !state.config.worldpay_callback_allow.iter().any(|allowed| *allowed == ip) {
            return StatusCode::FORBIDDEN.into_response();
        }
    }

    let Some(payment_id) = params
        .get("PaymentId")
        .and_then(|v| v.parse::<Uuid>().ok())
    else {
        return ack();
    };

    let result = AdapterResult {
        status: params
            .get("PaymentStatus")
            .and_then(|code| worldpay::map_status_code(code)),
        amount_minor: params
            .get("PaymentAmount")
            .and_then(|v| v.parse::<i64>().ok()),
        ..Default::default()
    };

    if !state.store.apply_to_payment(payment_id, result).await {
        tracing::debug!(%payment_id, "status update for unknown payment");
    }
    ack()
}

fn ack() -> Response {
    (StatusCode::OK, "[OK]").into_response()
}
