use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::card::CardType;
use crate::domain::form::{Address, FormData};
use crate::domain::purchase::Purchase;
use crate::error::PaymentError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorPayload,
}

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

fn error_response(err: PaymentError) -> Response {
    let (status, code, details) = match &err {
        PaymentError::Configuration(_) => (StatusCode::SERVICE_UNAVAILABLE, "GATEWAY_NOT_CONFIGURED", None),
        PaymentError::InvalidAmount(_) => (StatusCode::BAD_REQUEST, "INVALID_AMOUNT", None),
        PaymentError::Gateway(gw) => (
            StatusCode::BAD_GATEWAY,
            "GATEWAY_ERROR",
            (!gw.sub_errors.is_empty()).then(|| format!("{:?}", gw.sub_errors)),
        ),
    };
    let body = ErrorEnvelope {
        error: ErrorPayload {
            code: code.to_string(),
            message: err.to_string(),
            details,
        },
    };
    (status, Json(body)).into_response()
}

fn not_found() -> Response {
    let body = ErrorEnvelope {
        error: ErrorPayload {
            code: "PURCHASE_NOT_FOUND".to_string(),
            message: "no purchase with that id".to_string(),
            details: None,
        },
    };
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[derive(Debug, Deserialize)]
pub struct CreatePurchaseRequest {
    pub total_minor: i64,
    pub currency: String,
    pub shipping_address: Option<Address>,
}

#[derive(Debug, Serialize)]
pub struct CreatePurchaseResponse {
    pub purchase_id: Uuid,
}

pub async fn create_purchase(
    State(state): State<AppState>,
    Json(req): Json<CreatePurchaseRequest>,
) -> impl IntoResponse {
    let mut purchase = Purchase::new(req.total_minor, &req.currency);
    purchase.shipping_address = req.shipping_address;
    let purchase_id = purchase.id;
    state.store.insert(purchase).await;
    (StatusCode::CREATED, Json(CreatePurchaseResponse { purchase_id }))
}

pub async fn get_purchase(
    State(state): State<AppState>,
    Path(purchase_id): Path<Uuid>,
) -> Response {
    match state.store.get(purchase_id).await {
        Some(purchase) => (StatusCode::OK, Json(purchase)).into_response(),
        None => not_found(),
    }
}

#[derive(Debug, Deserialize)]
pub struct PaymentOpRequest {
    pub method: Option<String>,
    pub form: Option<FormData>,
    pub amount_minor: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct OperationResponse {
    pub payments: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub failed: Vec<Uuid>,
}

fn missing_field(field: &str) -> Response {
    let body = ErrorEnvelope {
        error: ErrorPayload {
            code: "MISSING_FIELD".to_string(),
            message: format!("{field} is required for this operation"),
            details: None,
        },
    };
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

pub async fn authorize(
    State(state): State<AppState>,
    Path(purchase_id): Path<Uuid>,
    Json(req): Json<PaymentOpRequest>,
) -> Response {
    let (Some(method), Some(form)) = (req.method, req.form) else {
        return missing_field("method/form");
    };
    let mut purchases = state.store.lock().await;
    let Some(purchase) = purchases.get_mut(&purchase_id) else {
        return not_found();
    };
    match purchase
        .authorize(&state.registry, &method, &form, req.amount_minor)
        .await
    {
        Ok(id) => (StatusCode::OK, Json(OperationResponse { payments: vec![id] })).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn capture(
    State(state): State<AppState>,
    Path(purchase_id): Path<Uuid>,
    Json(req): Json<PaymentOpRequest>,
) -> Response {
    let (Some(method), Some(form)) = (req.method, req.form) else {
        return missing_field("method/form");
    };
    let mut purchases = state.store.lock().await;
    let Some(purchase) = purchases.get_mut(&purchase_id) else {
        return not_found();
    };
    match purchase
        .capture(&state.registry, &method, &form, req.amount_minor)
        .await
    {
        Ok(id) => (StatusCode::OK, Json(OperationResponse { payments: vec![id] })).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn refund(
    State(state): State<AppState>,
    Path(purchase_id): Path<Uuid>,
    Json(req): Json<PaymentOpRequest>,
) -> Response {
    let mut purchases = state.store.lock().await;
    let Some(purchase) = purchases.get_mut(&purchase_id) else {
        return not_found();
    };
    match purchase.refund(&state.registry, req.amount_minor).await {
        Ok(ids) => (StatusCode::OK, Json(OperationResponse { payments: ids })).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn cancel(
    State(state): State<AppState>,
    Path(purchase_id): Path<Uuid>,
) -> Response {
    let mut purchases = state.store.lock().await;
    let Some(purchase) = purchases.get_mut(&purchase_id) else {
        return not_found();
    };
    let failed = purchase.cancel(&state.registry).await;
    (StatusCode::OK, Json(CancelResponse { failed })).into_response()
}

#[derive(Debug, Serialize)]
pub struct CardDetailResponse {
    pub card_type: Option<CardType>,
    pub display_cc: String,
    pub expiry: String,
    pub name: String,
}

// Display-safe view only; the full number never leaves the vault here.
pub async fn get_card_detail(
    State(state): State<AppState>,
    Path((purchase_id, payment_id)): Path<(Uuid, Uuid)>,
) -> Response {
    let Some(purchase) = state.store.get(purchase_id).await else {
        return not_found();
    };
    if purchase.payment(payment_id).is_none() {
        return not_found();
    }
    match state.vault.detail(payment_id) {
        Some(detail) => (
            StatusCode::OK,
            Json(CardDetailResponse {
                expiry: detail.expiration(),
                card_type: detail.card_type,
                display_cc: detail.display_cc,
                name: detail.name,
            }),
        )
            .into_response(),
        None => not_found(),
    }
}

pub async fn auto_capture(
    State(state): State<AppState>,
    Path(purchase_id): Path<Uuid>,
    Json(req): Json<PaymentOpRequest>,
) -> Response {
    let (Some(method), Some(form)) = (req.method, req.form) else {
        return missing_field("method/form");
    };
    let mut purchases = state.store.lock().await;
    let Some(purchase) = purchases.get_mut(&purchase_id) else {
        return not_found();
    };
    match purchase.auto_capture(&state.registry, &method, &form).await {
        Ok(ids) => (StatusCode::OK, Json(OperationResponse { payments: ids })).into_response(),
        Err(e) => error_response(e),
    }
}
