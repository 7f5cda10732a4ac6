#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use payments_core::domain::form::FormData;
use payments_core::domain::payment::{Payment, PaymentStatus};
use payments_core::error::GatewayError;
use payments_core::gateways::{AdapterRegistry, AdapterResult, GatewayAdapter, PaymentContext};
use payments_core::vault::CardVault;
use uuid::Uuid;

pub fn form(card_no: &str, card_type: &str) -> FormData {
    FormData {
        name: "John Smith".to_string(),
        address: "Baker st, 221b".to_string(),
        city: "London".to_string(),
        zip: "NW1".to_string(),
        country: "GB".to_string(),
        phone: "7935-8866".to_string(),
        email: "john@example.com".to_string(),
        card_no: card_no.to_string(),
        card_type: card_type.to_string(),
        expiry: NaiveDate::from_ymd_opt(2030, 12, 1).unwrap(),
        cvc: "123".to_string(),
        start_date: None,
        issue_num: None,
        extras: serde_json::Value::Null,
    }
}

pub fn visa_form() -> FormData {
    form("4444333322221111", "VISA")
}

pub fn ctx_for(payment: &Payment) -> PaymentContext {
    PaymentContext {
        payment_id: payment.id,
        purchase_id: Uuid::new_v4(),
        transaction_id: payment.transaction_id.clone(),
        amount_minor: payment.amount_minor,
        currency: "GBP".to_string(),
        shipping_address: None,
    }
}

pub fn registry_with(adapters: Vec<Arc<dyn GatewayAdapter>>) -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    for adapter in adapters {
        registry.register(adapter);
    }
    registry
}

pub fn test_vault(store_card_numbers: bool, cache_ttl_secs: i64) -> Arc<CardVault> {
    Arc::new(
        CardVault::new(b"0123456789abcdef0123456789abcdef", store_card_numbers, cache_ttl_secs)
            .unwrap(),
    )
}

/// Scripted gateway for driving the state machine without wire calls.
pub struct TestGateway {
    pub key: &'static str,
    pub behavior: &'static str,
}

impl TestGateway {
    pub fn approving(key: &'static str) -> Self {
        Self {
            key,
            behavior: "APPROVE",
        }
    }
}

#[async_trait::async_trait]
impl GatewayAdapter for TestGateway {
    fn key(&self) -> &'static str {
        self.key
    }

    async fn authorize(
        &self,
        ctx: &PaymentContext,
        _form: &FormData,
    ) -> Result<AdapterResult, GatewayError> {
        match self.behavior {
            "REFUSE" => Ok(AdapterResult {
                status: Some(PaymentStatus::Refused),
                amount_minor: Some(ctx.amount_minor),
                reason: Some("insufficient funds".to_string()),
                ..Default::default()
            }),
            "WIRE_ERROR" => Err(GatewayError::new("connection reset")),
            _ => Ok(AdapterResult {
                status: Some(PaymentStatus::Authorized),
                amount_minor: Some(ctx.amount_minor),
                transaction_id: Some(format!("tx_{}", ctx.payment_id)),
                ..Default::default()
            }),
        }
    }

    async fn capture(
        &self,
        ctx: &PaymentContext,
        _form: &FormData,
    ) -> Result<AdapterResult, GatewayError> {
        match self.behavior {
            "REFUSE" => Ok(AdapterResult {
                status: Some(PaymentStatus::Refused),
                amount_minor: Some(ctx.amount_minor),
                reason: Some("insufficient funds".to_string()),
                ..Default::default()
            }),
            "WIRE_ERROR" => Err(GatewayError::new("connection reset")),
            _ => Ok(AdapterResult {
                status: Some(PaymentStatus::Captured),
                amount_minor: Some(ctx.amount_minor),
                transaction_id: Some(format!("tx_{}", ctx.payment_id)),
                ..Default::default()
            }),
        }
    }

    async fn capture_authorized(
        &self,
        _ctx: &PaymentContext,
        amount_minor: i64,
    ) -> Result<AdapterResult, GatewayError> {
        match self.behavior {
            "WIRE_ERROR" | "CAPTURE_FAILS" => Err(GatewayError::new("connection reset")),
            _ => Ok(AdapterResult {
                status: Some(PaymentStatus::Captured),
                amount_minor: Some(amount_minor),
                ..Default::default()
            }),
        }
    }

    async fn release_authorized(
        &self,
        _ctx: &PaymentContext,
    ) -> Result<AdapterResult, GatewayError> {
        match self.behavior {
            "WIRE_ERROR" | "RELEASE_FAILS" => Err(GatewayError::new("release rejected")),
            _ => Ok(AdapterResult {
                status: Some(PaymentStatus::Cancelled),
                ..Default::default()
            }),
        }
    }

    async fn refund(
        &self,
        ctx: &PaymentContext,
        amount_minor: i64,
    ) -> Result<AdapterResult, GatewayError> {
        match self.behavior {
            "WIRE_ERROR" | "REFUND_FAILS" => Err(GatewayError::new("refund rejected")),
            _ => {
                let remaining = ctx.amount_minor - amount_minor;
                Ok(AdapterResult {
                    amount_minor: Some(remaining),
                    status: (remaining <= 0).then_some(PaymentStatus::Refunded),
                    ..Default::default()
                })
            }
        }
    }
}
