use std::sync::Arc;

use crate::domain::form::FormData;
use crate::domain::payment::PaymentStatus;
use crate::error::GatewayError;
use crate::gateways::{AdapterResult, GatewayAdapter, PaymentContext};
use crate::vault::CardVault;

/// Test gateway that approves everything at the requested amount.
pub struct AutosuccessAdapter {
    pub vault: Arc<CardVault>,
}

#[async_trait::async_trait]
impl GatewayAdapter for AutosuccessAdapter {
    fn key(&self) -> &'static str {
        "AUTOSUCCESS"
    }

    async fn authorize(
        &self,
        ctx: &PaymentContext,
        form: &FormData,
    ) -> Result<AdapterResult, GatewayError> {
        tracing::debug!(payment_id = %ctx.payment_id, "authorize request");

        self.vault
            .store(ctx.payment_id, form)
            .map_err(|e| GatewayError::new(format!("card vault rejected detail: {e}")))?;

        Ok(AdapterResult {
            status: Some(PaymentStatus::Authorized),
            amount_minor: Some(ctx.amount_minor),
            ..Default::default()
        })
    }

    async fn capture(
        &self,
        ctx: &PaymentContext,
        form: &FormData,
    ) -> Result<AdapterResult, GatewayError> {
        tracing::debug!(payment_id = %ctx.payment_id, "capture request");

        self.vault
            .store(ctx.payment_id, form)
            .map_err(|e| GatewayError::new(format!("card vault rejected detail: {e}")))?;

        Ok(AdapterResult {
            status: Some(PaymentStatus::Captured),
            amount_minor: Some(ctx.amount_minor),
            ..Default::default()
        })
    }

    async fn capture_authorized(
        &self,
        ctx: &PaymentContext,
        amount_minor: i64,
    ) -> Result<AdapterResult, GatewayError> {
        tracing::debug!(payment_id = %ctx.payment_id, amount_minor, "capture authorized request");

        Ok(AdapterResult {
            status: Some(PaymentStatus::Captured),
            amount_minor: Some(amount_minor),
            ..Default::default()
        })
    }

    async fn release_authorized(
        &self,
        ctx: &PaymentContext,
    ) -> Result<AdapterResult, GatewayError> {
        tracing::debug!(payment_id = %ctx.payment_id, "release authorized request");

        Ok(AdapterResult {
            status: Some(PaymentStatus::Cancelled),
            ..Default::default()
        })
    }

    async fn refund(
        &self,
        ctx: &PaymentContext,
        amount_minor: i64,
    ) -> Result<AdapterResult, GatewayError> {
        debug_assert!(amount_minor <= ctx.amount_minor);
        tracing::debug!(payment_id = %ctx.payment_id, amount_minor, "refund request");

        let remaining = ctx.amount_minor - amount_minor;
        Ok(AdapterResult {
            amount_minor: Some(remaining),
            status: (remaining <= 0).then_some(PaymentStatus::Refunded),
            ..Default::default()
        })
    }
}
