use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::form::{Address, FormData};
use crate::domain::payment::PaymentStatus;
use crate::error::{GatewayError, PaymentError};

pub mod autosuccess;
pub mod worldpay;

/// Snapshot of the payment an adapter call acts on.
#[derive(Debug, Clone)]
pub struct PaymentContext {
    pub payment_id: Uuid,
    pub purchase_id: Uuid,
    pub transaction_id: Option<String>,
    pub amount_minor: i64,
    pub currency: String,
    pub shipping_address: Option<Address>,
}

/// Normalized gateway outcome. Absent fields leave the payment untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdapterResult {
    pub status: Option<PaymentStatus>,
    pub amount_minor: Option<i64>,
    pub reason: Option<String>,
    pub transaction_id: Option<String>,
}

/// Contract every gateway integration satisfies. Adapters never retry;
/// retry policy belongs to the caller.
#[async_trait::async_trait]
pub trait GatewayAdapter: Send + Sync {
    fn key(&self) -> &'static str;

    /// Gateways without authorize-without-capture support fall through to a
    /// direct sale.
    async fn authorize(
        &self,
        ctx: &PaymentContext,
        form: &FormData,
    ) -> Result<AdapterResult, GatewayError> {
        self.capture(ctx, form).await
    }

    async fn capture(
        &self,
        ctx: &PaymentContext,
        form: &FormData,
    ) -> Result<AdapterResult, GatewayError>;

    async fn capture_authorized(
        &self,
        ctx: &PaymentContext,
        amount_minor: i64,
    ) -> Result<AdapterResult, GatewayError>;

    async fn release_authorized(&self, ctx: &PaymentContext)
        -> Result<AdapterResult, GatewayError>;

    /// Returns the remaining captured amount, and a terminal status once it
    /// reaches zero.
    async fn refund(
        &self,
        ctx: &PaymentContext,
        amount_minor: i64,
    ) -> Result<AdapterResult, GatewayError>;

    /// Gateways without a polling mechanism return an empty result.
    async fn get_payment_status(
        &self,
        _ctx: &PaymentContext,
    ) -> Result<AdapterResult, GatewayError> {
        Ok(AdapterResult::default())
    }
}

/// Maps an uppercase gateway key to its adapter. Filled by explicit
/// `register` calls at startup.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn GatewayAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: Arc<dyn GatewayAdapter>) {
        self.adapters.insert(adapter.key().to_uppercase(), adapter);
    }

    pub fn resolve(&self, key: &str) -> Result<Arc<dyn GatewayAdapter>, PaymentError> {
        self.adapters
            .get(&key.to_uppercase())
            .cloned()
            .ok_or_else(|| {
                PaymentError::Configuration(format!("no gateway registered under key {key}"))
            })
    }

    pub fn keys(&self) -> Vec<&str> {
        self.adapters.keys().map(String::as_str).collect()
    }
}
