use std::collections::BTreeMap;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("gateway configuration error: {0}")]
    Configuration(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(&'static str),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Wire or protocol failure reported by a gateway. `sub_errors` carries the
/// gateway's own error codes when the response declared any.
#[derive(Debug, Clone, Error)]
#[error("{reason}")]
pub struct GatewayError {
    pub reason: String,
    pub sub_errors: BTreeMap<i32, String>,
}

impl GatewayError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            sub_errors: BTreeMap::new(),
        }
    }

    pub fn with_sub_errors(reason: impl Into<String>, sub_errors: BTreeMap<i32, String>) -> Self {
        Self {
            reason: reason.into(),
            sub_errors,
        }
    }
}
