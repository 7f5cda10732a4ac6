use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::form::FormData;
use crate::error::PaymentError;
use crate::gateways::{AdapterResult, GatewayAdapter, PaymentContext};

// Lifecycle: New -> Authorized -> Captured -> Settled, with Refused/Error on
// the way in and Cancelled/Expired/Refunded/ChargedBack on the way out.
// Terminal states accept no further adapter calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    #[serde(rename = "")]
    New,
    #[serde(rename = "A")]
    Authorized,
    #[serde(rename = "R")]
    Refused,
    #[serde(rename = "E")]
    Error,
    #[serde(rename = "C")]
    Cancelled,
    #[serde(rename = "EX")]
    Expired,
    #[serde(rename = "CD")]
    Captured,
    #[serde(rename = "S")]
    Settled,
    #[serde(rename = "RF")]
    Refunded,
    #[serde(rename = "CB")]
    ChargedBack,
}

impl PaymentStatus {
    pub fn code(&self) -> &'static str {
        match self {
            PaymentStatus::New => "",
            PaymentStatus::Authorized => "A",
            PaymentStatus::Refused => "R",
            PaymentStatus::Error => "E",
            PaymentStatus::Cancelled => "C",
            PaymentStatus::Expired => "EX",
            PaymentStatus::Captured => "CD",
            PaymentStatus::Settled => "S",
            PaymentStatus::Refunded => "RF",
            PaymentStatus::ChargedBack => "CB",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PaymentStatus::New => "New",
            PaymentStatus::Authorized => "Authorized",
            PaymentStatus::Refused => "Refused",
            PaymentStatus::Error => "Error",
            PaymentStatus::Cancelled => "Cancelled",
            PaymentStatus::Expired => "Authorization expired",
            PaymentStatus::Captured => "Captured",
            PaymentStatus::Settled => "Settled",
            PaymentStatus::Refunded => "Refunded",
            PaymentStatus::ChargedBack => "Charged back",
        }
    }

    pub fn from_code(code: &str) -> Option<PaymentStatus> {
        match code {
            "" => Some(PaymentStatus::New),
            "A" => Some(PaymentStatus::Authorized),
            "R" => Some(PaymentStatus::Refused),
            "E" => Some(PaymentStatus::Error),
            "C" => Some(PaymentStatus::Cancelled),
            "EX" => Some(PaymentStatus::Expired),
            "CD" => Some(PaymentStatus::Captured),
            "S" => Some(PaymentStatus::Settled),
            "RF" => Some(PaymentStatus::Refunded),
            "CB" => Some(PaymentStatus::ChargedBack),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Refused
                | PaymentStatus::Cancelled
                | PaymentStatus::Expired
                | PaymentStatus::Refunded
                | PaymentStatus::ChargedBack
        )
    }
}

/// Append-only audit entry recording one observed field change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentNote {
    pub at: DateTime<Utc>,
    pub note: String,
}

/// One attempt to move money on a purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub method: String,
    pub amount_minor: i64,
    pub status: PaymentStatus,
    pub details: String,
    pub transaction_id: Option<String>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub notes: Vec<PaymentNote>,
}

impl Payment {
    pub fn new(method: &str, amount_minor: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            method: method.to_uppercase(),
            amount_minor,
            status: PaymentStatus::New,
            details: String::new(),
            transaction_id: None,
            reason: String::new(),
            created_at: Utc::now(),
            notes: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(
            self.status,
            PaymentStatus::Authorized | PaymentStatus::Captured | PaymentStatus::Settled
        )
    }

    /// Diff-and-apply an adapter result: fields absent from the result stay
    /// untouched, each changed field gets one audit note.
    pub fn apply(&mut self, result: AdapterResult) {
        let now = Utc::now();

        if let Some(status) = result.status {
            if status != self.status {
                self.note(now, format!("status: {} => {}", self.status.name(), status.name()));
                self.status = status;
            }
        }
        if let Some(amount) = result.amount_minor {
            if amount != self.amount_minor {
                self.note(now, format!("amount_minor: {} => {}", self.amount_minor, amount));
                self.amount_minor = amount;
            }
        }
        if let Some(reason) = result.reason {
            if reason != self.reason {
                self.note(now, format!("reason: {} => {}", self.reason, reason));
                self.reason = reason;
            }
        }
        if let Some(transaction_id) = result.transaction_id {
            if self.transaction_id.as_deref() != Some(transaction_id.as_str()) {
                self.note(
                    now,
                    format!(
                        "transaction_id: {} => {}",
                        self.transaction_id.as_deref().unwrap_or(""),
                        transaction_id
                    ),
                );
                self.transaction_id = Some(transaction_id);
            }
        }
    }

    fn note(&mut self, at: DateTime<Utc>, note: String) {
        self.notes.push(PaymentNote { at, note });
    }

    pub async fn authorize(
        &mut self,
        adapter: &dyn GatewayAdapter,
        ctx: &PaymentContext,
        form: &FormData,
    ) -> Result<(), PaymentError> {
        if self.amount_minor < 0 {
            return Err(PaymentError::InvalidAmount("cannot authorize a negative amount"));
        }
        if self.status != PaymentStatus::New || self.amount_minor == 0 {
            return Ok(());
        }
        let result = adapter.authorize(ctx, form).await?;
        self.apply(result);
        Ok(())
    }

    pub async fn capture(
        &mut self,
        adapter: &dyn GatewayAdapter,
        ctx: &PaymentContext,
        form: &FormData,
    ) -> Result<(), PaymentError> {
        if self.amount_minor <= 0 {
            return Err(PaymentError::InvalidAmount("capture requires a positive amount"));
        }
        if self.status != PaymentStatus::New {
            return Ok(());
        }
        let result = adapter.capture(ctx, form).await?;
        self.apply(result);
        Ok(())
    }

    pub async fn capture_authorized(
        &mut self,
        adapter: &dyn GatewayAdapter,
        ctx: &PaymentContext,
        amount_minor: Option<i64>,
    ) -> Result<(), PaymentError> {
        if self.status != PaymentStatus::Authorized {
            return Ok(());
        }
        let amount = amount_minor.unwrap_or(self.amount_minor);
        if amount > self.amount_minor {
            return Err(PaymentError::InvalidAmount(
                "cannot capture above the authorized amount",
            ));
        }
        let result = adapter.capture_authorized(ctx, amount).await?;
        self.apply(result);
        Ok(())
    }

    /// Release an authorization, or refund a capture at full amount.
    pub async fn cancel(
        &mut self,
        adapter: &dyn GatewayAdapter,
        ctx: &PaymentContext,
    ) -> Result<(), PaymentError> {
        match self.status {
            PaymentStatus::Authorized => {
                let result = adapter.release_authorized(ctx).await?;
                self.apply(result);
            }
            PaymentStatus::Captured | PaymentStatus::Settled => {
                let result = adapter.refund(ctx, self.amount_minor).await?;
                self.apply(result);
            }
            _ => {}
        }
        Ok(())
    }

    pub async fn refund(
        &mut self,
        adapter: &dyn GatewayAdapter,
        ctx: &PaymentContext,
        amount_minor: i64,
    ) -> Result<(), PaymentError> {
        if !matches!(self.status, PaymentStatus::Captured | PaymentStatus::Settled)
            || amount_minor <= 0
        {
            return Ok(());
        }
        if amount_minor > self.amount_minor {
            return Err(PaymentError::InvalidAmount("cannot refund above the captured amount"));
        }
        let result = adapter.refund(ctx, amount_minor).await?;
        self.apply(result);
        Ok(())
    }

    /// Reconcile with the gateway's authoritative view. No-op in terminal
    /// states.
    pub async fn update_status(
        &mut self,
        adapter: &dyn GatewayAdapter,
        ctx: &PaymentContext,
    ) -> Result<(), PaymentError> {
        if self.status.is_terminal() {
            return Ok(());
        }
        let result = adapter.get_payment_status(ctx).await?;
        self.apply(result);
        Ok(())
    }
}
