use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::form::{Address, FormData};
use crate::domain::payment::{Payment, PaymentStatus};
use crate::error::PaymentError;
use crate::gateways::{AdapterRegistry, PaymentContext};

/// Owning aggregate for the payments against one purchase. Decides how much
/// to move and on which payments; each payment executes one gateway call.
///
/// Callers running operations concurrently on the same purchase must
/// serialize access themselves; derived totals are read-then-acted-upon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Purchase {
    pub id: Uuid,
    pub total_minor: i64,
    pub currency: String,
    pub shipping_address: Option<Address>,
    pub payments: Vec<Payment>,
}

impl Purchase {
    pub fn new(total_minor: i64, currency: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            total_minor,
            currency: currency.to_string(),
            shipping_address: None,
            payments: Vec::new(),
        }
    }

    pub fn authorized_amount(&self) -> i64 {
        self.payments
            .iter()
            .filter(|p| p.status == PaymentStatus::Authorized)
            .map(|p| p.amount_minor)
            .sum()
    }

    pub fn captured_amount(&self) -> i64 {
        self.payments
            .iter()
            .filter(|p| matches!(p.status, PaymentStatus::Captured | PaymentStatus::Settled))
            .map(|p| p.amount_minor)
            .sum()
    }

    pub fn payment(&self, id: Uuid) -> Option<&Payment> {
        self.payments.iter().find(|p| p.id == id)
    }

    fn context(&self, payment: &Payment) -> PaymentContext {
        PaymentContext {
            payment_id: payment.id,
            purchase_id: self.id,
            transaction_id: payment.transaction_id.clone(),
            amount_minor: payment.amount_minor,
            currency: self.currency.clone(),
            shipping_address: self.shipping_address.clone(),
        }
    }

    /// Create and authorize one payment. Defaults to the uncovered remainder;
    /// amounts above it are tolerated.
    pub async fn authorize(
        &mut self,
        registry: &AdapterRegistry,
        method: &str,
        form: &FormData,
        amount_minor: Option<i64>,
    ) -> Result<Uuid, PaymentError> {
        let shortfall = self.total_minor - self.captured_amount() - self.authorized_amount();
        let amount = amount_minor.unwrap_or(shortfall);
        if amount <= 0 {
            return Err(PaymentError::InvalidAmount("authorization amount must be positive"));
        }

        let adapter = registry.resolve(method)?;
        self.payments.push(Payment::new(method, amount));
        let index = self.payments.len() - 1;
        let id = self.payments[index].id;

        let ctx = self.context(&self.payments[index]);
        self.payments[index]
            .authorize(adapter.as_ref(), &ctx, form)
            .await?;
        Ok(id)
    }

    /// Capture `amount`, consuming existing authorizations in creation order
    /// first, then direct-capturing the remainder on a fresh payment.
    pub async fn capture(
        &mut self,
        registry: &AdapterRegistry,
        method: &str,
        form: &FormData,
        amount_minor: Option<i64>,
    ) -> Result<Uuid, PaymentError> {
        let max = self.total_minor - self.captured_amount();
        let amount = amount_minor.unwrap_or(max);
        if amount > max {
            return Err(PaymentError::InvalidAmount("cannot capture more than the purchase total"));
        }
        if amount <= 0 {
            return Err(PaymentError::InvalidAmount("capture amount must be positive"));
        }

        let mut remaining = amount;
        for i in 0..self.payments.len() {
            if self.payments[i].status != PaymentStatus::Authorized {
                continue;
            }
            let take = remaining.min(self.payments[i].amount_minor);
            let adapter = registry.resolve(&self.payments[i].method)?;
            let ctx = self.context(&self.payments[i]);
            self.payments[i]
                .capture_authorized(adapter.as_ref(), &ctx, Some(take))
                .await?;

            if matches!(
                self.payments[i].status,
                PaymentStatus::Captured | PaymentStatus::Settled
            ) {
                remaining -= self.payments[i].amount_minor;
                if remaining <= 0 {
                    return Ok(self.payments[i].id);
                }
            }
        }

        let adapter = registry.resolve(method)?;
        self.payments.push(Payment::new(method, remaining));
        let index = self.payments.len() - 1;
        let id = self.payments[index].id;

        let ctx = self.context(&self.payments[index]);
        self.payments[index]
            .capture(adapter.as_ref(), &ctx, form)
            .await?;
        Ok(id)
    }

    /// Capture across existing authorizations only. Returns the affected
    /// payment ids.
    pub async fn capture_authorized(
        &mut self,
        registry: &AdapterRegistry,
        amount_minor: Option<i64>,
    ) -> Result<Vec<Uuid>, PaymentError> {
        let max = self.authorized_amount();
        let amount = match amount_minor {
            Some(a) if a > max => {
                return Err(PaymentError::InvalidAmount(
                    "cannot capture above the authorized amount",
                ))
            }
            Some(a) if a <= 0 => {
                return Err(PaymentError::InvalidAmount("capture amount must be positive"))
            }
            Some(a) => a,
            None => max,
        };

        let mut affected = Vec::new();
        if amount <= 0 {
            return Ok(affected);
        }

        let mut remaining = amount;
        for i in 0..self.payments.len() {
            if self.payments[i].status != PaymentStatus::Authorized {
                continue;
            }
            let take = remaining.min(self.payments[i].amount_minor);
            let adapter = registry.resolve(&self.payments[i].method)?;
            let ctx = self.context(&self.payments[i]);
            self.payments[i]
                .capture_authorized(adapter.as_ref(), &ctx, Some(take))
                .await?;

            if matches!(
                self.payments[i].status,
                PaymentStatus::Captured | PaymentStatus::Settled
            ) {
                remaining -= self.payments[i].amount_minor;
                affected.push(self.payments[i].id);
                if remaining <= 0 {
                    break;
                }
            }
        }
        Ok(affected)
    }

    /// Cancel every live payment: releases authorizations, refunds captures.
    /// A failure on one payment does not abort the sweep. Returns the ids of
    /// payments that did not cancel cleanly, for the caller to retry or
    /// escalate.
    pub async fn cancel(&mut self, registry: &AdapterRegistry) -> Vec<Uuid> {
        let mut failed = Vec::new();
        for i in 0..self.payments.len() {
            if !self.payments[i].succeeded() {
                continue;
            }
            let id = self.payments[i].id;
            let outcome = match registry.resolve(&self.payments[i].method) {
                Ok(adapter) => {
                    let ctx = self.context(&self.payments[i]);
                    self.payments[i].cancel(adapter.as_ref(), &ctx).await
                }
                Err(e) => Err(e),
            };
            match outcome {
                Ok(()) if !self.payments[i].succeeded() => {}
                Ok(()) => failed.push(id),
                Err(e) => {
                    tracing::warn!(payment_id = %id, error = %e, "cancel failed");
                    failed.push(id);
                }
            }
        }
        failed
    }

    /// Refund `amount` (default: everything captured), walking captures in
    /// creation order and reducing the outstanding request by each payment's
    /// actually-refunded portion.
    pub async fn refund(
        &mut self,
        registry: &AdapterRegistry,
        amount_minor: Option<i64>,
    ) -> Result<Vec<Uuid>, PaymentError> {
        let max = self.captured_amount();
        let amount = amount_minor.unwrap_or(max);
        if amount > max {
            return Err(PaymentError::InvalidAmount("cannot refund above the captured amount"));
        }
        if amount < 0 {
            return Err(PaymentError::InvalidAmount("cannot refund a negative amount"));
        }

        let mut affected = Vec::new();
        let mut remaining = amount;
        for i in 0..self.payments.len() {
            if remaining <= 0 {
                break;
            }
            if !matches!(
                self.payments[i].status,
                PaymentStatus::Captured | PaymentStatus::Settled
            ) {
                continue;
            }
            let before = self.payments[i].amount_minor;
            let take = remaining.min(before);
            let adapter = registry.resolve(&self.payments[i].method)?;
            let ctx = self.context(&self.payments[i]);
            self.payments[i]
                .refund(adapter.as_ref(), &ctx, take)
                .await?;

            remaining -= before - self.payments[i].amount_minor;
            affected.push(self.payments[i].id);
        }
        Ok(affected)
    }

    /// Authorize whatever the existing payments do not yet cover.
    pub async fn auto_authorize(
        &mut self,
        registry: &AdapterRegistry,
        method: &str,
        form: &FormData,
    ) -> Result<Option<Uuid>, PaymentError> {
        let shortfall = self.total_minor - self.captured_amount() - self.authorized_amount();
        if shortfall > 0 {
            Ok(Some(self.authorize(registry, method, form, Some(shortfall)).await?))
        } else {
            Ok(None)
        }
    }

    /// Reconcile captured money with the current total: refund the excess,
    /// capture the shortfall from authorizations, or direct-capture what
    /// authorizations cannot cover. Authorizations left over once the total
    /// is satisfied are released in full.
    pub async fn auto_capture(
        &mut self,
        registry: &AdapterRegistry,
        method: &str,
        form: &FormData,
    ) -> Result<Vec<Uuid>, PaymentError> {
        let captured = self.captured_amount();
        let authorized = self.authorized_amount();

        if self.total_minor <= captured {
            self.release_authorizations(registry).await;
            let excess = captured - self.total_minor;
            if excess > 0 {
                return self.refund(registry, Some(excess)).await;
            }
            return Ok(Vec::new());
        }

        if self.total_minor <= authorized {
            let affected = self
                .capture_authorized(registry, Some(self.total_minor - captured))
                .await?;
            self.release_authorizations(registry).await;
            return Ok(affected);
        }

        let mut affected = self.capture_authorized(registry, None).await?;
        let shortfall = self.total_minor - self.captured_amount();
        if shortfall > 0 {
            affected.push(self.capture(registry, method, form, Some(shortfall)).await?);
        }
        Ok(affected)
    }

    async fn release_authorizations(&mut self, registry: &AdapterRegistry) -> Vec<Uuid> {
        let mut failed = Vec::new();
        for i in 0..self.payments.len() {
            if self.payments[i].status != PaymentStatus::Authorized {
                continue;
            }
            let id = self.payments[i].id;
            let outcome = match registry.resolve(&self.payments[i].method) {
                Ok(adapter) => {
                    let ctx = self.context(&self.payments[i]);
                    self.payments[i].cancel(adapter.as_ref(), &ctx).await
                }
                Err(e) => Err(e),
            };
            if let Err(e) = outcome {
                tracing::warn!(payment_id = %id, error = %e, "release failed");
                failed.push(id);
            }
        }
        failed
    }
}
