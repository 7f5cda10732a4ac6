use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::domain::purchase::Purchase;
use crate::gateways::AdapterResult;

/// In-memory purchase store. Handlers hold the lock for the duration of an
/// aggregate operation, which serializes concurrent operations on the same
/// purchase.
#[derive(Clone, Default)]
pub struct PurchaseStore {
    inner: Arc<Mutex<HashMap<Uuid, Purchase>>>,
}

impl PurchaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, purchase: Purchase) {
        self.inner.lock().await.insert(purchase.id, purchase);
    }

    pub async fn get(&self, id: Uuid) -> Option<Purchase> {
        self.inner.lock().await.get(&id).cloned()
    }

    pub async fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Purchase>> {
        self.inner.lock().await
    }

    /// Apply a pushed gateway result to a payment, wherever it lives.
    /// Returns false when no payment matches.
    pub async fn apply_to_payment(&self, payment_id: Uuid, result: AdapterResult) -> bool {
        let mut purchases = self.inner.lock().await;
        for purchase in purchases.values_mut() {
            if let Some(payment) = purchase.payments.iter_mut().find(|p| p.id == payment_id) {
                payment.apply(result);
                return true;
            }
        }
        false
    }
}
