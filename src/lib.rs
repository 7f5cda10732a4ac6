pub mod card;
pub mod config;
pub mod domain {
    pub mod form;
    pub mod payment;
    pub mod purchase;
}
pub mod error;
pub mod gateways;
pub mod http {
    pub mod handlers {
        pub mod purchases;
        pub mod status_update;
    }
}
pub mod store;
pub mod vault;

use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::AppConfig>,
    pub registry: Arc<gateways::AdapterRegistry>,
    pub store: store::PurchaseStore,
    pub vault: Arc<vault::CardVault>,
}
