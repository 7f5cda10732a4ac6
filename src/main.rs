use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use payments_core::config::AppConfig;
use payments_core::gateways::autosuccess::AutosuccessAdapter;
use payments_core::gateways::worldpay::WorldpayAdapter;
use payments_core::gateways::AdapterRegistry;
use payments_core::http::handlers::{purchases, status_update};
use payments_core::store::PurchaseStore;
use payments_core::vault::CardVault;
use payments_core::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();

    let vault = Arc::new(CardVault::new(
        cfg.vault_key.as_bytes(),
        cfg.store_card_numbers,
        cfg.card_cache_ttl_secs,
    )?);

    let mut registry = AdapterRegistry::new();
    registry.register(Arc::new(AutosuccessAdapter { vault: vault.clone() }));
    if cfg.worldpay_enabled {
        let worldpay =
            WorldpayAdapter::from_settings(&cfg.worldpay, cfg.live, vault.clone(), reqwest::Client::new())?;
        registry.register(Arc::new(worldpay));
    }
    tracing::info!(gateways = ?registry.keys(), "registered gateways");

    let bind_addr = cfg.bind_addr.clone();
    let state = AppState {
        config: Arc::new(cfg),
        registry: Arc::new(registry),
        store: PurchaseStore::new(),
        vault,
    };

    let app = Router::new()
        .route("/health", get(purchases::health))
        .route("/purchases", post(purchases::create_purchase))
        .route("/purchases/:purchase_id", get(purchases::get_purchase))
        .route("/purchases/:purchase_id/authorize", post(purchases::authorize))
        .route("/purchases/:purchase_id/capture", post(purchases::capture))
        .route("/purchases/:purchase_id/refund", post(purchases::refund))
        .route("/purchases/:purchase_id/cancel", post(purchases::cancel))
        .route("/purchases/:purchase_id/auto-capture", post(purchases::auto_capture))
        .route(
            "/purchases/:purchase_id/payments/:payment_id/card",
            get(purchases::get_card_detail),
        )
        .route("/worldpay/status-update", get(status_update::worldpay_status_update))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("listening on {}", bind_addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
