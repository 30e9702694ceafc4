//! Payrail payment-intent gateway server.
//!
//! # Usage
//!
//! ```bash
//! # Run with default config (config.toml in current directory)
//! cargo run -p payrail-gateway --release
//!
//! # Run with custom config path
//! CONFIG=/path/to/config.toml cargo run -p payrail-gateway
//!
//! # Configure logging level
//! RUST_LOG=info cargo run -p payrail-gateway
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` — Path to TOML configuration file (default: `config.toml`)
//! - `HOST` — Override bind address (default: `0.0.0.0`)
//! - `PORT` — Override port (default: `8080`)
//! - `RUST_LOG` — Log level filter (default: `info`)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;
use payrail::chains::ChainRegistry;
use payrail::directory::{
    EventSink, MemoryProductCatalog, MemoryVendorDirectory, ProductCatalog, VendorDirectory,
};
use payrail::router::RouterEncoder;
use payrail_intents::{
    IntentService, MemoryIntentStore, MemorySubscriptionStore, SubscriptionService,
};
use payrail_webhooks::{MemoryWebhookStore, WebhookEngine};
use tower_http::cors;
use tracing_subscriber::EnvFilter;

use payrail_gateway::config::GatewayConfig;
use payrail_gateway::handlers::{Gateway, GatewayState, gateway_router};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("Gateway failed: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = GatewayConfig::load()?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        vendors = config.vendors.len(),
        products = config.products.len(),
        "Loaded configuration"
    );

    if config.vendors.is_empty() {
        tracing::warn!("No vendors configured — intent creation will return 404");
    }

    let registry = Arc::new(ChainRegistry::default());
    let encoder = RouterEncoder::new(Arc::clone(&registry));

    let vendors: Arc<dyn VendorDirectory> = Arc::new(MemoryVendorDirectory::from_records(
        config.vendors.clone(),
    ));
    let products: Arc<dyn ProductCatalog> =
        Arc::new(MemoryProductCatalog::from_records(config.products.clone()));

    let webhooks = Arc::new(WebhookEngine::new(
        MemoryWebhookStore::new(),
        Arc::clone(&vendors),
        config.webhooks,
    ));

    let intents = Arc::new(IntentService::new(
        MemoryIntentStore::new(),
        Arc::clone(&registry),
        Arc::clone(&vendors),
        Arc::clone(&products),
        Arc::clone(&webhooks) as Arc<dyn EventSink>,
    ));

    let subscriptions = SubscriptionService::new(
        MemorySubscriptionStore::new(),
        Arc::clone(&intents),
        Arc::clone(&vendors),
        products,
        Arc::clone(&webhooks) as Arc<dyn EventSink>,
    );

    let state: GatewayState = Arc::new(Gateway {
        registry,
        encoder,
        intents,
        subscriptions,
        webhooks: Arc::clone(&webhooks),
    });

    // Out-of-band retry path: sweep due webhook events and purge old ones.
    let sweep_interval = Duration::from_secs(config.sweep_interval_secs.max(1));
    drop(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = webhooks.process_pending().await {
                tracing::warn!(error = %err, "Webhook sweep failed");
            }
            if let Err(err) = webhooks.purge_old_events().await {
                tracing::warn!(error = %err, "Webhook purge failed");
            }
        }
    }));

    let app = gateway_router(state).layer(
        cors::CorsLayer::new()
            .allow_origin(cors::Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(cors::Any),
    );

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Gateway listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Gateway shut down gracefully");
    Ok(())
}

/// Waits for Ctrl-C or SIGTERM (Unix) to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => tracing::info!("Received Ctrl-C, shutting down..."),
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down..."),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for Ctrl-C");
        tracing::info!("Received Ctrl-C, shutting down...");
    }
}
