use std::sync::Arc;

use anyhow::Context;
use paydrop_server::{AppState, PaymentGate, ServerConfig, router};
use paydrop_store::{FsFileStore, Store};
use paydrop_x402::facilitator::RemoteFacilitatorClient;
use paydrop_x402::requirements::RequirementBuilder;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env().context("loading configuration")?;
    tracing::info!(
        bind_addr = %config.bind_addr,
        facilitator = %config.facilitator_url,
        network = %config.asset.network,
        "Starting paydrop server"
    );

    let store = Store::open(&config.database_path)
        .with_context(|| format!("opening database at {}", config.database_path.display()))?;
    let files = FsFileStore::new(&config.files_root);

    let facilitator = RemoteFacilitatorClient::from_url(config.facilitator_url.clone())
        .context("building facilitator client")?;
    let builder = RequirementBuilder::builder().asset(config.asset.clone()).build();
    let gate = PaymentGate::new(
        facilitator,
        builder,
        store.clone(),
        config.public_base_url.clone(),
        config.token_ttl,
    );

    let app = router(AppState {
        gate: Arc::new(gate),
        store,
        files,
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    axum::serve(listener, app).await.context("serving")?;
    Ok(())
}
