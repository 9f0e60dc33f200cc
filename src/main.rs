mod config;
mod embeddings;
mod errors;
mod events;
mod ledger;
mod metrics;
mod reviewer;
mod routes;
mod search;
mod services;
mod storage;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::embeddings::{CloudEmbedder, Embedder, MockEmbedder};
use crate::events::EventBus;
use crate::ledger::{AccessPolicy, Identity, Ledger};
use crate::reviewer::{
    spawn_local_oracle_driver, AssignmentProtocol, ChannelOracle, StaticReviewerPool,
};
use crate::search::SearchIndex;
use crate::storage::{ContentStore, InMemoryContentStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration
    dotenvy::dotenv().ok();
    let config = config::AppConfig::build().expect("Failed to load configuration");

    // 2. Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.server.rust_log))
        .init();

    tracing::info!("Starting paperchain-rs...");

    // 3. Core state: event bus, access policy, ledger
    let events = EventBus::new();
    let policy = AccessPolicy::new(Identity::new(config.registry.admin_identity.clone()));
    let ledger = Arc::new(Ledger::new(policy.clone(), events.clone()));

    // 4. Collaborators: content store and embedder
    let store: Arc<dyn ContentStore> = Arc::new(InMemoryContentStore::new());
    let embedder: Arc<dyn Embedder> = if config.embeddings.model_api_key == "mock" {
        Arc::new(MockEmbedder::new(config.embeddings.embedding_dim))
    } else {
        Arc::new(CloudEmbedder::new(config.embeddings.clone())?)
    };

    // 5. Reviewer assignment protocol with the local oracle driver
    let pool = Arc::new(StaticReviewerPool::new(
        config
            .reviewers
            .pool
            .iter()
            .cloned()
            .map(Identity::new)
            .collect(),
    ));
    if config.reviewers.pool.is_empty() {
        tracing::warn!("Reviewer pool is empty; assignment fulfillments will fail");
    }
    let (oracle, oracle_rx) = ChannelOracle::new();
    let protocol = Arc::new(AssignmentProtocol::new(
        ledger.clone(),
        policy,
        Arc::new(oracle),
        pool,
    ));
    spawn_local_oracle_driver(oracle_rx, protocol.clone());

    // 6. Search index and event-driven indexer
    let index = Arc::new(SearchIndex::new(embedder.clone()));
    let state = services::AppState::new(
        ledger,
        protocol,
        index,
        store,
        embedder,
        events.clone(),
    );
    state.indexer.clone().spawn(events.subscribe());

    // 7. Router and server
    let metrics_router = metrics::setup_metrics()?;
    let app = routes::create_router(state, metrics_router);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
