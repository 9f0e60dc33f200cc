pub mod health;
pub mod oracle;
pub mod papers;
pub mod reviewers;
pub mod search;

use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::services::AppState;

/// Maximum concurrent requests (backpressure control)
const MAX_CONCURRENT_REQUESTS: usize = 100;

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 30;

pub fn create_router(state: AppState, metrics_router: Router) -> Router {
    let api_routes = Router::new()
        .route("/papers", post(papers::submit_paper))
        .route(
            "/papers/{id}",
            get(papers::get_paper).put(papers::update_paper),
        )
        .route("/papers/{id}/deactivate", post(papers::deactivate_paper))
        .route("/papers/{id}/embeddings", post(papers::store_embeddings))
        .route(
            "/papers/{id}/embeddings/generate",
            post(papers::generate_embeddings),
        )
        .route("/papers/by-author/{identity}", get(papers::papers_by_author))
        .route("/papers/by-doi", get(papers::paper_by_doi))
        .route("/papers/hash-used", get(papers::content_hash_used))
        .route("/papers/with-embeddings", get(papers::papers_with_embeddings))
        .route(
            "/papers/{id}/reviewer",
            post(reviewers::trigger_assignment).get(reviewers::assignment_status),
        )
        .route("/oracle/fulfillments", post(oracle::fulfill_randomness))
        .route("/search", get(search::search_papers))
        .route("/stats", get(health::stats))
        .with_state(state);

    let health_routes = Router::new().route("/health", get(health::health_check));

    Router::new()
        .merge(api_routes)
        .merge(health_routes)
        .merge(metrics_router)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
                .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS)),
        )
}
