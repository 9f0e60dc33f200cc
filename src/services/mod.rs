pub mod embedding;
pub mod indexer;

use std::sync::Arc;

use crate::embeddings::Embedder;
use crate::events::EventBus;
use crate::ledger::Ledger;
use crate::reviewer::AssignmentProtocol;
use crate::search::SearchIndex;
use crate::storage::ContentStore;

use embedding::EmbeddingService;
use indexer::Indexer;

// A container for all services to be injected into routes
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub protocol: Arc<AssignmentProtocol>,
    pub index: Arc<SearchIndex>,
    pub embedding_service: Arc<EmbeddingService>,
    pub indexer: Arc<Indexer>,
    pub events: EventBus,
}

impl AppState {
    pub fn new(
        ledger: Arc<Ledger>,
        protocol: Arc<AssignmentProtocol>,
        index: Arc<SearchIndex>,
        store: Arc<dyn ContentStore>,
        embedder: Arc<dyn Embedder>,
        events: EventBus,
    ) -> Self {
        let embedding_service = Arc::new(EmbeddingService::new(
            ledger.clone(),
            store.clone(),
            embedder,
        ));
        let indexer = Arc::new(Indexer::new(ledger.clone(), index.clone(), store));

        Self {
            ledger,
            protocol,
            index,
            embedding_service,
            indexer,
            events,
        }
    }
}
