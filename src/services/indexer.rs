use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};

use crate::errors::Result;
use crate::events::DomainEvent;
use crate::ledger::{Ledger, PaperId};
use crate::search::{IndexEntry, SearchIndex};
use crate::storage::{self, ContentStore};

/// Longest abstract prefix carried into the index.
const SNIPPET_LEN: usize = 200;

fn snippet(text: &str) -> String {
    if text.len() <= SNIPPET_LEN {
        return text.to_string();
    }
    let mut end = SNIPPET_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

/// Keeps the search index in step with the ledger by consuming domain events:
/// `EmbeddingsGenerated` ingests, `PaperUpdated` and `PaperDeactivated` evict.
/// A lagged subscription rebuilds the whole index from the ledger.
pub struct Indexer {
    ledger: Arc<Ledger>,
    index: Arc<SearchIndex>,
    store: Arc<dyn ContentStore>,
}

impl Indexer {
    pub fn new(ledger: Arc<Ledger>, index: Arc<SearchIndex>, store: Arc<dyn ContentStore>) -> Self {
        Self {
            ledger,
            index,
            store,
        }
    }

    pub async fn apply(&self, event: &DomainEvent) -> Result<()> {
        match event {
            DomainEvent::EmbeddingsGenerated {
                id, embedding_ref, ..
            } => self.ingest(*id, embedding_ref).await,
            DomainEvent::PaperUpdated { id, .. } | DomainEvent::PaperDeactivated { id } => {
                self.index.remove(*id);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn ingest(&self, id: PaperId, embedding_ref: &str) -> Result<()> {
        let record = self.ledger.get(id)?;
        // A stale event can refer to a paper that has since been updated or
        // deactivated; the ledger is authoritative.
        if !record.is_active || !record.embeddings_generated || record.embedding_ref != embedding_ref
        {
            tracing::debug!(paper_id = id, "Skipping stale ingestion event");
            return Ok(());
        }

        let vector = storage::get_embedding(self.store.as_ref(), embedding_ref).await?;
        self.index.ingest(IndexEntry {
            id,
            vector,
            title: record.title,
            abstract_snippet: snippet(&record.abstract_text),
        });
        Ok(())
    }

    /// Replays the current active/embedded set from the ledger.
    pub async fn rebuild(&self) -> Result<()> {
        self.index.clear();
        for id in self.ledger.list_with_embeddings() {
            let record = self.ledger.get(id)?;
            if record.is_active {
                self.ingest(id, &record.embedding_ref).await?;
            }
        }
        tracing::info!(entries = self.index.len(), "Search index rebuilt");
        Ok(())
    }

    /// Runs the event loop until the bus closes.
    pub fn spawn(
        self: Arc<Self>,
        mut rx: broadcast::Receiver<DomainEvent>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if let Err(e) = self.apply(&event).await {
                            tracing::error!(error = %e, "Indexer failed to apply event");
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "Indexer lagged behind event bus, rebuilding");
                        if let Err(e) = self.rebuild().await {
                            tracing::error!(error = %e, "Index rebuild failed");
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            tracing::debug!("Indexer stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::Embedder;
    use crate::events::EventBus;
    use crate::ledger::models::NewPaper;
    use crate::ledger::{AccessPolicy, Identity};
    use crate::services::embedding::EmbeddingService;
    use crate::storage::InMemoryContentStore;
    use async_trait::async_trait;

    /// Counts occurrences of a fixed vocabulary, so texts sharing terms get
    /// positive cosine similarity and disjoint texts get zero.
    struct BagEmbedder;

    const VOCABULARY: [&str; 6] = [
        "blockchain",
        "consensus",
        "mechanisms",
        "cooking",
        "recipes",
        "pasta",
    ];

    #[async_trait]
    impl Embedder for BagEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let lower = text.to_lowercase();
            Ok(VOCABULARY
                .iter()
                .map(|term| lower.matches(term).count() as f32)
                .collect())
        }

        fn dim(&self) -> usize {
            VOCABULARY.len()
        }
    }

    struct Fixture {
        ledger: Arc<Ledger>,
        index: Arc<SearchIndex>,
        embedding_service: EmbeddingService,
        indexer: Indexer,
        bus: EventBus,
    }

    fn fixture() -> Fixture {
        let bus = EventBus::new();
        let ledger = Arc::new(Ledger::new(
            AccessPolicy::new("admin".into()),
            bus.clone(),
        ));
        let store: Arc<dyn ContentStore> = Arc::new(InMemoryContentStore::new());
        let embedder: Arc<dyn Embedder> = Arc::new(BagEmbedder);
        let index = Arc::new(SearchIndex::new(embedder.clone()));
        let embedding_service = EmbeddingService::new(ledger.clone(), store.clone(), embedder);
        let indexer = Indexer::new(ledger.clone(), index.clone(), store);
        Fixture {
            ledger,
            index,
            embedding_service,
            indexer,
            bus,
        }
    }

    fn submit(ledger: &Ledger, hash: &str, doi: &str, title: &str, abstract_text: &str) -> PaperId {
        ledger
            .submit(
                NewPaper {
                    content_hash: hash.into(),
                    title: title.into(),
                    abstract_text: abstract_text.into(),
                    doi: doi.into(),
                    publication_year: 2024,
                    keywords: vec![],
                    authors: vec!["alice".into()],
                    version: "1.0".into(),
                },
                "alice".into(),
            )
            .unwrap()
    }

    async fn drain_events(f: &Fixture, rx: &mut tokio::sync::broadcast::Receiver<DomainEvent>) {
        while let Ok(event) = rx.try_recv() {
            f.indexer.apply(&event).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_submit_embed_index_query_flow() {
        let f = fixture();
        let mut rx = f.bus.subscribe();
        let actor = Identity::from("alice");

        let relevant = submit(
            &f.ledger,
            "H1",
            "10.1000/a",
            "Blockchain Consensus Mechanisms",
            "A survey of blockchain consensus mechanisms.",
        );
        let unrelated = submit(
            &f.ledger,
            "H2",
            "10.1000/b",
            "Cooking Recipes",
            "Pasta recipes for weeknight cooking.",
        );

        f.embedding_service.generate_and_store(relevant, &actor).await.unwrap();
        f.embedding_service.generate_and_store(unrelated, &actor).await.unwrap();
        drain_events(&f, &mut rx).await;
        assert_eq!(f.index.len(), 2);

        let hits = f.index.query("blockchain consensus mechanisms", 3).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, relevant);
        assert!(hits[0].score > 0.0);
    }

    #[tokio::test]
    async fn test_update_evicts_entry() {
        let f = fixture();
        let mut rx = f.bus.subscribe();
        let actor = Identity::from("alice");

        let id = submit(
            &f.ledger,
            "H1",
            "10.1000/a",
            "Blockchain Consensus Mechanisms",
            "Consensus.",
        );
        f.embedding_service.generate_and_store(id, &actor).await.unwrap();
        drain_events(&f, &mut rx).await;
        assert_eq!(f.index.len(), 1);

        f.ledger.update(id, "H2".into(), "2.0".into(), &actor).unwrap();
        drain_events(&f, &mut rx).await;
        assert!(f.index.is_empty());
    }

    #[tokio::test]
    async fn test_deactivation_evicts_entry() {
        let f = fixture();
        let mut rx = f.bus.subscribe();
        let actor = Identity::from("alice");

        let id = submit(&f.ledger, "H1", "10.1000/a", "Blockchain", "Consensus.");
        f.embedding_service.generate_and_store(id, &actor).await.unwrap();
        drain_events(&f, &mut rx).await;

        f.ledger.deactivate(id, &actor).unwrap();
        drain_events(&f, &mut rx).await;
        assert!(f.index.is_empty());

        let hits = f.index.query("blockchain", 10).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_stale_event_is_skipped() {
        let f = fixture();
        let mut rx = f.bus.subscribe();
        let actor = Identity::from("alice");

        let id = submit(&f.ledger, "H1", "10.1000/a", "Blockchain", "Consensus.");
        f.embedding_service.generate_and_store(id, &actor).await.unwrap();
        // The paper moves on before the event is processed.
        f.ledger.update(id, "H2".into(), "2.0".into(), &actor).unwrap();
        drain_events(&f, &mut rx).await;

        assert!(f.index.is_empty());
    }

    #[tokio::test]
    async fn test_rebuild_from_ledger() {
        let f = fixture();
        let actor = Identity::from("alice");

        let a = submit(&f.ledger, "H1", "10.1000/a", "Blockchain", "Consensus.");
        let b = submit(&f.ledger, "H2", "10.1000/b", "Cooking", "Recipes.");
        f.embedding_service.generate_and_store(a, &actor).await.unwrap();
        f.embedding_service.generate_and_store(b, &actor).await.unwrap();
        f.ledger.deactivate(b, &actor).unwrap();

        // No events applied at all: rebuild must recover the live set.
        f.indexer.rebuild().await.unwrap();
        assert_eq!(f.index.len(), 1);

        let hits = f.index.query("blockchain", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, a);
    }

    #[test]
    fn test_snippet_respects_char_boundaries() {
        let short = "short abstract";
        assert_eq!(snippet(short), short);

        let long = "é".repeat(300);
        let cut = snippet(&long);
        assert!(cut.len() <= SNIPPET_LEN);
        assert!(long.starts_with(&cut));
    }
}
