use std::sync::Arc;

use crate::embeddings::Embedder;
use crate::errors::Result;
use crate::ledger::{Identity, Ledger, PaperId};
use crate::storage::{self, ContentStore};

/// Generates a paper's embedding from its registered text, stores the vector
/// in the content store, and records the reference on the ledger. This is the
/// optional out-of-band leg of the submission flow; papers whose embeddings
/// are produced elsewhere go straight through `Ledger::store_embedding`.
pub struct EmbeddingService {
    ledger: Arc<Ledger>,
    store: Arc<dyn ContentStore>,
    embedder: Arc<dyn Embedder>,
}

impl EmbeddingService {
    pub fn new(
        ledger: Arc<Ledger>,
        store: Arc<dyn ContentStore>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            ledger,
            store,
            embedder,
        }
    }

    /// Text fed to the embedder: title, abstract and keywords joined, the same
    /// composition for every paper so vectors stay comparable.
    fn embedding_text(title: &str, abstract_text: &str, keywords: &[String]) -> String {
        let mut text = format!("{title}\n{abstract_text}");
        if !keywords.is_empty() {
            text.push('\n');
            text.push_str(&keywords.join(", "));
        }
        text
    }

    pub async fn generate_and_store(&self, id: PaperId, actor: &Identity) -> Result<String> {
        let record = self.ledger.get(id)?;
        let text =
            Self::embedding_text(&record.title, &record.abstract_text, &record.keywords);

        let vector = self.embedder.embed(&text).await?;
        let embedding_ref = storage::put_embedding(self.store.as_ref(), &vector).await?;

        // The ledger re-checks authorization and liveness; a failure here
        // leaves only an unreferenced blob behind.
        self.ledger.store_embedding(id, embedding_ref.clone(), actor)?;

        tracing::info!(paper_id = id, %embedding_ref, "Embeddings generated and stored");
        Ok(embedding_ref)
    }
}
