use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;

use crate::embeddings::Embedder;
use crate::errors::Result;
use crate::ledger::PaperId;

/// Normalized dot product of two vectors; 0 when either norm is 0 or the
/// dimensions differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += (*x as f64) * (*y as f64);
        norm_a += (*x as f64) * (*x as f64);
        norm_b += (*y as f64) * (*y as f64);
    }

    let norm_a = norm_a.sqrt();
    let norm_b = norm_b.sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Indexed entry for one paper.
#[derive(Clone, Debug)]
pub struct IndexEntry {
    pub id: PaperId,
    pub vector: Vec<f32>,
    pub title: String,
    pub abstract_snippet: String,
}

/// Ranked query result.
#[derive(Clone, Debug, Serialize)]
pub struct SearchHit {
    pub id: PaperId,
    pub score: f64,
    pub title: String,
    pub abstract_snippet: String,
}

/// In-memory nearest-neighbor index over paper embeddings. Entries become
/// visible to queries atomically; ranking is a full linear scan, which is
/// fine for a corpus in the low thousands. An ANN structure could replace the
/// scan later without changing this contract.
pub struct SearchIndex {
    entries: RwLock<HashMap<PaperId, IndexEntry>>,
    embedder: Arc<dyn Embedder>,
}

impl SearchIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            embedder,
        }
    }

    /// Inserts or overwrites the entry for a paper.
    pub fn ingest(&self, entry: IndexEntry) {
        let mut entries = self.entries.write().expect("index lock poisoned");
        tracing::debug!(paper_id = entry.id, "Search index ingest");
        entries.insert(entry.id, entry);
    }

    /// Drops a paper from the index. A no-op for unindexed ids, so update and
    /// deactivation events can call it unconditionally.
    pub fn remove(&self, id: PaperId) {
        let mut entries = self.entries.write().expect("index lock poisoned");
        if entries.remove(&id).is_some() {
            tracing::debug!(paper_id = id, "Search index remove");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("index lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry; used before a rebuild.
    pub fn clear(&self) {
        self.entries.write().expect("index lock poisoned").clear();
    }

    /// Ranks indexed papers against the query text. Scores are cosine
    /// similarity, descending; ties break by ascending id; entries with
    /// similarity <= 0 are excluded.
    pub async fn query(&self, query_text: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let query_vector = self.embedder.embed(query_text).await?;

        let mut hits: Vec<SearchHit> = {
            let entries = self.entries.read().expect("index lock poisoned");
            entries
                .values()
                .filter_map(|entry| {
                    let score = cosine_similarity(&query_vector, &entry.vector);
                    (score > 0.0).then(|| SearchHit {
                        id: entry.id,
                        score,
                        title: entry.title.clone(),
                        abstract_snippet: entry.abstract_snippet.clone(),
                    })
                })
                .collect()
        };

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        hits.truncate(limit);

        metrics::counter!("paperchain_search_ops_total").increment(1);

        Ok(hits)
    }
}
