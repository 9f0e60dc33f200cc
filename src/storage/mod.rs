use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::errors::{AppError, Result};

/// Content-addressed blob store. The core only ever moves references; raw
/// document bytes never pass through the ledger or the search index.
/// Production deployments back this with a store like IPFS.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Stores the bytes and returns their content hash.
    async fn put(&self, bytes: Vec<u8>) -> Result<String>;

    /// Retrieves the bytes for a previously stored hash.
    async fn get(&self, content_hash: &str) -> Result<Vec<u8>>;
}

/// In-process store addressing blobs by hex-encoded SHA-256.
pub struct InMemoryContentStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
        }
    }

    fn digest(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }
}

impl Default for InMemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn put(&self, bytes: Vec<u8>) -> Result<String> {
        let hash = Self::digest(&bytes);
        self.blobs
            .write()
            .expect("content store lock poisoned")
            .insert(hash.clone(), bytes);
        Ok(hash)
    }

    async fn get(&self, content_hash: &str) -> Result<Vec<u8>> {
        self.blobs
            .read()
            .expect("content store lock poisoned")
            .get(content_hash)
            .cloned()
            .ok_or_else(|| AppError::ContentStoreError(format!("No blob for hash {content_hash}")))
    }
}

/// Stores an embedding vector as a JSON blob and returns its reference.
pub async fn put_embedding(store: &dyn ContentStore, vector: &[f32]) -> Result<String> {
    let bytes = serde_json::to_vec(vector)
        .map_err(|e| AppError::ContentStoreError(format!("Encode embedding: {e}")))?;
    store.put(bytes).await
}

/// Fetches and decodes an embedding vector by its reference.
pub async fn get_embedding(store: &dyn ContentStore, embedding_ref: &str) -> Result<Vec<f32>> {
    let bytes = store.get(embedding_ref).await?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AppError::ContentStoreError(format!("Decode embedding {embedding_ref}: {e}")))
}
