pub mod client;

pub use client::{CloudEmbedder, Embedder, MockEmbedder};
