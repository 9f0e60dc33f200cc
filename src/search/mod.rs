pub mod index;

pub use index::{cosine_similarity, IndexEntry, SearchHit, SearchIndex};
