use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, Result};

/// Primary key of a paper record. Allocated sequentially starting at 1.
pub type PaperId = u64;

/// Opaque actor identity, typically a wallet address. The core only ever
/// compares identities for equality.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(pub String);

impl Identity {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

pub const MAX_AUTHORS: usize = 10;
pub const MAX_KEYWORDS: usize = 20;
pub const MIN_PUBLICATION_YEAR: i32 = 1900;

/// A registered research paper. Records are never physically destroyed;
/// deactivation is the only terminal mutation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    pub id: PaperId,
    pub content_hash: String,
    pub title: String,
    pub abstract_text: String,
    pub doi: String,
    pub publication_year: i32,
    pub keywords: Vec<String>,
    pub authors: Vec<Identity>,
    pub submitter: Identity,
    pub version: String,
    pub is_active: bool,
    /// Reference into the content store where the embedding vector lives.
    /// Empty iff `embeddings_generated` is false.
    pub embedding_ref: String,
    pub embeddings_generated: bool,
    pub assigned_reviewer: Option<Identity>,
    pub reviewer_assigned: bool,
    pub created_at: DateTime<Utc>,
}

/// Validated field set for a new submission.
#[derive(Clone, Debug, Deserialize)]
pub struct NewPaper {
    pub content_hash: String,
    pub title: String,
    pub abstract_text: String,
    pub doi: String,
    pub publication_year: i32,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub authors: Vec<Identity>,
    pub version: String,
}

impl NewPaper {
    /// Checks all creation-time invariants. The registry calls this before
    /// touching any index so a failed submission leaves no trace.
    pub fn validate(&self) -> Result<()> {
        if self.content_hash.is_empty() {
            return Err(AppError::Validation("Content hash cannot be empty".into()));
        }
        if self.title.is_empty() {
            return Err(AppError::Validation("Title cannot be empty".into()));
        }
        if self.abstract_text.is_empty() {
            return Err(AppError::Validation("Abstract cannot be empty".into()));
        }
        if self.doi.is_empty() {
            return Err(AppError::Validation("DOI cannot be empty".into()));
        }
        let max_year = Utc::now().year() + 1;
        if self.publication_year < MIN_PUBLICATION_YEAR || self.publication_year > max_year {
            return Err(AppError::Validation(format!(
                "Invalid publication year: {} not in {}..={}",
                self.publication_year, MIN_PUBLICATION_YEAR, max_year
            )));
        }
        if self.authors.is_empty() {
            return Err(AppError::Validation("Must have at least one author".into()));
        }
        if self.authors.len() > MAX_AUTHORS {
            return Err(AppError::Validation(format!(
                "Too many authors: {} exceeds limit of {}",
                self.authors.len(),
                MAX_AUTHORS
            )));
        }
        if self.keywords.len() > MAX_KEYWORDS {
            return Err(AppError::Validation(format!(
                "Too many keywords: {} exceeds limit of {}",
                self.keywords.len(),
                MAX_KEYWORDS
            )));
        }
        if self.version.is_empty() {
            return Err(AppError::Validation("Version cannot be empty".into()));
        }
        Ok(())
    }
}
