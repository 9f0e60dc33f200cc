use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;

use crate::errors::{AppError, ErrorCode, Result};
use crate::events::{DomainEvent, EventBus};

use super::models::{Identity, NewPaper, PaperId, PaperRecord};

/// Single authorization predicate for mutating operations, parameterized by
/// whether the designated administrator is also acceptable.
#[derive(Clone, Debug)]
pub struct AccessPolicy {
    admin: Identity,
}

impl AccessPolicy {
    pub fn new(admin: Identity) -> Self {
        Self { admin }
    }

    pub fn ensure_submitter(&self, record: &PaperRecord, actor: &Identity) -> Result<()> {
        if &record.submitter != actor {
            return Err(AppError::Authorization("Not the paper submitter".into()));
        }
        Ok(())
    }

    pub fn ensure_submitter_or_admin(&self, record: &PaperRecord, actor: &Identity) -> Result<()> {
        if &record.submitter != actor && &self.admin != actor {
            return Err(AppError::Authorization(
                "Not the paper submitter or administrator".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Default)]
struct RegistryState {
    papers: HashMap<PaperId, PaperRecord>,
    next_id: PaperId,
    by_doi: HashMap<String, PaperId>,
    /// Content hashes ever registered. Entries are never removed: an updated
    /// or deactivated paper keeps its hashes reserved, so re-submitting a
    /// prior hash is a conflict.
    used_hashes: HashMap<String, PaperId>,
    by_author: HashMap<Identity, Vec<PaperId>>,
}

/// Authoritative store of paper records. There is exactly one instance; every
/// operation takes the registry lock once, so each check-then-write sequence
/// is atomic with respect to concurrent callers.
pub struct Ledger {
    state: RwLock<RegistryState>,
    policy: AccessPolicy,
    events: EventBus,
}

impl Ledger {
    pub fn new(policy: AccessPolicy, events: EventBus) -> Self {
        Self {
            state: RwLock::new(RegistryState {
                next_id: 1,
                ..Default::default()
            }),
            policy,
            events,
        }
    }

    /// Registers a new paper. All invariant checks run before any index is
    /// touched; on failure nothing changes.
    pub fn submit(&self, paper: NewPaper, actor: Identity) -> Result<PaperId> {
        paper.validate()?;

        let mut state = self.state.write().expect("registry lock poisoned");

        if state.used_hashes.contains_key(&paper.content_hash) {
            return Err(AppError::Conflict {
                code: ErrorCode::DuplicateContentHash,
                detail: "Content hash already exists".into(),
            });
        }
        if state.by_doi.contains_key(&paper.doi) {
            return Err(AppError::Conflict {
                code: ErrorCode::DuplicateDoi,
                detail: "DOI already exists".into(),
            });
        }

        let id = state.next_id;
        state.next_id += 1;

        let record = PaperRecord {
            id,
            content_hash: paper.content_hash.clone(),
            title: paper.title,
            abstract_text: paper.abstract_text,
            doi: paper.doi.clone(),
            publication_year: paper.publication_year,
            keywords: paper.keywords,
            authors: paper.authors.clone(),
            submitter: actor.clone(),
            version: paper.version,
            is_active: true,
            embedding_ref: String::new(),
            embeddings_generated: false,
            assigned_reviewer: None,
            reviewer_assigned: false,
            created_at: Utc::now(),
        };

        state.used_hashes.insert(paper.content_hash.clone(), id);
        state.by_doi.insert(paper.doi, id);
        for author in &paper.authors {
            state.by_author.entry(author.clone()).or_default().push(id);
        }
        state.papers.insert(id, record);
        drop(state);

        tracing::info!(paper_id = id, submitter = %actor, "Paper submitted");
        metrics::counter!("paperchain_papers_submitted_total").increment(1);
        self.events.publish(DomainEvent::PaperSubmitted {
            id,
            content_hash: paper.content_hash,
            submitter: actor,
        });

        Ok(id)
    }

    /// Replaces content hash and version. Embeddings are content-derived, so
    /// both embedding fields are unconditionally reset.
    pub fn update(
        &self,
        id: PaperId,
        new_content_hash: String,
        new_version: String,
        actor: &Identity,
    ) -> Result<()> {
        if new_content_hash.is_empty() {
            return Err(AppError::Validation("Content hash cannot be empty".into()));
        }
        if new_version.is_empty() {
            return Err(AppError::Validation("Version cannot be empty".into()));
        }

        let mut state = self.state.write().expect("registry lock poisoned");

        let record = state
            .papers
            .get(&id)
            .ok_or_else(|| AppError::not_found("paper", id))?;
        self.policy.ensure_submitter(record, actor)?;
        if !record.is_active {
            return Err(AppError::Conflict {
                code: ErrorCode::AlreadyInactive,
                detail: "Paper is not active".into(),
            });
        }
        // A record's own prior hash is in the reserved set, so re-submitting
        // it on update is rejected like any other collision.
        if state.used_hashes.contains_key(&new_content_hash) {
            return Err(AppError::Conflict {
                code: ErrorCode::DuplicateContentHash,
                detail: "Content hash already exists".into(),
            });
        }

        state.used_hashes.insert(new_content_hash.clone(), id);
        let record = state.papers.get_mut(&id).expect("checked above");
        record.content_hash = new_content_hash.clone();
        record.version = new_version.clone();
        record.embedding_ref.clear();
        record.embeddings_generated = false;
        drop(state);

        tracing::info!(paper_id = id, "Paper updated");
        metrics::counter!("paperchain_papers_updated_total").increment(1);
        self.events.publish(DomainEvent::PaperUpdated {
            id,
            new_content_hash,
            new_version,
        });

        Ok(())
    }

    /// One-way deactivation. There is no reactivation path.
    pub fn deactivate(&self, id: PaperId, actor: &Identity) -> Result<()> {
        let mut state = self.state.write().expect("registry lock poisoned");

        let record = state
            .papers
            .get(&id)
            .ok_or_else(|| AppError::not_found("paper", id))?;
        self.policy.ensure_submitter(record, actor)?;
        if !record.is_active {
            return Err(AppError::Conflict {
                code: ErrorCode::AlreadyInactive,
                detail: "Paper is already deactivated".into(),
            });
        }

        state.papers.get_mut(&id).expect("checked above").is_active = false;
        drop(state);

        tracing::info!(paper_id = id, "Paper deactivated");
        metrics::counter!("paperchain_papers_deactivated_total").increment(1);
        self.events.publish(DomainEvent::PaperDeactivated { id });

        Ok(())
    }

    /// Records the content-store reference of a generated embedding. Permitted
    /// to the submitter or the designated administrator.
    pub fn store_embedding(
        &self,
        id: PaperId,
        embedding_ref: String,
        actor: &Identity,
    ) -> Result<()> {
        if embedding_ref.is_empty() {
            return Err(AppError::Validation("Embedding reference cannot be empty".into()));
        }

        let mut state = self.state.write().expect("registry lock poisoned");

        let record = state
            .papers
            .get(&id)
            .ok_or_else(|| AppError::not_found("paper", id))?;
        self.policy.ensure_submitter_or_admin(record, actor)?;
        if !record.is_active {
            return Err(AppError::Conflict {
                code: ErrorCode::AlreadyInactive,
                detail: "Paper is not active".into(),
            });
        }

        let record = state.papers.get_mut(&id).expect("checked above");
        record.embedding_ref = embedding_ref.clone();
        record.embeddings_generated = true;
        drop(state);

        tracing::info!(paper_id = id, %embedding_ref, "Embeddings stored");
        metrics::counter!("paperchain_embeddings_stored_total").increment(1);
        self.events.publish(DomainEvent::EmbeddingsGenerated {
            id,
            embedding_ref,
            actor: actor.clone(),
        });

        Ok(())
    }

    /// Commits a reviewer assignment. Reachable only from the assignment
    /// protocol; write-once, never reset.
    pub(crate) fn record_reviewer(&self, id: PaperId, reviewer: Identity) -> Result<()> {
        let mut state = self.state.write().expect("registry lock poisoned");

        let record = state
            .papers
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("paper", id))?;
        if record.reviewer_assigned {
            return Err(AppError::Conflict {
                code: ErrorCode::ReviewerAlreadyAssigned,
                detail: "Reviewer already assigned".into(),
            });
        }
        record.assigned_reviewer = Some(reviewer.clone());
        record.reviewer_assigned = true;
        drop(state);

        tracing::info!(paper_id = id, reviewer = %reviewer, "Reviewer assigned");
        metrics::counter!("paperchain_reviewers_assigned_total").increment(1);
        self.events.publish(DomainEvent::ReviewerAssigned { id, reviewer });

        Ok(())
    }

    pub fn get(&self, id: PaperId) -> Result<PaperRecord> {
        let state = self.state.read().expect("registry lock poisoned");
        state
            .papers
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found("paper", id))
    }

    /// Paper ids a given identity appears on as an author, in submission order.
    pub fn get_by_author(&self, author: &Identity) -> Vec<PaperId> {
        let state = self.state.read().expect("registry lock poisoned");
        state.by_author.get(author).cloned().unwrap_or_default()
    }

    pub fn get_by_doi(&self, doi: &str) -> Result<PaperId> {
        let state = self.state.read().expect("registry lock poisoned");
        state
            .by_doi
            .get(doi)
            .copied()
            .ok_or_else(|| AppError::not_found("doi", doi))
    }

    pub fn is_content_hash_used(&self, hash: &str) -> bool {
        let state = self.state.read().expect("registry lock poisoned");
        state.used_hashes.contains_key(hash)
    }

    /// Ids of papers with generated embeddings, ascending.
    pub fn list_with_embeddings(&self) -> Vec<PaperId> {
        let state = self.state.read().expect("registry lock poisoned");
        let mut ids: Vec<PaperId> = state
            .papers
            .values()
            .filter(|p| p.embeddings_generated)
            .map(|p| p.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn total(&self) -> u64 {
        let state = self.state.read().expect("registry lock poisoned");
        state.papers.len() as u64
    }
}
