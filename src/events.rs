use serde::Serialize;
use tokio::sync::broadcast;

use crate::ledger::{Identity, PaperId};

/// Events emitted by the core for external consumption. The search indexer
/// is the in-process subscriber; anything else hangs off the same bus.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    PaperSubmitted {
        id: PaperId,
        content_hash: String,
        submitter: Identity,
    },
    PaperUpdated {
        id: PaperId,
        new_content_hash: String,
        new_version: String,
    },
    PaperDeactivated {
        id: PaperId,
    },
    EmbeddingsGenerated {
        id: PaperId,
        embedding_ref: String,
        actor: Identity,
    },
    ReviewerAssigned {
        id: PaperId,
        reviewer: Identity,
    },
}

const EVENT_BUS_CAPACITY: usize = 256;

/// Broadcast bus for domain events. Subscribers that fall behind see
/// `RecvError::Lagged` and are expected to rebuild from the ledger.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }

    /// Publishing never fails the emitting operation: an event with no
    /// subscribers is simply dropped.
    pub fn publish(&self, event: DomainEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::trace!(error = %e, "No subscribers for domain event");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
