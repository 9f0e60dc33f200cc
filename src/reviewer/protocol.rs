use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::Mutex;

use crate::errors::{AppError, ErrorCode, Result};
use crate::ledger::{AccessPolicy, Identity, Ledger, PaperId};

use super::oracle::{RandomnessOracle, ReviewerPool};

/// Correlation token binding a randomness request to the paper awaiting it.
pub type RequestToken = u64;

/// Per-paper assignment state. There is no transition back to `Unrequested`
/// once a request has been accepted by the oracle: a request that never
/// receives a fulfillment leaves the paper in `Requested` permanently.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentState {
    Unrequested,
    Requested,
    Fulfilled,
}

struct ProtocolState {
    next_token: RequestToken,
    states: HashMap<PaperId, AssignmentState>,
    pending: HashMap<RequestToken, PaperId>,
}

/// Two-phase reviewer assignment: `trigger_assignment` arms a paper and hands
/// a correlation token to the randomness oracle; `on_randomness_fulfilled`
/// consumes the callback and commits the derived reviewer to the ledger
/// exactly once. Both phases serialize on one protocol lock, which is held
/// across the oracle hand-off so a rejected request rolls back atomically.
pub struct AssignmentProtocol {
    ledger: Arc<Ledger>,
    policy: AccessPolicy,
    oracle: Arc<dyn RandomnessOracle>,
    pool: Arc<dyn ReviewerPool>,
    state: Mutex<ProtocolState>,
}

impl AssignmentProtocol {
    pub fn new(
        ledger: Arc<Ledger>,
        policy: AccessPolicy,
        oracle: Arc<dyn RandomnessOracle>,
        pool: Arc<dyn ReviewerPool>,
    ) -> Self {
        Self {
            ledger,
            policy,
            oracle,
            pool,
            state: Mutex::new(ProtocolState {
                next_token: 1,
                states: HashMap::new(),
                pending: HashMap::new(),
            }),
        }
    }

    /// Requests randomness for a paper. Returns once the oracle has accepted
    /// the request, not once it is fulfilled.
    pub async fn trigger_assignment(
        &self,
        id: PaperId,
        actor: &Identity,
    ) -> Result<RequestToken> {
        let record = self.ledger.get(id)?;
        self.policy.ensure_submitter(&record, actor)?;
        if !record.is_active {
            return Err(AppError::Conflict {
                code: ErrorCode::AlreadyInactive,
                detail: "Paper is not active".into(),
            });
        }
        if record.reviewer_assigned {
            return Err(AppError::Conflict {
                code: ErrorCode::ReviewerAlreadyAssigned,
                detail: "Reviewer already assigned".into(),
            });
        }

        let mut state = self.state.lock().await;
        match state.states.get(&id).copied().unwrap_or(AssignmentState::Unrequested) {
            AssignmentState::Unrequested => {}
            AssignmentState::Requested => {
                return Err(AppError::Conflict {
                    code: ErrorCode::AssignmentAlreadyRequested,
                    detail: "Assignment already requested".into(),
                });
            }
            AssignmentState::Fulfilled => {
                return Err(AppError::Conflict {
                    code: ErrorCode::ReviewerAlreadyAssigned,
                    detail: "Reviewer already assigned".into(),
                });
            }
        }

        let token = state.next_token;
        state.next_token += 1;
        state.states.insert(id, AssignmentState::Requested);
        state.pending.insert(token, id);

        // Lock is held across the hand-off: a refusal unwinds the transition
        // before any fulfillment for this token can be observed.
        if let Err(e) = self.oracle.request(token).await {
            state.states.insert(id, AssignmentState::Unrequested);
            state.pending.remove(&token);
            return Err(e);
        }
        drop(state);

        tracing::info!(paper_id = id, token, "Reviewer assignment requested");
        metrics::counter!("paperchain_assignment_requests_total").increment(1);

        Ok(token)
    }

    /// Oracle callback. Idempotent under at-least-once delivery: a duplicate
    /// for an already fulfilled paper is a no-op, not an error.
    pub async fn on_randomness_fulfilled(&self, token: RequestToken, value: u64) -> Result<()> {
        let mut state = self.state.lock().await;

        let id = *state
            .pending
            .get(&token)
            .ok_or_else(|| AppError::not_found("request token", token))?;

        match state.states.get(&id).copied() {
            Some(AssignmentState::Fulfilled) => {
                tracing::debug!(paper_id = id, token, "Duplicate fulfillment ignored");
                return Ok(());
            }
            Some(AssignmentState::Requested) => {}
            other => {
                return Err(AppError::Internal(anyhow!(
                    "pending token {token} for paper {id} in unexpected state {other:?}"
                )));
            }
        }

        let pool_size = self.pool.size();
        if pool_size == 0 {
            return Err(AppError::Internal(anyhow!("reviewer pool is empty")));
        }
        let index = (value % pool_size as u64) as usize;
        let reviewer = self
            .pool
            .reviewer_at(index)
            .ok_or_else(|| AppError::Internal(anyhow!("reviewer pool has no member {index}")))?;

        self.ledger.record_reviewer(id, reviewer)?;
        state.states.insert(id, AssignmentState::Fulfilled);
        drop(state);

        tracing::info!(paper_id = id, token, "Reviewer assignment fulfilled");
        metrics::counter!("paperchain_assignment_fulfillments_total").increment(1);

        Ok(())
    }

    pub async fn assignment_state(&self, id: PaperId) -> AssignmentState {
        let state = self.state.lock().await;
        state
            .states
            .get(&id)
            .copied()
            .unwrap_or(AssignmentState::Unrequested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{DomainEvent, EventBus};
    use crate::ledger::models::NewPaper;
    use crate::reviewer::oracle::StaticReviewerPool;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    struct RecordingOracle {
        tokens: StdMutex<Vec<RequestToken>>,
    }

    impl RecordingOracle {
        fn new() -> Self {
            Self {
                tokens: StdMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RandomnessOracle for RecordingOracle {
        async fn request(&self, token: RequestToken) -> Result<()> {
            self.tokens.lock().unwrap().push(token);
            Ok(())
        }
    }

    struct RefusingOracle;

    #[async_trait]
    impl RandomnessOracle for RefusingOracle {
        async fn request(&self, _token: RequestToken) -> Result<()> {
            Err(AppError::OracleRequestFailed("oracle offline".into()))
        }
    }

    struct Fixture {
        ledger: Arc<Ledger>,
        protocol: AssignmentProtocol,
        oracle: Arc<RecordingOracle>,
        bus: EventBus,
    }

    fn fixture_with_oracle(oracle: Arc<dyn RandomnessOracle>) -> (Arc<Ledger>, AssignmentProtocol, EventBus) {
        let bus = EventBus::new();
        let policy = AccessPolicy::new("admin".into());
        let ledger = Arc::new(Ledger::new(policy.clone(), bus.clone()));
        let pool = Arc::new(StaticReviewerPool::new(vec![
            "rev0".into(),
            "rev1".into(),
            "rev2".into(),
        ]));
        let protocol = AssignmentProtocol::new(ledger.clone(), policy, oracle, pool);
        (ledger, protocol, bus)
    }

    fn fixture() -> Fixture {
        let oracle = Arc::new(RecordingOracle::new());
        let (ledger, protocol, bus) = fixture_with_oracle(oracle.clone());
        Fixture {
            ledger,
            protocol,
            oracle,
            bus,
        }
    }

    fn submit_paper(ledger: &Ledger) -> PaperId {
        ledger
            .submit(
                NewPaper {
                    content_hash: "H1".into(),
                    title: "Test Paper".into(),
                    abstract_text: "Abstract".into(),
                    doi: "10.1000/test".into(),
                    publication_year: 2024,
                    keywords: vec![],
                    authors: vec!["alice".into()],
                    version: "1.0".into(),
                },
                "alice".into(),
            )
            .unwrap()
    }

    #[tokio::test]
    async fn test_trigger_transitions_to_requested() {
        let f = fixture();
        let id = submit_paper(&f.ledger);

        let token = f.protocol.trigger_assignment(id, &"alice".into()).await.unwrap();
        assert_eq!(f.protocol.assignment_state(id).await, AssignmentState::Requested);
        assert_eq!(*f.oracle.tokens.lock().unwrap(), vec![token]);
        // Fire and forget: no reviewer yet.
        assert!(!f.ledger.get(id).unwrap().reviewer_assigned);
    }

    #[tokio::test]
    async fn test_trigger_preconditions() {
        let f = fixture();
        let id = submit_paper(&f.ledger);

        assert!(matches!(
            f.protocol.trigger_assignment(99, &"alice".into()).await,
            Err(AppError::NotFound { .. })
        ));
        assert!(matches!(
            f.protocol.trigger_assignment(id, &"mallory".into()).await,
            Err(AppError::Authorization(_))
        ));

        f.ledger.deactivate(id, &"alice".into()).unwrap();
        let err = f.protocol.trigger_assignment(id, &"alice".into()).await.unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::AlreadyInactive);
    }

    #[tokio::test]
    async fn test_trigger_while_requested_conflicts() {
        let f = fixture();
        let id = submit_paper(&f.ledger);

        f.protocol.trigger_assignment(id, &"alice".into()).await.unwrap();
        let err = f.protocol.trigger_assignment(id, &"alice".into()).await.unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::AssignmentAlreadyRequested);
    }

    #[tokio::test]
    async fn test_fulfillment_derives_reviewer_by_modulo() {
        let f = fixture();
        let id = submit_paper(&f.ledger);
        let token = f.protocol.trigger_assignment(id, &"alice".into()).await.unwrap();

        // 7 mod 3 == 1
        f.protocol.on_randomness_fulfilled(token, 7).await.unwrap();

        let record = f.ledger.get(id).unwrap();
        assert!(record.reviewer_assigned);
        assert_eq!(record.assigned_reviewer, Some("rev1".into()));
        assert_eq!(f.protocol.assignment_state(id).await, AssignmentState::Fulfilled);
    }

    #[tokio::test]
    async fn test_duplicate_fulfillment_is_noop_with_one_event() {
        let f = fixture();
        let id = submit_paper(&f.ledger);
        let mut rx = f.bus.subscribe();
        let token = f.protocol.trigger_assignment(id, &"alice".into()).await.unwrap();

        f.protocol.on_randomness_fulfilled(token, 7).await.unwrap();
        // At-least-once delivery: second callback with a different value.
        f.protocol.on_randomness_fulfilled(token, 8).await.unwrap();

        assert_eq!(
            f.ledger.get(id).unwrap().assigned_reviewer,
            Some("rev1".into())
        );

        let mut assigned_events = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, DomainEvent::ReviewerAssigned { .. }) {
                assigned_events += 1;
            }
        }
        assert_eq!(assigned_events, 1);
    }

    #[tokio::test]
    async fn test_fulfillment_unknown_token() {
        let f = fixture();
        assert!(matches!(
            f.protocol.on_randomness_fulfilled(123, 7).await,
            Err(AppError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_trigger_after_fulfillment_conflicts() {
        let f = fixture();
        let id = submit_paper(&f.ledger);
        let token = f.protocol.trigger_assignment(id, &"alice".into()).await.unwrap();
        f.protocol.on_randomness_fulfilled(token, 0).await.unwrap();

        let err = f.protocol.trigger_assignment(id, &"alice".into()).await.unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::ReviewerAlreadyAssigned);
    }

    #[tokio::test]
    async fn test_oracle_refusal_rolls_back() {
        let (ledger, protocol, _bus) = fixture_with_oracle(Arc::new(RefusingOracle));
        let id = submit_paper(&ledger);

        assert!(matches!(
            protocol.trigger_assignment(id, &"alice".into()).await,
            Err(AppError::OracleRequestFailed(_))
        ));
        assert_eq!(protocol.assignment_state(id).await, AssignmentState::Unrequested);
    }

    #[tokio::test]
    async fn test_tokens_are_unique_across_papers() {
        let f = fixture();
        let a = submit_paper(&f.ledger);
        let b = f
            .ledger
            .submit(
                NewPaper {
                    content_hash: "H2".into(),
                    title: "Second".into(),
                    abstract_text: "Abstract".into(),
                    doi: "10.1000/second".into(),
                    publication_year: 2024,
                    keywords: vec![],
                    authors: vec!["bob".into()],
                    version: "1.0".into(),
                },
                "bob".into(),
            )
            .unwrap();

        let ta = f.protocol.trigger_assignment(a, &"alice".into()).await.unwrap();
        let tb = f.protocol.trigger_assignment(b, &"bob".into()).await.unwrap();
        assert_ne!(ta, tb);

        // Out-of-order delivery resolves the correct papers.
        f.protocol.on_randomness_fulfilled(tb, 2).await.unwrap();
        f.protocol.on_randomness_fulfilled(ta, 3).await.unwrap();
        assert_eq!(f.ledger.get(b).unwrap().assigned_reviewer, Some("rev2".into()));
        assert_eq!(f.ledger.get(a).unwrap().assigned_reviewer, Some("rev0".into()));
    }
}
