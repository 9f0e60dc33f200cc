use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::errors::{AppError, Result};
use crate::ledger::Identity;

use super::protocol::{AssignmentProtocol, RequestToken};

/// Contract with the external randomness source. `request` returns once the
/// request is accepted; the random value arrives later through
/// `AssignmentProtocol::on_randomness_fulfilled`, possibly more than once.
#[async_trait]
pub trait RandomnessOracle: Send + Sync {
    async fn request(&self, token: RequestToken) -> Result<()>;
}

/// Membership of the reviewer pool, provided by an external collaborator.
/// The protocol only needs indexed access for `value mod size`.
pub trait ReviewerPool: Send + Sync {
    fn size(&self) -> usize;
    fn reviewer_at(&self, index: usize) -> Option<Identity>;
}

/// Fixed pool loaded from configuration at startup.
pub struct StaticReviewerPool {
    members: Vec<Identity>,
}

impl StaticReviewerPool {
    pub fn new(members: Vec<Identity>) -> Self {
        Self { members }
    }
}

impl ReviewerPool for StaticReviewerPool {
    fn size(&self) -> usize {
        self.members.len()
    }

    fn reviewer_at(&self, index: usize) -> Option<Identity> {
        self.members.get(index).cloned()
    }
}

/// Oracle that hands accepted tokens to an in-process driver task over a
/// channel. Stands in for an external VRF service in development; deployments
/// with a real oracle deliver fulfillments through the callback endpoint
/// instead.
pub struct ChannelOracle {
    tx: mpsc::UnboundedSender<RequestToken>,
}

impl ChannelOracle {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RequestToken>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl RandomnessOracle for ChannelOracle {
    async fn request(&self, token: RequestToken) -> Result<()> {
        self.tx
            .send(token)
            .map_err(|e| AppError::OracleRequestFailed(format!("Oracle channel closed: {e}")))
    }
}

/// Drives the local oracle: each accepted token is fulfilled with a fresh
/// random value on an independent later unit of work.
pub fn spawn_local_oracle_driver(
    mut rx: mpsc::UnboundedReceiver<RequestToken>,
    protocol: Arc<AssignmentProtocol>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(token) = rx.recv().await {
            let value: u64 = rand::random();
            tracing::debug!(token, value, "Local oracle fulfilling randomness request");
            if let Err(e) = protocol.on_randomness_fulfilled(token, value).await {
                tracing::error!(token, error = %e, "Randomness fulfillment failed");
            }
        }
        tracing::debug!("Local oracle driver stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_pool_indexing() {
        let pool = StaticReviewerPool::new(vec!["r0".into(), "r1".into(), "r2".into()]);
        assert_eq!(pool.size(), 3);
        assert_eq!(pool.reviewer_at(1), Some("r1".into()));
        assert_eq!(pool.reviewer_at(3), None);
    }

    #[tokio::test]
    async fn test_channel_oracle_delivers_tokens() {
        let (oracle, mut rx) = ChannelOracle::new();
        oracle.request(42).await.unwrap();
        assert_eq!(rx.recv().await, Some(42));
    }

    #[tokio::test]
    async fn test_channel_oracle_rejects_after_driver_gone() {
        let (oracle, rx) = ChannelOracle::new();
        drop(rx);
        assert!(matches!(
            oracle.request(1).await,
            Err(AppError::OracleRequestFailed(_))
        ));
    }
}
