pub mod oracle;
pub mod protocol;

pub use oracle::{spawn_local_oracle_driver, ChannelOracle, RandomnessOracle, ReviewerPool, StaticReviewerPool};
pub use protocol::{AssignmentProtocol, AssignmentState, RequestToken};
