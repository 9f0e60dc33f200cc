pub mod models;
pub mod registry;

pub use models::{Identity, PaperId, PaperRecord};
pub use registry::{AccessPolicy, Ledger};
