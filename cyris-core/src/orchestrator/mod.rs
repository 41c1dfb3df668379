//! Component I: the range orchestrator and its persistence layer.

pub mod persistence;
pub mod range;

pub use persistence::RangeStore;
pub use range::{DomainStatusView, OrchestratorConfig, RangeOrchestrator, RangeStatus, SshInfo};
