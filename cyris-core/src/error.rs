//! Error taxonomy for the cyber-range orchestrator.
//!
//! Every variant corresponds to one of the error kinds a failure is
//! classified into: the orchestrator decides rollback-vs-continue purely
//! from the variant, never from string matching on a rendered message.

use std::path::PathBuf;

use thiserror::Error;

/// The step (pipeline stage or component) a failure occurred in, carried
/// alongside the error for the CLI's "failing step" field.
pub type Step = &'static str;

#[derive(Error, Debug)]
pub enum CyrisError {
    /// A range description was rejected before any side effect occurred.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The privilege broker could not obtain elevated privilege.
    #[error("permission denied: {0}")]
    Permission(String),

    /// Image acquisition or customisation failed.
    #[error("image build failed: {0}")]
    ImageBuild(String),

    /// A libvirt/virsh domain operation failed.
    #[error("libvirt operation failed: {0}")]
    Libvirt(String),

    /// A bridge/NAT/topology operation failed.
    #[error("network operation failed: {0}")]
    Network(String),

    /// IP or SSH readiness was not achieved within the configured deadline.
    #[error("discovery timed out: {0}")]
    DiscoveryTimeout(String),

    /// A provisioning task returned a non-zero result.
    #[error("task failed: {0}")]
    TaskFailed(String),

    /// A retriable condition; surfaced only once retries are exhausted.
    #[error("transient error: {0}")]
    Transient(String),

    /// An invariant was violated. Always surfaced, never swallowed.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CyrisError {
    /// The taxonomy kind as a stable, lowercase-hyphenated string, used in
    /// both log fields and the CLI's structured failure output.
    pub fn kind(&self) -> &'static str {
        match self {
            CyrisError::Validation(_) => "validation",
            CyrisError::Permission(_) => "permission",
            CyrisError::ImageBuild(_) => "image-build",
            CyrisError::Libvirt(_) => "libvirt",
            CyrisError::Network(_) => "network",
            CyrisError::DiscoveryTimeout(_) => "discovery-timeout",
            CyrisError::TaskFailed(_) => "task-failed",
            CyrisError::Transient(_) => "transient",
            CyrisError::Internal(_) => "internal",
        }
    }

    /// Whether the orchestrator should treat this as retriable locally
    /// rather than surfacing it up the pipeline.
    pub fn is_transient(&self) -> bool {
        matches!(self, CyrisError::Transient(_))
    }
}

/// A `CyrisError` augmented with the failing pipeline step and a pointer to
/// the range's log directory, matching spec §7's "user-visible behaviour"
/// contract: kind, one sentence, failing step, log path.
#[derive(Debug)]
pub struct StepError {
    pub step: Step,
    pub source: CyrisError,
    pub log_path: Option<PathBuf>,
}

impl std::fmt::Display for StepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {} (step: {})", self.source.kind(), self.source, self.step)?;
        if let Some(p) = &self.log_path {
            write!(f, " — see {}", p.display())?;
        }
        Ok(())
    }
}

impl std::error::Error for StepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

impl StepError {
    pub fn new(step: Step, source: CyrisError) -> Self {
        Self { step, source, log_path: None }
    }

    pub fn with_log_path(mut self, path: PathBuf) -> Self {
        self.log_path = Some(path);
        self
    }
}

/// Result type alias used throughout `cyris-core`.
pub type Result<T> = std::result::Result<T, CyrisError>;
