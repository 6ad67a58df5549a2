//! Error types for trace emission.

use thiserror::Error;

/// Errors produced when emitting a trace report.
///
/// Recording itself never fails: the hooks run on the target's hot
/// path and only perform in-memory appends. Failures can only happen
/// once the target has exited and the report is written out.
#[derive(Debug, Error)]
pub enum TraceError {
    /// Writing the report to its sink failed.
    #[error("failed to write report: {0}")]
    Write(#[from] std::io::Error),
    /// Serializing the report failed.
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}
