//! Error taxonomy for a conversation job.

use thiserror::Error;

/// Fatal outcomes of a job, one per pipeline stage. There is no local
/// recovery beyond the bounded retry inside model initialization; the
/// process entrypoint is the final catch point.
#[derive(Debug, Error)]
pub enum JobError {
    /// The agent definition is unusable. Raised before any connection
    /// attempt; never retried.
    #[error("invalid agent configuration: {0}")]
    Configuration(String),

    /// Transport-level connection or participant-wait failure. Propagated
    /// to the job framework, which may reschedule the job externally.
    #[error("room connection failed: {0:#}")]
    Connection(#[source] anyhow::Error),

    /// Every model construction attempt failed.
    #[error("realtime model initialization failed after {attempts} attempts: {source:#}")]
    ModelInitialization {
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    /// The session runtime could not bind the model to the live room.
    #[error("agent session failed to start: {0:#}")]
    SessionStart(#[source] anyhow::Error),
}
