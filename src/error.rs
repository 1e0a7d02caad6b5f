//! Error taxonomy (§7). Every command handler returns an `EngineError` with
//! a `kind` and a user-visible message; internal field names never leak.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("authorization: {0}")]
    Authorization(String),

    #[error("state: {0}")]
    State(String),

    /// Negative MMR from an admin op, or malformed persisted state on
    /// recovery. The engine refuses to process and surfaces the anomaly
    /// rather than silently continuing.
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// DB unreachable mid-run, chat platform dispatch failure, replay
    /// worker crash — all retried by their owning component; this variant
    /// is only returned once retries are exhausted.
    #[error("external failure: {0}")]
    External(#[from] anyhow::Error),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }
    pub fn authorization(msg: impl Into<String>) -> Self {
        EngineError::Authorization(msg.into())
    }
    pub fn state(msg: impl Into<String>) -> Self {
        EngineError::State(msg.into())
    }
    pub fn integrity(msg: impl Into<String>) -> Self {
        EngineError::Integrity(msg.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation",
            EngineError::Authorization(_) => "authorization",
            EngineError::State(_) => "state",
            EngineError::Integrity(_) => "integrity",
            EngineError::External(_) => "external",
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
