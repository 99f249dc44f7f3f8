use thiserror::Error;

/// Failure categories surfaced by the engine.
///
/// Every orchestration stage catches and logs these locally; none of them
/// aborts sibling stages or reaches the end user directly.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An external collaborator (directory, store, message source) failed.
    #[error("lookup failed: {0}")]
    LookupFailure(String),

    /// A malformed address, or a missing expected `+tag`.
    #[error("parse failed: {0}")]
    ParseFailure(String),

    /// A required record is absent, e.g. the template identity during provisioning.
    #[error("not found: {0}")]
    NotFound(String),

    /// The compose surface rejected a From update.
    #[error("apply rejected: {0}")]
    ApplyFailure(String),
}

impl EngineError {
    pub fn lookup(msg: impl Into<String>) -> Self {
        EngineError::LookupFailure(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        EngineError::ParseFailure(msg.into())
    }
}
