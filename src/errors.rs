/// Domain-specific error types for the pricing workers and aggregators.
/// Every failure is reported to the caller (the external scheduler sees a
/// non-zero exit). The binary must:
/// - Reject bad inputs before any simulation work starts
/// - Never hand back a poisoned (NaN/Inf) result
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("numeric overflow: {0}")]
    NumericOverflow(String),

    #[error("no result files found in {0}")]
    NoResults(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid task graph: {0}")]
    InvalidTaskGraph(String),
}

impl EngineError {
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        EngineError::InvalidParameter { name, reason: reason.into() }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Parse(e.to_string())
    }
}

impl From<glob::PatternError> for EngineError {
    fn from(e: glob::PatternError) -> Self {
        EngineError::Parse(format!("glob pattern: {e}"))
    }
}

impl From<glob::GlobError> for EngineError {
    fn from(e: glob::GlobError) -> Self {
        EngineError::Io(e.to_string())
    }
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(e: tokio::task::JoinError) -> Self {
        EngineError::Io(format!("worker task failed: {e}"))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
