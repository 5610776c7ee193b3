use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable error tags handed to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Upstream,
    GeneratorUnavailable,
    Validation,
    Execution,
    ExecutionTimeout,
    Unresolved,
    NoData,
}

impl ErrorKind {
    /// Whether "regenerate" is a meaningful next action for this failure
    pub fn can_regenerate(&self) -> bool {
        matches!(
            self,
            ErrorKind::Validation | ErrorKind::Execution | ErrorKind::ExecutionTimeout
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Upstream => "upstream",
            ErrorKind::GeneratorUnavailable => "generator_unavailable",
            ErrorKind::Validation => "validation",
            ErrorKind::Execution => "execution",
            ErrorKind::ExecutionTimeout => "execution_timeout",
            ErrorKind::Unresolved => "unresolved",
            ErrorKind::NoData => "no_data",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by the statistics service or the transport in front of it
#[derive(Error, Debug, Clone)]
pub enum UpstreamError {
    /// Connection refused, reset or timed out; safe to retry
    #[error("stats service unreachable: {0}")]
    Transient(String),

    /// Well-formed error response; authoritative, never retried
    #[error("stats service returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("stats service sent an unreadable response: {0}")]
    Decode(String),
}

impl UpstreamError {
    pub fn is_transient(&self) -> bool {
        matches!(self, UpstreamError::Transient(_))
    }
}

/// Failure talking to the code-generation backend
#[derive(Error, Debug, Clone)]
pub enum GeneratorError {
    #[error("code generator unavailable: {0}")]
    Unavailable(String),

    #[error("code generator returned an unusable reply: {0}")]
    BadResponse(String),
}

/// Failure on the direct-answer path
#[derive(Error, Debug)]
pub enum DugoutError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("No data: {0}")]
    NoData(String),
}

impl DugoutError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DugoutError::Upstream(_) => ErrorKind::Upstream,
            DugoutError::NoData(_) => ErrorKind::NoData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regenerate_only_for_code_failures() {
        assert!(ErrorKind::Validation.can_regenerate());
        assert!(ErrorKind::Execution.can_regenerate());
        assert!(ErrorKind::ExecutionTimeout.can_regenerate());
        assert!(!ErrorKind::Upstream.can_regenerate());
        assert!(!ErrorKind::GeneratorUnavailable.can_regenerate());
        assert!(!ErrorKind::NoData.can_regenerate());
    }

    #[test]
    fn test_kind_tags_are_snake_case() {
        let json = serde_json::to_string(&ErrorKind::ExecutionTimeout).unwrap();
        assert_eq!(json, "\"execution_timeout\"");
        assert_eq!(ErrorKind::GeneratorUnavailable.to_string(), "generator_unavailable");
    }

    #[test]
    fn test_error_kind_mapping() {
        let err = DugoutError::from(UpstreamError::Transient("reset".into()));
        assert_eq!(err.kind(), ErrorKind::Upstream);
        let err = DugoutError::NoData("no leaders".into());
        assert_eq!(err.kind(), ErrorKind::NoData);
    }
}
