use thiserror::Error;

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// Every failure the pipeline can report.
///
/// Startup failures (`DataLoad`, `ModelUnavailable`, `Config`) prevent the
/// service from becoming ready. The request-level variants are caller errors
/// and are turned into structured error responses at the service boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EcgError {
    #[error("failed to load dataset: {0}")]
    DataLoad(String),

    #[error("no classifier available: {0}")]
    ModelUnavailable(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("service is not ready, dataset and model are still loading")]
    ServiceNotReady,

    #[error("service is already initialized")]
    AlreadyInitialized,

    #[error("malformed request: {0}")]
    InvalidRequest(String),

    #[error("invalid filter type '{0}', use: all, normal, abnormal")]
    InvalidFilter(String),

    #[error("index {index} out of range (valid range 0..{len})")]
    OutOfRange { index: i64, len: usize },

    #[error("signal has {actual} samples, classifier expects {expected}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("normalizer used before it was fitted")]
    NotFitted,
}

impl EcgError {
    /// Stable identifier used in structured error responses.
    pub fn kind(&self) -> &'static str {
        match self {
            EcgError::DataLoad(_) => "data_load_error",
            EcgError::ModelUnavailable(_) => "model_unavailable",
            EcgError::Config(_) => "config_error",
            EcgError::ServiceNotReady => "service_not_ready",
            EcgError::AlreadyInitialized => "already_initialized",
            EcgError::InvalidRequest(_) => "invalid_request",
            EcgError::InvalidFilter(_) => "invalid_filter",
            EcgError::OutOfRange { .. } => "out_of_range",
            EcgError::ShapeMismatch { .. } => "shape_mismatch",
            EcgError::NotFitted => "not_fitted",
        }
    }

    /// Whether the error means the process cannot serve requests at all.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EcgError::DataLoad(_)
                | EcgError::ModelUnavailable(_)
                | EcgError::Config(_)
                | EcgError::NotFitted
        )
    }
}

pub type EcgResult<T> = std::result::Result<T, EcgError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_errors_are_not_fatal() {
        assert!(!EcgError::ServiceNotReady.is_fatal());
        assert!(!EcgError::InvalidFilter("x".into()).is_fatal());
        assert!(!EcgError::InvalidRequest("x".into()).is_fatal());
        assert!(!EcgError::OutOfRange { index: -1, len: 4 }.is_fatal());
        assert!(EcgError::NotFitted.is_fatal());
        assert!(EcgError::ModelUnavailable("gone".into()).is_fatal());
    }

    #[test]
    fn out_of_range_message_names_bounds() {
        let msg = EcgError::OutOfRange { index: 7, len: 4 }.to_string();
        assert_eq!(msg, "index 7 out of range (valid range 0..4)");
        assert_eq!(EcgError::OutOfRange { index: 7, len: 4 }.kind(), "out_of_range");
    }
}
