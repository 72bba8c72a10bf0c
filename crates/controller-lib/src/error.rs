//! Error types for cluster operations

use crate::models::{NodeId, PodId};

/// Result type for cluster operations
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Domain-level failures returned to the caller of an operation.
///
/// None of these are fatal; background loops log them and keep running.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClusterError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("node {0} not found")]
    NotFound(NodeId),

    #[error("no eligible node with sufficient resources for pod-{pod_id}")]
    NoCapacity { pod_id: PodId },
}

impl ClusterError {
    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            ClusterError::InvalidInput(_) => "invalid_input",
            ClusterError::NotFound(_) => "not_found",
            ClusterError::NoCapacity { .. } => "no_capacity",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ClusterError::InvalidInput("x".into()).code(),
            "invalid_input"
        );
        assert_eq!(ClusterError::NotFound(Uuid::nil()).code(), "not_found");
        assert_eq!(ClusterError::NoCapacity { pod_id: 3 }.code(), "no_capacity");
    }

    #[test]
    fn test_no_capacity_message_names_pod() {
        let err = ClusterError::NoCapacity { pod_id: 7 };
        assert!(err.to_string().contains("pod-7"));
    }
}
