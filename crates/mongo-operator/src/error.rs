use thiserror::Error;

#[derive(Error, Debug)]
pub enum OperatorError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    #[error("Invalid quantity '{value}' for {field}")]
    InvalidQuantity { field: &'static str, value: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Store operation failed: {0}")]
    Store(String),

    #[error("Object is missing {0}")]
    MissingObjectKey(&'static str),
}

pub type Result<T> = std::result::Result<T, OperatorError>;

impl OperatorError {
    /// Whether this error is transient and the reconciliation should be retried soon.
    pub fn is_transient(&self) -> bool {
        matches!(self, OperatorError::Kube(_) | OperatorError::Store(_))
    }

    /// Whether this error is a lookup miss.
    pub fn is_not_found(&self) -> bool {
        match self {
            OperatorError::NotFound { .. } => true,
            OperatorError::Kube(e) => is_kube_not_found(e),
            _ => false,
        }
    }
}

/// Check if a kube::Error is a 404 Not Found.
pub fn is_kube_not_found(e: &kube::Error) -> bool {
    matches!(
        e,
        kube::Error::Api(kube::core::ErrorResponse { code: 404, .. })
    )
}
