//! Central error types for the container version operator
//!
//! Uses `thiserror` for ergonomic, type-safe error handling with
//! automatic `Display` and `Error` trait implementations.

use thiserror::Error;

/// Central error type for the container version operator
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error from kube-rs
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// HTTP request error (from reqwest)
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// ContainerVersion spec validation error
    #[error("Spec validation error: {0}")]
    SpecError(String),

    /// Image on the live container is not `repository:tag`
    #[error("Invalid image found on container: {image}")]
    InvalidImageFormat { image: String },

    /// Live container runs an image from a different repository
    #[error("Image repository mismatch: present {present}, requested {requested}")]
    RepositoryMismatch { present: String, requested: String },

    /// Candidate tag was rejected by the tag validator
    #[error("Candidate tag {tag} failed validation: {reason}")]
    ValidationFailed { tag: String, reason: String },

    /// No container with the requested name exists in the pod template
    #[error("No container of name {container} was found in workload {workload}")]
    ContainerNotFound { container: String, workload: String },

    /// Optimistic-concurrency rejection raised outside the Kubernetes client
    #[error("Write conflict: {0}")]
    Conflict(String),

    /// Retry budget ran out; carries the last error seen
    #[error("Gave up after {attempts} attempt(s): {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    /// Writing a history record failed
    #[error("Failed to save history: {0}")]
    HistoryWriteFailed(String),

    /// Resource not found in the cluster
    #[error("Resource not found: {kind}/{name} in namespace {namespace}")]
    NotFound {
        kind: String,
        name: String,
        namespace: String,
    },
}

/// Result type alias for operator operations
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// True when the error is the API server's optimistic-concurrency signal
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::KubeError(kube::Error::Api(resp)) => resp.code == 409,
            Error::Conflict(_) => true,
            _ => false,
        }
    }

    /// Check if this error type should trigger a retry
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Error::KubeError(_) | Error::HttpError(_) | Error::Conflict(_)
        )
    }

    /// Convert to a human-readable message for status updates
    pub fn status_message(&self) -> String {
        match self {
            Error::KubeError(e) => format!("Kubernetes error: {}", e),
            Error::InvalidImageFormat { .. } => "Invalid image on container".to_string(),
            Error::RepositoryMismatch { .. } => "Image repository mismatch was found".to_string(),
            Error::ValidationFailed { .. } => "Candidate version failed validation".to_string(),
            Error::ContainerNotFound { .. } => "No matching container found".to_string(),
            Error::RetryExhausted { attempts, .. } => {
                format!("Failed to update workload after {} attempt(s)", attempts)
            }
            _ => self.to_string(),
        }
    }
}
