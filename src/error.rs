//! Error types for the Manila provisioner
//!
//! Provides structured error types for claim validation, backend version
//! negotiation, share readiness, export selection, and the Kubernetes and
//! OpenStack adapters.

use std::time::Duration;
use thiserror::Error;

/// Unified error type for the provisioner
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Claim Validation Errors
    // =========================================================================
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("invalid parameter {key:?}")]
    InvalidParameter { key: String },

    // =========================================================================
    // Format Errors
    // =========================================================================
    #[error("invalid microversion: {version:?}")]
    InvalidMicroversion { version: String },

    #[error("client microversion {client:?} is outside the server's supported range [{min:?}, {max:?}]")]
    UnsupportedMicroversion {
        client: String,
        min: String,
        max: String,
    },

    #[error("export location path {path:?} is not in host:path form")]
    InvalidExportPath { path: String },

    // =========================================================================
    // Share Lifecycle Errors
    // =========================================================================
    #[error("share {share_id} did not become available within {timeout:?}")]
    ShareNotAvailable { share_id: String, timeout: Duration },

    #[error("no usable export location: {0}")]
    ExportLocationNotFound(String),

    // =========================================================================
    // Kubernetes Errors
    // =========================================================================
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Resource not found: {kind}/{name}")]
    ResourceNotFound { kind: String, name: String },

    // =========================================================================
    // OpenStack Errors
    // =========================================================================
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OpenStack authentication failed: {0}")]
    Authentication(String),

    #[error("OpenStack API error: {service} - {reason}")]
    OpenStackApi { service: String, reason: String },

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing claim input
    Validation,
    /// Malformed version string or export path
    Format,
    /// Share never reached the ready state
    Timeout,
    /// No usable export location
    NotFound,
    /// Failure reported by Kubernetes, OpenStack or the local system
    External,
}

/// Action the calling controller should take on error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Requeue with exponential backoff
    RequeueWithBackoff,
    /// Requeue after specific duration
    RequeueAfter(Duration),
    /// Don't requeue, wait for changes
    NoRequeue,
}

impl Error {
    /// Taxonomy bucket of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) | Error::InvalidParameter { .. } => ErrorKind::Validation,

            Error::InvalidMicroversion { .. }
            | Error::UnsupportedMicroversion { .. }
            | Error::InvalidExportPath { .. } => ErrorKind::Format,

            Error::ShareNotAvailable { .. } => ErrorKind::Timeout,

            Error::ExportLocationNotFound(_) | Error::ResourceNotFound { .. } => {
                ErrorKind::NotFound
            }

            _ => ErrorKind::External,
        }
    }

    /// Determine what action to take for this error
    pub fn action(&self) -> ErrorAction {
        match self {
            // Transient errors - retry with backoff
            Error::Kube(_) | Error::Http(_) | Error::OpenStackApi { .. } => {
                ErrorAction::RequeueWithBackoff
            }

            // Share may still become available - check again later
            Error::ShareNotAvailable { .. } => ErrorAction::RequeueAfter(Duration::from_secs(30)),

            // Backend may publish its export locations late
            Error::ExportLocationNotFound(_) => ErrorAction::RequeueAfter(Duration::from_secs(60)),

            // Configuration/validation errors - don't retry automatically
            Error::Configuration(_)
            | Error::Authentication(_)
            | Error::Validation(_)
            | Error::InvalidParameter { .. }
            | Error::InvalidMicroversion { .. }
            | Error::UnsupportedMicroversion { .. }
            | Error::InvalidExportPath { .. } => ErrorAction::NoRequeue,

            // All other errors - retry with backoff
            _ => ErrorAction::RequeueWithBackoff,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        !matches!(self.action(), ErrorAction::NoRequeue)
    }

    /// Check if this error is transient
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Kube(_) | Error::Http(_) | Error::OpenStackApi { .. }
        )
    }
}

/// Result type alias for the provisioner
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            Error::InvalidParameter { key: "foo".into() }.kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            Error::InvalidExportPath { path: "nocolon".into() }.kind(),
            ErrorKind::Format
        );
        assert_eq!(
            Error::ShareNotAvailable {
                share_id: "share-1".into(),
                timeout: Duration::from_secs(120),
            }
            .kind(),
            ErrorKind::Timeout
        );
        assert_eq!(
            Error::ExportLocationNotFound("empty".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            Error::OpenStackApi {
                service: "manila".into(),
                reason: "500".into(),
            }
            .kind(),
            ErrorKind::External
        );
    }

    #[test]
    fn test_error_actions() {
        let err = Error::ShareNotAvailable {
            share_id: "share-1".into(),
            timeout: Duration::from_secs(120),
        };
        assert_eq!(
            err.action(),
            ErrorAction::RequeueAfter(Duration::from_secs(30))
        );

        let err = Error::Validation("bad size".into());
        assert_eq!(err.action(), ErrorAction::NoRequeue);

        let err = Error::UnsupportedMicroversion {
            client: "2.21".into(),
            min: "2.0".into(),
            max: "2.15".into(),
        };
        assert_eq!(err.action(), ErrorAction::NoRequeue);
    }

    #[test]
    fn test_error_retryable() {
        let transient = Error::OpenStackApi {
            service: "manila".into(),
            reason: "503 Service Unavailable".into(),
        };
        assert!(transient.is_retryable());
        assert!(transient.is_transient());

        let config_err = Error::Configuration("invalid".into());
        assert!(!config_err.is_retryable());
        assert!(!config_err.is_transient());
    }

    #[test]
    fn test_timeout_message_names_share() {
        let err = Error::ShareNotAvailable {
            share_id: "0b2c".into(),
            timeout: Duration::from_secs(5),
        };
        assert!(err.to_string().contains("0b2c"));
    }
}
