//! Error types for the campus console data layer.
//!
//! Every error that can reach a user names the operation it came from, so a
//! view can tell a "try again" failure (network, timeout) from a "this cannot
//! work" failure (unsupported operation, validation).

use thiserror::Error;

/// Result type alias using campus' Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root cause category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No response was received.
    Network,
    /// The request did not complete in time.
    Timeout,
    /// The server answered with a non-success status.
    Application,
    /// The server rejected the credentials (HTTP 401).
    Unauthorized,
    /// No backend capability exists for the requested operation.
    Unsupported,
    /// Input was rejected before any request was made.
    Validation,
    /// A payload could not be interpreted at all.
    DataShape,
    /// Client configuration is invalid.
    Config,
    /// Persisted client state could not be read or written.
    Storage,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Timeout => write!(f, "timeout"),
            Self::Application => write!(f, "application"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::Unsupported => write!(f, "unsupported"),
            Self::Validation => write!(f, "validation"),
            Self::DataShape => write!(f, "data_shape"),
            Self::Config => write!(f, "config"),
            Self::Storage => write!(f, "storage"),
        }
    }
}

/// Core error type for campus operations.
#[derive(Error, Debug)]
pub enum Error {
    /// No response received from the server
    #[error("{operation}: cannot reach server: {message}")]
    Network { operation: String, message: String },

    /// Request timed out
    #[error("{operation}: request timed out")]
    Timeout { operation: String },

    /// Server returned a non-success status with a body
    #[error("{operation}: server returned {status}: {message}")]
    Application {
        operation: String,
        status: u16,
        message: String,
    },

    /// Credentials missing, expired or rejected
    #[error("{operation}: unauthorized")]
    Unauthorized { operation: String },

    /// The backend offers no endpoint for this operation
    #[error("{operation}: not supported: {capability}")]
    Unsupported {
        operation: String,
        capability: String,
    },

    /// Invalid input, rejected client-side
    #[error("Validation error: {0}")]
    Validation(String),

    /// Payload could not be interpreted
    #[error("Data shape error: {0}")]
    DataShape(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Persisted state error
    #[error("Storage error: {0}")]
    Storage(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a network error for an operation.
    pub fn network(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Network {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Build an unsupported-operation error naming the missing capability.
    pub fn unsupported(operation: impl Into<String>, capability: impl Into<String>) -> Self {
        Error::Unsupported {
            operation: operation.into(),
            capability: capability.into(),
        }
    }

    /// Root cause category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Network { .. } => ErrorKind::Network,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Application { .. } => ErrorKind::Application,
            Error::Unauthorized { .. } => ErrorKind::Unauthorized,
            Error::Unsupported { .. } => ErrorKind::Unsupported,
            Error::Validation(_) => ErrorKind::Validation,
            Error::DataShape(_) => ErrorKind::DataShape,
            Error::Config(_) => ErrorKind::Config,
            Error::Storage(_) | Error::Io(_) => ErrorKind::Storage,
        }
    }

    /// Only transport-level failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Network | ErrorKind::Timeout)
    }

    /// Operation name, for errors produced by a named operation.
    pub fn operation(&self) -> Option<&str> {
        match self {
            Error::Network { operation, .. }
            | Error::Timeout { operation }
            | Error::Application { operation, .. }
            | Error::Unauthorized { operation }
            | Error::Unsupported { operation, .. } => Some(operation),
            _ => None,
        }
    }

    /// HTTP status for application errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Application { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Message suitable for showing to a console user.
    pub fn user_message(&self) -> String {
        let op = self.operation().unwrap_or("request");
        match self {
            Error::Network { .. } => {
                format!("{op}: cannot reach server, check your connection and try again")
            }
            Error::Timeout { .. } => format!("{op}: the server took too long, try again"),
            Error::Application {
                status, message, ..
            } => format!("{op} failed ({status}): {message}"),
            Error::Unauthorized { .. } => {
                format!("{op}: your session has expired, please sign in again")
            }
            Error::Unsupported { capability, .. } => {
                format!("{op} is not available: the server does not support {capability}")
            }
            Error::Validation(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::DataShape(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_network() {
        let err = Error::network("list_subjects", "connection refused");
        assert_eq!(
            err.to_string(),
            "list_subjects: cannot reach server: connection refused"
        );
    }

    #[test]
    fn test_error_display_application() {
        let err = Error::Application {
            operation: "create_goal".to_string(),
            status: 400,
            message: "Description is required".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "create_goal: server returned 400: Description is required"
        );
    }

    #[test]
    fn test_error_display_unsupported() {
        let err = Error::unsupported("delete_user", "user deletion");
        assert_eq!(err.to_string(), "delete_user: not supported: user deletion");
    }

    #[test]
    fn test_only_transport_errors_retryable() {
        assert!(Error::network("op", "reset").is_retryable());
        assert!(Error::Timeout {
            operation: "op".to_string()
        }
        .is_retryable());
        assert!(!Error::Application {
            operation: "op".to_string(),
            status: 503,
            message: "unavailable".to_string()
        }
        .is_retryable());
        assert!(!Error::unsupported("op", "x").is_retryable());
        assert!(!Error::Validation("bad".to_string()).is_retryable());
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(Error::network("a", "b").kind(), ErrorKind::Network);
        assert_eq!(
            Error::Unauthorized {
                operation: "a".to_string()
            }
            .kind(),
            ErrorKind::Unauthorized
        );
        assert_eq!(Error::Config("x".to_string()).kind(), ErrorKind::Config);
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(Error::from(io).kind(), ErrorKind::Storage);
    }

    #[test]
    fn test_operation_and_status() {
        let err = Error::Application {
            operation: "update_subject".to_string(),
            status: 409,
            message: "conflict".to_string(),
        };
        assert_eq!(err.operation(), Some("update_subject"));
        assert_eq!(err.status(), Some(409));
        assert_eq!(Error::Validation("x".to_string()).operation(), None);
    }

    #[test]
    fn test_user_message_distinguishes_retry_from_terminal() {
        let retry = Error::network("list_users", "dns").user_message();
        assert!(retry.contains("try again"));

        let terminal = Error::unsupported("set_user_status", "user status changes").user_message();
        assert!(terminal.contains("not available"));
        assert!(terminal.contains("user status changes"));
        assert!(!terminal.contains("try again"));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        assert_eq!(err.kind(), ErrorKind::DataShape);
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
