use serde::Serialize;
use std::fmt;

/// Client-facing error category.
///
/// Every [`ServiceError`] belongs to exactly one category, and the category alone
/// decides how the failure is surfaced to the user (see [`ErrorPrompt`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::AsRefStr)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Connectivity lost or the client is in offline mode
    NetworkError,
    /// The server took too long to answer
    TimeoutError,
    /// 5xx or otherwise unexpected server fault
    BackendError,
    /// The referenced entity no longer exists
    NotFound,
    /// Session expired or credentials rejected
    Unauthorized,
    /// Client-side rule failure, never sent to the server
    Validation,
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("You are offline: {0}")]
    Offline(String),

    #[error("Timeout error: {0}")]
    TimeoutError(String),

    #[error("Backend error ({status}): {message}")]
    BackendError { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Action already in progress: {0}")]
    Busy(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::SerializationError(err.to_string())
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return ServiceError::TimeoutError(err.to_string());
        }
        if let Some(status) = err.status() {
            return ServiceError::from_status(status.as_u16(), err.to_string());
        }
        if err.is_decode() {
            return ServiceError::BackendError {
                status: 0,
                message: format!("Malformed response: {}", err),
            };
        }
        if err.is_builder() {
            return ServiceError::Other(anyhow::anyhow!(err.to_string()));
        }
        ServiceError::NetworkError(err.to_string())
    }
}

impl ServiceError {
    /// Maps a non-success HTTP status to the matching error.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => ServiceError::Unauthorized(message),
            404 | 410 => ServiceError::NotFound(message),
            408 | 504 => ServiceError::TimeoutError(message),
            _ => ServiceError::BackendError { status, message },
        }
    }

    /// Returns the client-facing category for this error.
    /// This is the single source of truth for error-to-prompt mapping.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NetworkError(_) | Self::Offline(_) => ErrorKind::NetworkError,
            Self::TimeoutError(_) => ErrorKind::TimeoutError,
            Self::BackendError { .. } | Self::SerializationError(_) | Self::Other(_) => {
                ErrorKind::BackendError
            }
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::ValidationError(_)
            | Self::InvalidStatus(_)
            | Self::Forbidden(_)
            | Self::InsufficientStock(_)
            | Self::Busy(_) => ErrorKind::Validation,
        }
    }

    /// Whether offering "Retry" can possibly change the outcome.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NetworkError | ErrorKind::TimeoutError | ErrorKind::BackendError
        )
    }

    /// True for failures that were decided locally, before any network call.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Offline(_)) || self.kind() == ErrorKind::Validation
    }

    /// Returns the message suitable for showing to the user.
    /// Server faults return a generic message to avoid leaking backend details.
    pub fn user_message(&self) -> String {
        match self {
            Self::NetworkError(_) => {
                "Unable to reach the server. Check your connection and try again.".to_string()
            }
            Self::Offline(_) => {
                "You are offline. Reconnect to the network before continuing.".to_string()
            }
            Self::TimeoutError(_) => "The server is taking too long to respond.".to_string(),
            Self::BackendError { .. } | Self::SerializationError(_) | Self::Other(_) => {
                "The server could not complete the request.".to_string()
            }
            Self::NotFound(msg) => format!("{} no longer exists.", msg),
            Self::Unauthorized(_) => "Your session has expired. Please sign in again.".to_string(),
            Self::ValidationError(msg)
            | Self::InvalidStatus(msg)
            | Self::Forbidden(msg)
            | Self::InsufficientStock(msg)
            | Self::Busy(msg) => msg.clone(),
        }
    }
}

/// How an error is presented to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "prompt", rename_all = "snake_case")]
pub enum ErrorPrompt {
    /// Shown next to the offending input; nothing to retry.
    Inline { kind: ErrorKind, message: String },
    /// Confirmation prompt whose confirm action re-runs the same closure.
    Retry { kind: ErrorKind, message: String },
    /// Dismiss-only notice.
    Dismiss { kind: ErrorKind, message: String },
}

impl ErrorPrompt {
    pub fn for_error(error: &ServiceError) -> Self {
        let kind = error.kind();
        let message = error.user_message();
        match kind {
            ErrorKind::Validation => ErrorPrompt::Inline { kind, message },
            ErrorKind::NetworkError | ErrorKind::TimeoutError | ErrorKind::BackendError => {
                ErrorPrompt::Retry { kind, message }
            }
            ErrorKind::NotFound | ErrorKind::Unauthorized => ErrorPrompt::Dismiss { kind, message },
        }
    }

    pub fn offers_retry(&self) -> bool {
        matches!(self, ErrorPrompt::Retry { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            ErrorPrompt::Inline { message, .. }
            | ErrorPrompt::Retry { message, .. }
            | ErrorPrompt::Dismiss { message, .. } => message,
        }
    }
}

impl fmt::Display for ErrorPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorPrompt::Retry { message, .. } => write!(f, "{} [Retry]", message),
            ErrorPrompt::Inline { message, .. } | ErrorPrompt::Dismiss { message, .. } => {
                write!(f, "{}", message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn status_mapping_follows_taxonomy() {
        assert_eq!(ServiceError::from_status(401, "x").kind(), ErrorKind::Unauthorized);
        assert_eq!(ServiceError::from_status(403, "x").kind(), ErrorKind::Unauthorized);
        assert_eq!(ServiceError::from_status(404, "x").kind(), ErrorKind::NotFound);
        assert_eq!(ServiceError::from_status(504, "x").kind(), ErrorKind::TimeoutError);
        assert_eq!(ServiceError::from_status(500, "x").kind(), ErrorKind::BackendError);
        assert_eq!(ServiceError::from_status(422, "x").kind(), ErrorKind::BackendError);
    }

    #[test]
    fn retryability_by_kind() {
        assert!(ServiceError::NetworkError("down".into()).is_retryable());
        assert!(ServiceError::TimeoutError("slow".into()).is_retryable());
        assert!(ServiceError::BackendError {
            status: 502,
            message: "bad gateway".into()
        }
        .is_retryable());

        assert!(!ServiceError::NotFound("Transfer TR-1".into()).is_retryable());
        assert!(!ServiceError::Unauthorized("expired".into()).is_retryable());
        assert!(!ServiceError::ValidationError("bad".into()).is_retryable());
        assert!(!ServiceError::Busy("accept".into()).is_retryable());
    }

    #[test]
    fn prompts_match_propagation_policy() {
        assert_matches!(
            ErrorPrompt::for_error(&ServiceError::ValidationError("Reason is required".into())),
            ErrorPrompt::Inline { kind: ErrorKind::Validation, .. }
        );
        assert_matches!(
            ErrorPrompt::for_error(&ServiceError::TimeoutError("slow".into())),
            ErrorPrompt::Retry { kind: ErrorKind::TimeoutError, .. }
        );
        assert_matches!(
            ErrorPrompt::for_error(&ServiceError::NotFound("Transfer TR-9".into())),
            ErrorPrompt::Dismiss { kind: ErrorKind::NotFound, .. }
        );
        assert_matches!(
            ErrorPrompt::for_error(&ServiceError::Unauthorized("expired".into())),
            ErrorPrompt::Dismiss { kind: ErrorKind::Unauthorized, .. }
        );
    }

    #[test]
    fn backend_message_hides_server_details() {
        let err = ServiceError::BackendError {
            status: 500,
            message: "NullReferenceException at line 42".into(),
        };
        assert_eq!(err.user_message(), "The server could not complete the request.");

        let prompt = ErrorPrompt::for_error(&err);
        assert!(prompt.offers_retry());
        assert!(!prompt.message().contains("NullReference"));
    }

    #[test]
    fn local_errors_are_flagged() {
        assert!(ServiceError::Offline("submit".into()).is_local());
        assert!(ServiceError::InvalidStatus("completed".into()).is_local());
        assert!(!ServiceError::NetworkError("reset".into()).is_local());
    }
}
