//! Error types for the IMAP session engine.

use std::time::Duration;

use thiserror::Error;

use crate::types::{ResponseCode, Status};

/// Boxed error carried as the cause of a secure-channel failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur during IMAP operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The transport could not be established, or was lost.
    #[error("Connect failure: {message}")]
    ConnectFailure {
        /// Description of what went wrong.
        message: String,
        /// Underlying I/O error, if any.
        #[source]
        source: Option<std::io::Error>,
    },

    /// No response within the configured bound; the transport was aborted.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// TLS handshake or STARTTLS negotiation failed.
    #[error("Secure channel failure: {message}")]
    SecureChannelFailure {
        /// Description of what went wrong.
        message: String,
        /// The inner cause.
        #[source]
        source: BoxError,
    },

    /// Protocol preconditions were not met before any command was sent.
    #[error("Request canceled: {0}")]
    RequestCanceled(String),

    /// The server answered `NO` or `BAD`.
    #[error("Server returned {status}: {text}")]
    Protocol {
        /// Completion status (`NO` or `BAD`).
        status: Status,
        /// Response code, if the server supplied one.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },

    /// Malformed server data at a known position.
    #[error("Parse error at position {position}: {message}")]
    Parse {
        /// Byte position where the error occurred.
        position: usize,
        /// Description of what went wrong.
        message: String,
    },

    /// Unexpected server data or an internal invariant violation.
    #[error("Unknown error: {0}")]
    Unknown(String),

    /// I/O error raised below the session layer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The operation is not valid in the current session state.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// An argument was rejected.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is not supported for this value or server.
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Transport never established or lost.
    ConnectFailure,
    /// No response within the bound.
    Timeout,
    /// TLS failure.
    SecureChannelFailure,
    /// Preconditions unmet before sending.
    RequestCanceled,
    /// Server refused with `NO`/`BAD`.
    ProtocolError,
    /// Malformed or unexpected data.
    UnknownError,
    /// Invalid use of the session.
    InvalidOperation,
    /// Invalid argument.
    InvalidArgument,
    /// Unsupported operation.
    Unsupported,
}

impl Error {
    pub(crate) fn connect(message: impl Into<String>) -> Self {
        Self::ConnectFailure {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn secure_channel(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::SecureChannelFailure {
            message: message.into(),
            source: source.into(),
        }
    }

    /// Returns the classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConnectFailure { .. } => ErrorKind::ConnectFailure,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Io(e) if is_timeout(e) => ErrorKind::Timeout,
            Self::Io(_) => ErrorKind::ConnectFailure,
            Self::SecureChannelFailure { .. } => ErrorKind::SecureChannelFailure,
            Self::RequestCanceled(_) => ErrorKind::RequestCanceled,
            Self::Protocol { .. } => ErrorKind::ProtocolError,
            Self::Parse { .. } | Self::Unknown(_) => ErrorKind::UnknownError,
            Self::InvalidOperation(_) => ErrorKind::InvalidOperation,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Unsupported(_) => ErrorKind::Unsupported,
        }
    }

    /// Returns the response code carried by a protocol error.
    #[must_use]
    pub const fn response_code(&self) -> Option<&ResponseCode> {
        match self {
            Self::Protocol { code, .. } => code.as_ref(),
            _ => None,
        }
    }

    /// True when the server refused the supplied credentials.
    #[must_use]
    pub fn is_retryable_with_credentials(&self) -> bool {
        matches!(
            self,
            Self::Protocol {
                status: Status::No,
                code: None
                    | Some(
                        ResponseCode::AuthenticationFailed
                            | ResponseCode::AuthorizationFailed
                            | ResponseCode::Expired
                    ),
                ..
            }
        )
    }

    /// True when the same request may succeed later on a new session.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Timeout | ErrorKind::ConnectFailure
        ) || matches!(self.response_code(), Some(ResponseCode::Unavailable | ResponseCode::InUse))
    }

    /// True when the session that produced this error must be discarded.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ConnectFailure
                | ErrorKind::Timeout
                | ErrorKind::SecureChannelFailure
                | ErrorKind::UnknownError
        )
    }
}

pub(crate) fn is_timeout(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
    )
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_carries_code() {
        let err = Error::Protocol {
            status: Status::No,
            code: Some(ResponseCode::TryCreate),
            text: "no such mailbox".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::ProtocolError);
        assert_eq!(err.response_code(), Some(&ResponseCode::TryCreate));
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "Server returned NO: no such mailbox");
    }

    #[test]
    fn test_io_timeout_is_classified() {
        let err = Error::Io(std::io::Error::new(std::io::ErrorKind::TimedOut, "slow"));
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.is_transient());
        assert!(err.is_fatal());
    }

    #[test]
    fn test_credentials_retry() {
        let err = Error::Protocol {
            status: Status::No,
            code: Some(ResponseCode::AuthenticationFailed),
            text: "bad password".to_string(),
        };
        assert!(err.is_retryable_with_credentials());

        let bad = Error::Protocol {
            status: Status::Bad,
            code: None,
            text: "syntax".to_string(),
        };
        assert!(!bad.is_retryable_with_credentials());
    }

    #[test]
    fn test_secure_channel_source() {
        use std::error::Error as _;

        let inner = std::io::Error::other("handshake");
        let err = Error::secure_channel("STARTTLS failed", inner);
        assert_eq!(err.kind(), ErrorKind::SecureChannelFailure);
        assert_eq!(err.source().unwrap().to_string(), "handshake");
    }
}
