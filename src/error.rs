//! Client error taxonomy.

use thiserror::Error;

use crate::client::Phase;
use crate::config::ValidationError;
use crate::transport::TransportError;

/// Errors surfaced by the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Malformed configuration; nothing was constructed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Empty or whitespace-only token passed to `login`.
    #[error("token can not be empty")]
    EmptyToken,

    /// `login` called while another login is running or the client is ready.
    #[error("login rejected: client is {state}")]
    LoginInProgress { state: Phase },

    /// Gateway resolution or connect failed; every side effect was rolled back.
    #[error("bootstrap failed: {0}")]
    Bootstrap(#[source] TransportError),

    /// A request-channel call made by a fetch operation failed.
    #[error("request failed: {0}")]
    Request(#[source] TransportError),

    /// Raw data could not be turned into a record.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// `destroy` overtook an in-flight login.
    #[error("client was destroyed while logging in")]
    Destroyed,

    /// No scheduler was supplied and none is running.
    #[error("no tokio runtime available; supply a scheduler handle")]
    NoScheduler,

    /// Permission name not known to the permission table.
    #[error("unknown permission '{0}'")]
    UnknownPermission(String),
}

/// Raw data that does not match the record it should become.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not decode {what}: {message}")]
pub struct DecodeError {
    pub what: &'static str,
    pub message: String,
}

impl DecodeError {
    /// Describe a failed decode of `what`.
    pub fn new(what: &'static str, source: &serde_json::Error) -> Self {
        Self {
            what,
            message: source.to_string(),
        }
    }
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClientError::LoginInProgress {
            state: Phase::Connecting,
        };
        assert_eq!(err.to_string(), "login rejected: client is connecting");

        let err = ClientError::Bootstrap(TransportError::Closed("4004".to_string()));
        assert!(err.to_string().contains("4004"));

        let err: ClientError = ValidationError {
            option: "shardCount".to_string(),
            reason: "must be at least 1".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "client option 'shardCount' must be at least 1");
    }
}
