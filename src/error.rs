//! Error types surfaced at the store boundary.
//!
//! Infrastructure code (SQLite worker, migrations, settings) works with
//! `anyhow` and is converted into these types where it meets a store.

use thiserror::Error;

/// Broad classification of a failed backend round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// The request never produced a response.
    Network,
    /// Missing session, or a row-level policy rejected the request.
    Unauthorized,
    /// The response (or the outgoing payload) did not match the expected shape.
    Decode,
    /// The backend answered with an error of its own.
    Backend,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct RemoteRequestError {
    pub kind: RemoteErrorKind,
    pub message: String,
}

impl RemoteRequestError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Network, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Unauthorized, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Decode, message)
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Backend, message)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind == RemoteErrorKind::Unauthorized
    }
}

impl From<reqwest::Error> for RemoteRequestError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::decode(err.to_string())
        } else {
            Self::network(err.to_string())
        }
    }
}

pub type RemoteResult<T> = Result<T, RemoteRequestError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("session expired, sign in again")]
    SessionExpired,
    #[error("an account with this email already exists")]
    AlreadyRegistered,
    #[error("account created; confirm the email address before signing in")]
    ConfirmationPending,
    #[error("{0}")]
    InvalidInput(String),
    #[error(transparent)]
    Remote(#[from] RemoteRequestError),
}
