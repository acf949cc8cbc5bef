//! Error taxonomy shared by every bucket backend.

use strum::{AsRefStr, Display, IntoStaticStr};
use thiserror::Error;

/// Type alias for boxed dynamic errors that can be sent across threads.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Type alias for Results with our custom Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of errors that bucket operations can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Network or connection failure; the request may not have been seen.
    Transport,
    /// Credentials were missing or rejected.
    Auth,
    /// The backend rejected the request (bad query, missing bucket, ...).
    Service,
    /// The named object does not exist.
    NotFound,
    /// The backend returned an internally inconsistent response.
    ProtocolViolation,
    /// The request or configuration was invalid before anything was sent.
    InvalidInput,
    /// The operation observed cancellation and stopped.
    Cancelled,
}

impl ErrorKind {
    /// Whether errors of this kind are retryable unless stated otherwise.
    fn default_retryable(self) -> bool {
        matches!(self, Self::Transport)
    }
}

/// A structured error type for bucket operations.
#[derive(Debug, Error)]
#[error("{kind}{}", message.as_ref().map(|m| format!(": {}", m)).unwrap_or_default())]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional error message.
    pub message: Option<String>,
    /// Optional source error.
    #[source]
    pub source: Option<BoxedError>,
    /// Whether a caller-chosen retry policy may retry the operation.
    pub retryable: bool,
}

impl Error {
    /// Creates a new error with the given kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
            retryable: kind.default_retryable(),
        }
    }

    /// Adds a message to this error.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Adds a source error to this error.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Overrides the retryable flag derived from the kind.
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Creates a new transport error.
    pub fn transport() -> Self {
        Self::new(ErrorKind::Transport)
    }

    /// Creates a new authentication error.
    pub fn auth() -> Self {
        Self::new(ErrorKind::Auth)
    }

    /// Creates a new service error.
    pub fn service() -> Self {
        Self::new(ErrorKind::Service)
    }

    /// Creates a new not found error.
    pub fn not_found() -> Self {
        Self::new(ErrorKind::NotFound)
    }

    /// Creates a new protocol violation error.
    pub fn protocol_violation() -> Self {
        Self::new(ErrorKind::ProtocolViolation)
    }

    /// Creates a new invalid input error.
    pub fn invalid_input() -> Self {
        Self::new(ErrorKind::InvalidInput)
    }

    /// Creates a new cancellation error.
    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled)
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error kind as a string.
    pub fn kind_str(&self) -> &'static str {
        self.kind.into()
    }

    /// Whether the caller may retry this operation.
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Shorthand for `kind() == ErrorKind::NotFound`.
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    /// Shorthand for `kind() == ErrorKind::Cancelled`.
    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }
}
