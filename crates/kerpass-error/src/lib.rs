//! Unified error type for the KerPass hard core.
//!
//! Every fallible operation across the workspace returns [`Result<T>`]. An
//! [`Error`] carries an [`ErrorKind`] so callers can branch with `is_*`
//! predicates instead of matching on concrete variants, plus an optional
//! source error for the underlying cause chain.
//!
//! `Completion` is deliberately not a member of [`ErrorKind`]: it is the FSM
//! driver's terminal-success sentinel, not a failure, and lives next to
//! `Status` in `kerpass-session` instead.

use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// The eight failure kinds (`Completion` excluded, see module docs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input fails a structural or semantic predicate.
    Validation,
    /// Decode/encode failure in an envelope marshaller.
    Serialization,
    /// AEAD MAC failure, session-id tag mismatch, or PKI mismatch.
    Authentication,
    /// Session-id encoded time outside the live window.
    Expiry,
    /// Noise message or transport ciphertext exceeds 65,535 bytes.
    SizeLimit,
    /// FSM invoked with a message at the wrong side/cursor.
    Sequence,
    /// Transport read/write or context cancellation.
    Io,
    /// Authorization lookup failure or realm mismatch.
    Policy,
}

type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// An error carrying its kind, a human-readable message, and an optional
/// cause. Origin file/line is supplied by `#[track_caller]` on the
/// constructors rather than stored explicitly.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    source: Option<Cause>,
    location: &'static std::panic::Location<'static>,
}

impl Error {
    #[track_caller]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error {
            kind,
            message: message.into(),
            source: None,
            location: std::panic::Location::caller(),
        }
    }

    #[track_caller]
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
            location: std::panic::Location::caller(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[track_caller]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    #[track_caller]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Serialization, message)
    }

    #[track_caller]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    #[track_caller]
    pub fn expiry(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Expiry, message)
    }

    #[track_caller]
    pub fn size_limit(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SizeLimit, message)
    }

    #[track_caller]
    pub fn sequence(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Sequence, message)
    }

    #[track_caller]
    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    #[track_caller]
    pub fn policy(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Policy, message)
    }

    pub fn is_validation(&self) -> bool {
        self.kind == ErrorKind::Validation
    }
    pub fn is_serialization(&self) -> bool {
        self.kind == ErrorKind::Serialization
    }
    pub fn is_authentication(&self) -> bool {
        self.kind == ErrorKind::Authentication
    }
    pub fn is_expiry(&self) -> bool {
        self.kind == ErrorKind::Expiry
    }
    pub fn is_size_limit(&self) -> bool {
        self.kind == ErrorKind::SizeLimit
    }
    pub fn is_sequence(&self) -> bool {
        self.kind == ErrorKind::Sequence
    }
    pub fn is_io(&self) -> bool {
        self.kind == ErrorKind::Io
    }
    pub fn is_policy(&self) -> bool {
        self.kind == ErrorKind::Policy
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}: {} ({})",
            self.kind, self.message, self.location
        )
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_deref().map(|e| e as _)
    }
}

impl From<std::io::Error> for Error {
    #[track_caller]
    fn from(e: std::io::Error) -> Self {
        Error::with_source(ErrorKind::Io, "I/O error", e)
    }
}
