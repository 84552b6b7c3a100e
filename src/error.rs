use std::fmt;

/// Convenience alias for results produced by this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or emitting an audit record.
///
/// Every failure aborts the format call before anything reaches the output
/// sink. Messages never carry raw input values, so an `Error` is always safe
/// to display.
///
/// # Examples
///
/// ```
/// use audit_core::{Error, ErrorKind};
///
/// let error = Error::new(ErrorKind::InvalidOperation, "unknown operation \"frobnicate\"");
/// assert_eq!(error.kind(), ErrorKind::InvalidOperation);
/// assert!(error.to_string().contains("invalid operation"));
/// ```
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Error {
    /// Creates a new error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new error that wraps an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn salt_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SaltUnavailable, message)
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedEntryInput, message)
    }

    pub(crate) fn serialization(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        Self::with_source(ErrorKind::SerializationFailure, message, source)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "audit error ({}): {}", self.kind, self.message)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Kind of audit formatting error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The salt-key provider could not supply a key.
    SaltUnavailable,
    /// The request carried an operation outside the known set.
    InvalidOperation,
    /// The raw event could not be mapped onto an audit entry.
    MalformedEntryInput,
    /// The writer could not encode (or decode) an audit entry.
    SerializationFailure,
    /// The output sink rejected the framed record.
    SinkWriteFailure,
    /// The framed record was written in full but flushing the sink failed.
    ///
    /// The record may already be durable; retrying can duplicate it.
    SinkFlushFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SaltUnavailable => write!(f, "salt unavailable"),
            Self::InvalidOperation => write!(f, "invalid operation"),
            Self::MalformedEntryInput => write!(f, "malformed entry input"),
            Self::SerializationFailure => write!(f, "serialization failure"),
            Self::SinkWriteFailure => write!(f, "sink write failure"),
            Self::SinkFlushFailure => write!(f, "sink flush failure"),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::SinkWriteFailure, err.to_string(), err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn error_creation() {
        let error = Error::new(ErrorKind::MalformedEntryInput, "missing operation");
        assert_eq!(error.kind(), ErrorKind::MalformedEntryInput);
        assert_eq!(error.message(), "missing operation");
        assert!(error.source().is_none());
    }

    #[test]
    fn error_display() {
        let error = Error::new(ErrorKind::SaltUnavailable, "key store offline");
        let output = error.to_string();
        assert!(output.contains("salt unavailable"));
        assert!(output.contains("key store offline"));
    }

    #[test]
    fn io_error_becomes_sink_failure_with_source() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let error = Error::from(io);

        assert_eq!(error.kind(), ErrorKind::SinkWriteFailure);
        let source = error.source().expect("io error kept as source");
        assert_eq!(source.to_string(), "pipe closed");
    }

    #[test]
    fn error_kinds_display() {
        assert_eq!(ErrorKind::SaltUnavailable.to_string(), "salt unavailable");
        assert_eq!(ErrorKind::InvalidOperation.to_string(), "invalid operation");
        assert_eq!(
            ErrorKind::MalformedEntryInput.to_string(),
            "malformed entry input"
        );
        assert_eq!(
            ErrorKind::SerializationFailure.to_string(),
            "serialization failure"
        );
        assert_eq!(ErrorKind::SinkWriteFailure.to_string(), "sink write failure");
        assert_eq!(ErrorKind::SinkFlushFailure.to_string(), "sink flush failure");
    }
}
