//! Pluggable serialization of audit entries.
//!
//! Every writer produces a complete framed record:
//!
//! ```text
//! [prefix]<serialized entry>\n
//! ```
//!
//! The prefix is emitted verbatim with nothing between it and the body, so a
//! log router can match on it (for example `@cee: ` for CEE-enhanced syslog).
//! Writers also read their own records back, which is how round-trip safety
//! is checked.

mod json;
mod jsonx;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use json::{JsonFormatWriter, WriterOptions};
pub use jsonx::{JsonxFormatWriter, JsonxOptions, JSONX_NAMESPACE};

use crate::audit::{AuditRequestEntry, AuditResponseEntry};
use crate::error::{Error, ErrorKind, Result};
use crate::salt::{Salt, SaltProvider};

/// A wire format for audit entries.
///
/// Implementations hold their own salt provider and framing options, and
/// must be safe to share between threads.
pub trait FormatWriter: Send + Sync {
    /// Serializes a request entry into a framed record.
    ///
    /// # Errors
    ///
    /// Returns `SerializationFailure` if the entry cannot be encoded.
    fn format_request(&self, entry: &AuditRequestEntry) -> Result<Vec<u8>>;

    /// Serializes a response entry into a framed record.
    ///
    /// # Errors
    ///
    /// Returns `SerializationFailure` if the entry cannot be encoded.
    fn format_response(&self, entry: &AuditResponseEntry) -> Result<Vec<u8>>;

    /// Decodes a framed request record produced by this writer.
    ///
    /// # Errors
    ///
    /// Returns `SerializationFailure` if the record is not a request entry
    /// in this format.
    fn parse_request(&self, record: &[u8]) -> Result<AuditRequestEntry>;

    /// Decodes a framed response record produced by this writer.
    ///
    /// # Errors
    ///
    /// Returns `SerializationFailure` if the record is not a response entry
    /// in this format.
    fn parse_response(&self, record: &[u8]) -> Result<AuditResponseEntry>;

    /// Returns the salt entries are built with.
    ///
    /// # Errors
    ///
    /// Returns `SaltUnavailable` if the provider cannot supply a key.
    fn salt(&self) -> Result<Arc<Salt>>;

    /// Returns the literal framing prefix.
    fn prefix(&self) -> &str;
}

/// Available wire formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    /// One JSON object per line
    #[default]
    Json,
    /// The JSONx XML rendering of the same document
    Jsonx,
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatKind::Json => write!(f, "json"),
            FormatKind::Jsonx => write!(f, "jsonx"),
        }
    }
}

/// Explicit options for one wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatOptions {
    /// Options for [`JsonFormatWriter`]
    Json(WriterOptions),
    /// Options for [`JsonxFormatWriter`]
    Jsonx(JsonxOptions),
}

impl FormatOptions {
    /// Returns the default options of `kind` with the given prefix.
    pub fn defaults(kind: FormatKind, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        match kind {
            FormatKind::Json => Self::Json(WriterOptions {
                prefix,
                ..WriterOptions::default()
            }),
            FormatKind::Jsonx => Self::Jsonx(JsonxOptions {
                prefix,
                ..JsonxOptions::default()
            }),
        }
    }

    /// Returns the format these options configure.
    pub fn kind(&self) -> FormatKind {
        match self {
            Self::Json(_) => FormatKind::Json,
            Self::Jsonx(_) => FormatKind::Jsonx,
        }
    }

    /// Returns the framing prefix.
    pub fn prefix(&self) -> &str {
        match self {
            Self::Json(options) => &options.prefix,
            Self::Jsonx(options) => &options.prefix,
        }
    }
}

/// Builds the writer described by `options`.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use audit_core::format::{build_writer, FormatOptions, JsonxOptions};
/// use audit_core::salt::{FixedSaltProvider, SaltConfig};
///
/// let provider = Arc::new(FixedSaltProvider::from_key(b"k".to_vec(), SaltConfig::default()).unwrap());
/// let writer = build_writer(
///     FormatOptions::Jsonx(JsonxOptions { prefix: "@cee: ".to_string(), xml_declaration: false }),
///     provider,
/// );
/// assert_eq!(writer.prefix(), "@cee: ");
/// ```
pub fn build_writer(options: FormatOptions, provider: Arc<dyn SaltProvider>) -> Box<dyn FormatWriter> {
    tracing::debug!(
        target: "audit_core::format",
        format = %options.kind(),
        prefixed = !options.prefix().is_empty(),
        "building audit format writer"
    );
    match options {
        FormatOptions::Json(options) => Box::new(JsonFormatWriter::new(provider, options)),
        FormatOptions::Jsonx(options) => Box::new(JsonxFormatWriter::new(provider, options)),
    }
}

/// Builds a writer for `kind` with that format's default options.
///
/// Shorthand for [`build_writer`] with [`FormatOptions::defaults`]: compact
/// JSON, or JSONx with an XML declaration. Use [`build_writer`] to choose
/// the options explicitly.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use audit_core::format::{new_writer, FormatKind};
/// use audit_core::salt::{FixedSaltProvider, SaltConfig};
///
/// let provider = Arc::new(FixedSaltProvider::from_key(b"k".to_vec(), SaltConfig::default()).unwrap());
/// let writer = new_writer(FormatKind::Json, provider, "@cee: ");
/// assert_eq!(writer.prefix(), "@cee: ");
/// ```
pub fn new_writer(
    kind: FormatKind,
    provider: Arc<dyn SaltProvider>,
    prefix: impl Into<String>,
) -> Box<dyn FormatWriter> {
    build_writer(FormatOptions::defaults(kind, prefix), provider)
}

/// Joins prefix, body and the line terminator into one record.
pub(crate) fn frame(prefix: &str, body: &[u8]) -> Vec<u8> {
    let mut record = Vec::with_capacity(prefix.len() + body.len() + 1);
    record.extend_from_slice(prefix.as_bytes());
    record.extend_from_slice(body);
    record.push(b'\n');
    record
}

/// Strips the prefix and the trailing line terminator from a record.
pub(crate) fn unframe<'r>(prefix: &str, record: &'r [u8]) -> Result<&'r [u8]> {
    let body = record.strip_prefix(prefix.as_bytes()).ok_or_else(|| {
        Error::new(
            ErrorKind::SerializationFailure,
            "record does not start with the configured prefix",
        )
    })?;
    Ok(body.strip_suffix(b"\n").unwrap_or(body))
}
