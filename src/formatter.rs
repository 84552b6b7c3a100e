use std::fmt;
use std::io::Write;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::audit::EntryBuilder;
use crate::config::FormatterConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::format::FormatWriter;
use crate::request::{Auth, Request};
use crate::response::Response;
use crate::salt::Salt;

/// Turns raw gateway events into framed audit records.
///
/// Each call resolves the salt, reads the clock once, builds the entry,
/// encodes it with the configured writer and commits the whole record to the
/// output with a single write. A failure at any stage returns before the
/// output is touched, so a record is either written completely or not at all.
///
/// The formatter holds no per-call state and can be shared between threads.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use audit_core::{AuditFormatter, Auth, FormatterConfig, Request};
/// use audit_core::format::{JsonFormatWriter, WriterOptions};
/// use audit_core::salt::{FixedSaltProvider, SaltConfig};
///
/// let provider = FixedSaltProvider::from_key(b"k".to_vec(), SaltConfig::default()).unwrap();
/// let formatter = AuditFormatter::new(Arc::new(JsonFormatWriter::new(
///     Arc::new(provider),
///     WriterOptions::default(),
/// )));
///
/// let auth = Auth::new("s.abcdef").with_policies(["root"]);
/// let req = Request::new("read", "secret/app").with_wrap_ttl(Duration::from_secs(30));
///
/// let mut out = Vec::new();
/// formatter
///     .format_request(&mut out, &FormatterConfig::default(), Some(&auth), &req, None)
///     .unwrap();
///
/// let line = String::from_utf8(out).unwrap();
/// assert!(line.contains(r#""wrap_ttl":30"#));
/// assert!(!line.contains("s.abcdef"));
/// ```
#[derive(Clone)]
pub struct AuditFormatter {
    writer: Arc<dyn FormatWriter>,
    clock: fn() -> DateTime<Utc>,
}

impl AuditFormatter {
    /// Creates a formatter that encodes with `writer`.
    pub fn new(writer: Arc<dyn FormatWriter>) -> Self {
        Self {
            writer,
            clock: Utc::now,
        }
    }

    /// Replaces the clock used to stamp entries.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the writer records are encoded with.
    pub fn writer(&self) -> &dyn FormatWriter {
        self.writer.as_ref()
    }

    /// Formats an incoming request and appends the record to `out`.
    ///
    /// # Errors
    ///
    /// - `SaltUnavailable` if the salt provider fails
    /// - `InvalidOperation` / `MalformedEntryInput` if the event cannot be
    ///   mapped onto an entry
    /// - `SerializationFailure` if the writer cannot encode the entry
    /// - `SinkWriteFailure` if `out` rejects the record; nothing of it was
    ///   accepted and the call may be retried
    /// - `SinkFlushFailure` if the record was written but `out` could not be
    ///   flushed; a retry may record it twice
    pub fn format_request<W: Write + ?Sized>(
        &self,
        out: &mut W,
        config: &FormatterConfig,
        auth: Option<&Auth>,
        req: &Request,
        err: Option<&dyn std::error::Error>,
    ) -> Result<()> {
        let salt = self.salt()?;
        let builder = EntryBuilder::new(config, &salt, (self.clock)());
        let entry = builder.request_entry(auth, req, err)?;
        let record = self.writer.format_request(&entry)?;
        commit(out, &record)
    }

    /// Formats an outgoing response and appends the record to `out`.
    ///
    /// # Errors
    ///
    /// Same as [`format_request`](Self::format_request).
    pub fn format_response<W: Write + ?Sized>(
        &self,
        out: &mut W,
        config: &FormatterConfig,
        auth: Option<&Auth>,
        req: &Request,
        resp: &Response,
        err: Option<&dyn std::error::Error>,
    ) -> Result<()> {
        let salt = self.salt()?;
        let builder = EntryBuilder::new(config, &salt, (self.clock)());
        let entry = builder.response_entry(auth, req, resp, err)?;
        let record = self.writer.format_response(&entry)?;
        commit(out, &record)
    }

    fn salt(&self) -> Result<Arc<Salt>> {
        self.writer.salt().map_err(|e| {
            if e.kind() == ErrorKind::SaltUnavailable {
                e
            } else {
                Error::with_source(ErrorKind::SaltUnavailable, "salt provider failed", e)
            }
        })
    }
}

impl fmt::Debug for AuditFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditFormatter")
            .field("prefix", &self.writer.prefix())
            .finish_non_exhaustive()
    }
}

fn commit<W: Write + ?Sized>(out: &mut W, record: &[u8]) -> Result<()> {
    out.write_all(record)?;
    out.flush().map_err(|e| {
        Error::with_source(
            ErrorKind::SinkFlushFailure,
            "record written but sink flush failed",
            e,
        )
    })
}
