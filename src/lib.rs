//! Privacy-preserving audit records for a secrets-management gateway.
//!
//! This crate turns request/response events into framed, deterministic audit
//! records while keeping secret material out of the output:
//! - **Salting**: sensitive values are replaced by a keyed HMAC, so equal
//!   values still correlate across records without being recoverable
//! - **Entry model**: a canonical, redacted representation of one event
//! - **Format writers**: pluggable wire formats (JSON, JSONx) sharing one
//!   redaction pipeline
//!
//! # Core Types
//!
//! - [`AuditFormatter`]: builds, encodes and commits one record per call
//! - [`FormatterConfig`]: which fields are sensitive, raw mode, accessor salting
//! - [`format::FormatWriter`]: the wire format contract
//! - [`salt::SaltProvider`]: source of the salt key, resolved per call
//! - [`Secret<T>`]: wrapper that redacts identity secrets in `Debug` output
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use audit_core::{AuditFormatter, Auth, FormatterConfig, Request, SharedSink};
//! use audit_core::format::{new_writer, FormatKind};
//! use audit_core::salt::{LazySaltProvider, MemoryKeyStore, SaltConfig};
//!
//! let provider = Arc::new(LazySaltProvider::new(MemoryKeyStore::new(), SaltConfig::default()));
//! let formatter = AuditFormatter::new(new_writer(FormatKind::Json, provider, "@cee: ").into());
//!
//! let auth = Auth::new("s.KzL0aV3n").with_policies(["root"]);
//! let req = Request::new("update", "secret/app")
//!     .with_remote_addr("127.0.0.1")
//!     .with_wrap_ttl(Duration::from_secs(60))
//!     .with_header("Authorization", "Bearer s.KzL0aV3n");
//!
//! let mut sink = SharedSink::new();
//! formatter
//!     .format_request(&mut sink, &FormatterConfig::default(), Some(&auth), &req, None)
//!     .expect("record written");
//!
//! let lines = sink.lines();
//! assert!(lines[0].starts_with("@cee: {\"time\":"));
//! assert!(!lines[0].contains("s.KzL0aV3n"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod audit;
pub mod format;
pub mod salt;

mod config;
mod error;
mod formatter;
mod redact;
mod request;
mod response;
mod secret;
mod sink;

pub use config::{FormatterConfig, DEFAULT_SENSITIVE_HEADERS, DEFAULT_SENSITIVE_KEYS};
pub use error::{Error, ErrorKind, Result};
pub use format::{FormatKind, FormatWriter};
pub use formatter::AuditFormatter;
pub use redact::{RedactionPolicy, ALWAYS_SENSITIVE_HEADERS, ALWAYS_SENSITIVE_KEYS, MAX_DATA_DEPTH};
pub use request::{Auth, Connection, Operation, Request, RequestWrapInfo};
pub use response::{Response, ResponseWrapInfo, SecretLease};
pub use secret::Secret;
pub use sink::SharedSink;
