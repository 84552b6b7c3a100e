//! The audit Entry Model and the builder that produces it.
//!
//! This module provides:
//! - `AuditRequestEntry` / `AuditResponseEntry`: the canonical, redacted
//!   representation of one audited event
//! - `EntryBuilder`: maps raw gateway objects onto entries, salting every
//!   sensitive field on the way
//!
//! Entries are safe by construction:
//! - the principal's client token is never copied into an entry
//! - issued tokens and wrapping tokens only appear as salted digests
//! - errors are reduced to their message text

mod builder;
mod entry;

pub use builder::{format_time, EntryBuilder};
pub use entry::{
    AuditAuth, AuditRequest, AuditRequestEntry, AuditResponse, AuditResponseAuth,
    AuditResponseEntry, AuditSecret, AuditWrapInfo, EntryType,
};
