//! Audit entry schema.
//!
//! Field declaration order is the serialized key order. Absent optional
//! parts serialize as `null` and empty durations as `0`, never as missing
//! keys, so every writer sees the same shape.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::request::Operation;

/// Which side of an exchange an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// Recorded before the request is handled
    Request,
    /// Recorded after the response is produced
    Response,
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryType::Request => write!(f, "request"),
            EntryType::Response => write!(f, "response"),
        }
    }
}

/// The principal, as recorded in an entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditAuth {
    /// Human-readable principal name
    pub display_name: String,
    /// Policies in grant order
    pub policies: Vec<String>,
    /// Token metadata with sensitive values salted
    pub metadata: Option<BTreeMap<String, String>>,
}

/// The request, as recorded in an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRequest {
    /// Operation performed
    pub operation: Operation,
    /// Logical path
    pub path: String,
    /// Redacted payload
    pub data: Option<Map<String, Value>>,
    /// Requested wrap TTL in seconds, `0` when not wrapped
    pub wrap_ttl: u64,
    /// Remote peer address, empty when unknown
    pub remote_address: String,
    /// Headers with sensitive values salted
    pub headers: Option<BTreeMap<String, Vec<String>>>,
}

/// One audited request.
///
/// # Example
///
/// ```
/// use audit_core::audit::{AuditAuth, AuditRequest, AuditRequestEntry};
/// use audit_core::Operation;
///
/// let entry = AuditRequestEntry::new(
///     "2015-08-05T13:45:46Z",
///     AuditAuth::default(),
///     AuditRequest {
///         operation: Operation::Read,
///         path: "secret/app".to_string(),
///         data: None,
///         wrap_ttl: 0,
///         remote_address: String::new(),
///         headers: None,
///     },
///     None,
/// );
///
/// let json = serde_json::to_string(&entry).unwrap();
/// assert!(json.starts_with(r#"{"time":"2015-08-05T13:45:46Z","type":"request""#));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRequestEntry {
    /// Formatting time, RFC 3339 UTC with second precision
    pub time: String,
    /// Always [`EntryType::Request`]
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    /// Principal
    pub auth: AuditAuth,
    /// Request
    pub request: AuditRequest,
    /// Error message, `None` when the request did not fail
    pub error: Option<String>,
}

impl AuditRequestEntry {
    /// Creates a request entry.
    pub fn new(
        time: impl Into<String>,
        auth: AuditAuth,
        request: AuditRequest,
        error: Option<String>,
    ) -> Self {
        Self {
            time: time.into(),
            entry_type: EntryType::Request,
            auth,
            request,
            error,
        }
    }
}

/// Lease details of a returned secret.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSecret {
    /// Lease identifier
    pub lease_id: String,
    /// Lease duration in seconds
    pub ttl: u64,
    /// Whether the lease can be renewed
    pub renewable: bool,
}

/// Credentials issued by a response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditResponseAuth {
    /// Salted issued token
    pub client_token: String,
    /// Token accessor, salted unless accessor salting is disabled
    pub accessor: String,
    /// Human-readable principal name
    pub display_name: String,
    /// Policies in grant order
    pub policies: Vec<String>,
    /// Token metadata with sensitive values salted
    pub metadata: Option<BTreeMap<String, String>>,
}

/// Wrapping details of a wrapped response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditWrapInfo {
    /// Wrapping token lifetime in seconds
    pub ttl: u64,
    /// Salted wrapping token
    pub token: String,
    /// Mint time of the wrapping token, RFC 3339 UTC
    pub creation_time: String,
    /// Accessor of the wrapped token, salted unless accessor salting is disabled
    pub wrapped_accessor: String,
}

/// The response, as recorded in an entry.
///
/// `operation` and `path` repeat the originating request so a response entry
/// can be read without its request entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditResponse {
    /// Operation of the originating request
    pub operation: Operation,
    /// Path of the originating request
    pub path: String,
    /// Status code returned to the client
    pub status: u16,
    /// Redacted payload
    pub data: Option<Map<String, Value>>,
    /// Redirect target, empty when there is none
    pub redirect: String,
    /// Lease of the returned secret
    pub secret: Option<AuditSecret>,
    /// Issued credentials
    pub auth: Option<AuditResponseAuth>,
    /// Wrapping details
    pub wrap_info: Option<AuditWrapInfo>,
}

/// One audited response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditResponseEntry {
    /// Formatting time, RFC 3339 UTC with second precision
    pub time: String,
    /// Always [`EntryType::Response`]
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    /// Principal that made the request
    pub auth: AuditAuth,
    /// Response
    pub response: AuditResponse,
    /// Error message, `None` when the request did not fail
    pub error: Option<String>,
}

impl AuditResponseEntry {
    /// Creates a response entry.
    pub fn new(
        time: impl Into<String>,
        auth: AuditAuth,
        response: AuditResponse,
        error: Option<String>,
    ) -> Self {
        Self {
            time: time.into(),
            entry_type: EntryType::Response,
            auth,
            response,
            error,
        }
    }
}
