//! Request-side inputs supplied by the gateway's request pipeline.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, ErrorKind};
use crate::secret::Secret;

/// The kind of operation a request performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Create a new entry at a path
    Create,
    /// Read an entry
    Read,
    /// Update (or create) an entry
    Update,
    /// Delete an entry
    Delete,
    /// List the children of a path
    List,
    /// Request help text for a path
    Help,
    /// Renew a lease
    Renew,
    /// Revoke a lease
    Revoke,
    /// Roll back a partially applied change
    Rollback,
}

impl Operation {
    /// Returns the wire name of the operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::List => "list",
            Self::Help => "help",
            Self::Renew => "renew",
            Self::Revoke => "revoke",
            Self::Rollback => "rollback",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = Error;

    /// Parses a wire operation name.
    ///
    /// An empty name is a missing field (`MalformedEntryInput`); any other
    /// unknown name is `InvalidOperation`. Names are never coerced.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "read" => Ok(Self::Read),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "list" => Ok(Self::List),
            "help" => Ok(Self::Help),
            "renew" => Ok(Self::Renew),
            "revoke" => Ok(Self::Revoke),
            "rollback" => Ok(Self::Rollback),
            "" => Err(Error::malformed("request operation is missing")),
            other => Err(Error::new(
                ErrorKind::InvalidOperation,
                format!("unknown operation {:?}", other),
            )),
        }
    }
}

/// The authenticated principal behind a request.
///
/// # Examples
///
/// ```
/// use audit_core::Auth;
///
/// let auth = Auth::new("s.client-token")
///     .with_display_name("approle-ci")
///     .with_policies(["default", "deploy"]);
///
/// assert_eq!(auth.policies, vec!["default", "deploy"]);
/// assert_eq!(format!("{:?}", auth.client_token), "[REDACTED]");
/// ```
#[derive(Debug)]
pub struct Auth {
    /// Token the principal authenticated with
    pub client_token: Secret<String>,
    /// Handle that references the token without granting its privileges
    pub accessor: String,
    /// Human-readable principal name
    pub display_name: String,
    /// Policies attached to the token, in grant order
    pub policies: Vec<String>,
    /// Token metadata, `None` when the token carries none
    pub metadata: Option<BTreeMap<String, String>>,
}

impl Auth {
    /// Creates an auth record for the given client token.
    pub fn new(client_token: impl Into<String>) -> Self {
        Self {
            client_token: Secret::new(client_token.into()),
            ..Self::default()
        }
    }

    /// Sets the token accessor.
    pub fn with_accessor(mut self, accessor: impl Into<String>) -> Self {
        self.accessor = accessor.into();
        self
    }

    /// Sets the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Sets the policy list.
    pub fn with_policies<I, S>(mut self, policies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policies = policies.into_iter().map(Into::into).collect();
        self
    }

    /// Adds one metadata pair, creating the map if needed.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }
}

impl Default for Auth {
    fn default() -> Self {
        Self {
            client_token: Secret::new(String::new()),
            accessor: String::new(),
            display_name: String::new(),
            policies: Vec::new(),
            metadata: None,
        }
    }
}

/// Network details of the connection a request arrived on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Connection {
    /// Remote peer address
    pub remote_addr: String,
}

/// Response-wrapping parameters requested by the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestWrapInfo {
    /// Lifetime of the wrapping token
    pub ttl: Duration,
}

/// A request as seen by the gateway.
///
/// `operation` is kept as the raw wire string; it is validated when the
/// audit entry is built.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use audit_core::Request;
///
/// let req = Request::new("update", "secret/app")
///     .with_remote_addr("10.0.0.7")
///     .with_wrap_ttl(Duration::from_secs(300))
///     .with_header("X-Request-Id", "abc");
///
/// assert_eq!(req.path, "secret/app");
/// assert_eq!(req.headers["X-Request-Id"], vec!["abc"]);
/// ```
#[derive(Debug)]
pub struct Request {
    /// Raw operation name
    pub operation: String,
    /// Logical path the request targets
    pub path: String,
    /// Structured request payload
    pub data: Option<Map<String, Value>>,
    /// Token presented with the request.
    ///
    /// Never recorded; any header, payload or metadata value that echoes it
    /// is salted.
    pub client_token: Secret<String>,
    /// Connection details, if the request arrived over the network
    pub connection: Option<Connection>,
    /// Wrapping parameters, if the client asked for a wrapped response
    pub wrap_info: Option<RequestWrapInfo>,
    /// Request headers; each name maps to its values in arrival order
    pub headers: BTreeMap<String, Vec<String>>,
}

impl Request {
    /// Creates a request with the given raw operation and path.
    pub fn new(operation: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            path: path.into(),
            data: None,
            client_token: Secret::new(String::new()),
            connection: None,
            wrap_info: None,
            headers: BTreeMap::new(),
        }
    }

    /// Sets the request payload.
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = Some(data);
        self
    }

    /// Sets the token presented with the request.
    pub fn with_client_token(mut self, token: impl Into<String>) -> Self {
        self.client_token = Secret::new(token.into());
        self
    }

    /// Sets the remote address of the connection.
    pub fn with_remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.connection = Some(Connection {
            remote_addr: addr.into(),
        });
        self
    }

    /// Requests a wrapped response with the given TTL.
    pub fn with_wrap_ttl(mut self, ttl: Duration) -> Self {
        self.wrap_info = Some(RequestWrapInfo { ttl });
        self
    }

    /// Appends a header value.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Returns the remote address, or an empty string without a connection.
    pub fn remote_addr(&self) -> &str {
        self.connection
            .as_ref()
            .map(|c| c.remote_addr.as_str())
            .unwrap_or("")
    }

    /// Returns the wrap TTL in whole seconds, `0` without wrap info.
    pub fn wrap_ttl_secs(&self) -> u64 {
        self.wrap_info.map(|w| w.ttl.as_secs()).unwrap_or(0)
    }
}
