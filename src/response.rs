//! Response-side inputs supplied by the gateway's request pipeline.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::request::Auth;
use crate::secret::Secret;

/// A lease attached to a secret returned in a response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretLease {
    /// Identifier used to renew or revoke the lease
    pub lease_id: String,
    /// Lease duration
    pub ttl: Duration,
    /// Whether the lease can be renewed
    pub renewable: bool,
}

/// Details of a response that was wrapped in a single-use token.
#[derive(Debug)]
pub struct ResponseWrapInfo {
    /// The wrapping token handed to the client
    pub token: Secret<String>,
    /// Lifetime of the wrapping token
    pub ttl: Duration,
    /// When the wrapping token was minted
    pub creation_time: DateTime<Utc>,
    /// Accessor of the token that was wrapped, if any
    pub wrapped_accessor: String,
}

impl ResponseWrapInfo {
    /// Creates wrap details with no wrapped accessor.
    pub fn new(token: impl Into<String>, ttl: Duration, creation_time: DateTime<Utc>) -> Self {
        Self {
            token: Secret::new(token.into()),
            ttl,
            creation_time,
            wrapped_accessor: String::new(),
        }
    }

    /// Sets the accessor of the wrapped token.
    pub fn with_wrapped_accessor(mut self, accessor: impl Into<String>) -> Self {
        self.wrapped_accessor = accessor.into();
        self
    }
}

/// A response produced by the gateway.
///
/// # Examples
///
/// ```
/// use audit_core::{Auth, Response};
///
/// let resp = Response::new(200)
///     .with_redirect("")
///     .with_auth(Auth::new("s.issued").with_policies(["default"]));
///
/// assert_eq!(resp.status, 200);
/// assert!(resp.auth.is_some());
/// ```
#[derive(Debug)]
pub struct Response {
    /// Status code returned to the client
    pub status: u16,
    /// Structured response payload
    pub data: Option<Map<String, Value>>,
    /// Redirect target, empty when there is none
    pub redirect: String,
    /// Lease for the returned secret, if any
    pub secret: Option<SecretLease>,
    /// Credentials issued by this response, if any
    pub auth: Option<Auth>,
    /// Wrapping details when the response was wrapped
    pub wrap_info: Option<ResponseWrapInfo>,
}

impl Response {
    /// Creates an empty response with the given status.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            data: None,
            redirect: String::new(),
            secret: None,
            auth: None,
            wrap_info: None,
        }
    }

    /// Sets the response payload.
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = Some(data);
        self
    }

    /// Sets the redirect target.
    pub fn with_redirect(mut self, redirect: impl Into<String>) -> Self {
        self.redirect = redirect.into();
        self
    }

    /// Attaches a lease.
    pub fn with_secret(mut self, lease: SecretLease) -> Self {
        self.secret = Some(lease);
        self
    }

    /// Attaches issued credentials.
    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Marks the response as wrapped.
    pub fn with_wrap_info(mut self, wrap_info: ResponseWrapInfo) -> Self {
        self.wrap_info = Some(wrap_info);
        self
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(200)
    }
}
