//! Maps raw gateway objects onto audit entries.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use super::entry::{
    AuditAuth, AuditRequest, AuditRequestEntry, AuditResponse, AuditResponseAuth,
    AuditResponseEntry, AuditSecret, AuditWrapInfo,
};
use crate::config::FormatterConfig;
use crate::error::{Error, Result};
use crate::redact::RedactionPolicy;
use crate::request::{Auth, Operation, Request};
use crate::response::{Response, ResponseWrapInfo};
use crate::salt::Salt;

/// Renders a timestamp the way entries record it: RFC 3339, UTC, whole
/// seconds, `Z` suffix.
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use audit_core::audit::format_time;
///
/// let t = Utc.with_ymd_and_hms(2015, 8, 5, 13, 45, 46).unwrap();
/// assert_eq!(format_time(t), "2015-08-05T13:45:46Z");
/// ```
pub fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Builds entries for one format call.
///
/// The builder is created per call with the salt resolved for that call and
/// the call's timestamp, so every field of the entry sees the same key and
/// the same time.
#[derive(Debug)]
pub struct EntryBuilder<'a> {
    config: &'a FormatterConfig,
    policy: RedactionPolicy,
    salt: &'a Salt,
    time: String,
}

impl<'a> EntryBuilder<'a> {
    /// Creates a builder for one format call.
    pub fn new(config: &'a FormatterConfig, salt: &'a Salt, time: DateTime<Utc>) -> Self {
        Self {
            config,
            policy: RedactionPolicy::from_config(config),
            salt,
            time: format_time(time),
        }
    }

    /// Builds the entry for an incoming request.
    ///
    /// # Errors
    ///
    /// - `InvalidOperation` if the request operation is unknown
    /// - `MalformedEntryInput` if a required field is missing or the payload
    ///   cannot be redacted
    pub fn request_entry(
        &self,
        auth: Option<&Auth>,
        req: &Request,
        err: Option<&dyn std::error::Error>,
    ) -> Result<AuditRequestEntry> {
        let operation = req.operation.parse::<Operation>()?;
        let tokens = identity_tokens(auth, req, None);

        let request = AuditRequest {
            operation,
            path: req.path.clone(),
            data: self.data(req.data.as_ref(), &tokens)?,
            wrap_ttl: req.wrap_ttl_secs(),
            remote_address: req.remote_addr().to_string(),
            headers: self.headers(&req.headers, &tokens)?,
        };

        Ok(AuditRequestEntry::new(
            self.time.clone(),
            self.auth(auth, &tokens),
            request,
            error_message(err),
        ))
    }

    /// Builds the entry for an outgoing response.
    ///
    /// # Errors
    ///
    /// Same as [`request_entry`](Self::request_entry).
    pub fn response_entry(
        &self,
        auth: Option<&Auth>,
        req: &Request,
        resp: &Response,
        err: Option<&dyn std::error::Error>,
    ) -> Result<AuditResponseEntry> {
        let operation = req.operation.parse::<Operation>()?;
        let tokens = identity_tokens(auth, req, Some(resp));

        let response = AuditResponse {
            operation,
            path: req.path.clone(),
            status: resp.status,
            data: self.data(resp.data.as_ref(), &tokens)?,
            redirect: resp.redirect.clone(),
            secret: resp.secret.as_ref().map(|lease| AuditSecret {
                lease_id: lease.lease_id.clone(),
                ttl: lease.ttl.as_secs(),
                renewable: lease.renewable,
            }),
            auth: resp.auth.as_ref().map(|issued| self.issued_auth(issued, &tokens)),
            wrap_info: resp.wrap_info.as_ref().map(|wrap| self.wrap_info(wrap)),
        };

        Ok(AuditResponseEntry::new(
            self.time.clone(),
            self.auth(auth, &tokens),
            response,
            error_message(err),
        ))
    }

    fn auth(&self, auth: Option<&Auth>, tokens: &[&str]) -> AuditAuth {
        // The principal's client token is never carried over.
        match auth {
            Some(auth) => AuditAuth {
                display_name: auth.display_name.clone(),
                policies: auth.policies.clone(),
                metadata: self.metadata(auth.metadata.as_ref(), tokens),
            },
            None => AuditAuth::default(),
        }
    }

    fn issued_auth(&self, auth: &Auth, tokens: &[&str]) -> AuditResponseAuth {
        AuditResponseAuth {
            client_token: self.identity_secret(auth.client_token.expose_secret()),
            accessor: self.accessor(&auth.accessor),
            display_name: auth.display_name.clone(),
            policies: auth.policies.clone(),
            metadata: self.metadata(auth.metadata.as_ref(), tokens),
        }
    }

    fn wrap_info(&self, wrap: &ResponseWrapInfo) -> AuditWrapInfo {
        AuditWrapInfo {
            ttl: wrap.ttl.as_secs(),
            token: self.identity_secret(wrap.token.expose_secret()),
            creation_time: format_time(wrap.creation_time),
            wrapped_accessor: self.accessor(&wrap.wrapped_accessor),
        }
    }

    fn data(
        &self,
        data: Option<&Map<String, Value>>,
        tokens: &[&str],
    ) -> Result<Option<Map<String, Value>>> {
        data.map(|d| self.policy.redact_data(d, self.salt, tokens))
            .transpose()
    }

    fn headers(
        &self,
        headers: &BTreeMap<String, Vec<String>>,
        tokens: &[&str],
    ) -> Result<Option<BTreeMap<String, Vec<String>>>> {
        if headers.is_empty() {
            return Ok(None);
        }
        if headers.keys().any(|name| name.trim().is_empty()) {
            return Err(Error::malformed("request carries a header with an empty name"));
        }
        Ok(Some(self.policy.redact_headers(headers, self.salt, tokens)))
    }

    fn metadata(
        &self,
        metadata: Option<&BTreeMap<String, String>>,
        tokens: &[&str],
    ) -> Option<BTreeMap<String, String>> {
        metadata.map(|m| self.policy.redact_metadata(m, self.salt, tokens))
    }

    /// Tokens are salted in every mode; an empty token stays empty.
    fn identity_secret(&self, value: &str) -> String {
        if value.is_empty() {
            String::new()
        } else {
            self.salt.get_identified_hmac(value)
        }
    }

    fn accessor(&self, accessor: &str) -> String {
        if self.config.hmac_accessor {
            self.identity_secret(accessor)
        } else {
            accessor.to_string()
        }
    }
}

/// Every non-empty token the event carries: the principal's, the one
/// presented with the request, and any issued or wrapping token.
fn identity_tokens<'r>(
    auth: Option<&'r Auth>,
    req: &'r Request,
    resp: Option<&'r Response>,
) -> Vec<&'r str> {
    let issued = resp.and_then(|r| r.auth.as_ref());
    let wrapping = resp.and_then(|r| r.wrap_info.as_ref());

    [
        auth.map(|a| a.client_token.expose_secret().as_str()),
        Some(req.client_token.expose_secret().as_str()),
        issued.map(|a| a.client_token.expose_secret().as_str()),
        wrapping.map(|w| w.token.expose_secret().as_str()),
    ]
    .into_iter()
    .flatten()
    .filter(|token| !token.is_empty())
    .collect()
}

fn error_message(err: Option<&dyn std::error::Error>) -> Option<String> {
    err.map(|e| e.to_string())
}
