//! Recursive, key-driven redaction of structured payloads.
//!
//! Redaction never deletes a value. A value under a sensitive key is replaced
//! by its identified HMAC, so two entries that carried the same secret still
//! carry the same digest.

use std::collections::{BTreeMap, HashSet};

use serde_json::{Map, Value};

use crate::config::FormatterConfig;
use crate::error::{Error, Result};
use crate::salt::Salt;

/// Data keys that are salted under every configuration, raw mode included.
pub const ALWAYS_SENSITIVE_KEYS: &[&str] = &["client_token", "token", "wrapping_token"];

/// Header names whose values are salted under every configuration, raw mode
/// included. These carry client credentials.
pub const ALWAYS_SENSITIVE_HEADERS: &[&str] =
    &["authorization", "proxy-authorization", "x-vault-token"];

/// Deepest payload nesting accepted before the input is rejected.
pub const MAX_DATA_DEPTH: usize = 100;

/// Which keys and headers get salted.
///
/// Matching is case-insensitive. The [`ALWAYS_SENSITIVE_KEYS`] and
/// [`ALWAYS_SENSITIVE_HEADERS`] are part of every policy and cannot be removed.
///
/// # Examples
///
/// ```
/// use audit_core::{FormatterConfig, RedactionPolicy};
///
/// let policy = RedactionPolicy::from_config(&FormatterConfig::default().with_sensitive_keys(["pin"]));
///
/// assert!(policy.is_sensitive_key("PIN"));
/// assert!(policy.is_sensitive_key("client_token"));
/// assert!(!policy.is_sensitive_key("password"));
/// ```
#[derive(Debug, Clone)]
pub struct RedactionPolicy {
    keys: HashSet<String>,
    headers: HashSet<String>,
    raw: bool,
}

impl RedactionPolicy {
    /// Builds the policy described by a formatter configuration.
    pub fn from_config(config: &FormatterConfig) -> Self {
        Self {
            keys: config
                .sensitive_keys
                .iter()
                .map(|k| k.to_ascii_lowercase())
                .collect(),
            headers: config
                .sensitive_headers
                .iter()
                .map(|h| h.to_ascii_lowercase())
                .collect(),
            raw: config.raw,
        }
    }

    /// Returns `true` if values under `key` are salted.
    pub fn is_sensitive_key(&self, key: &str) -> bool {
        let key = key.to_ascii_lowercase();
        ALWAYS_SENSITIVE_KEYS.contains(&key.as_str()) || (!self.raw && self.keys.contains(&key))
    }

    /// Returns `true` if the values of header `name` are salted.
    pub fn is_sensitive_header(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        ALWAYS_SENSITIVE_HEADERS.contains(&name.as_str())
            || (!self.raw && self.headers.contains(&name))
    }

    /// Returns a redacted copy of a payload.
    ///
    /// `tokens` are the identity secrets of the event being recorded; any
    /// string leaf containing one is salted wherever it appears.
    ///
    /// # Errors
    ///
    /// Returns `MalformedEntryInput` if the payload nests deeper than
    /// [`MAX_DATA_DEPTH`].
    pub fn redact_data(
        &self,
        data: &Map<String, Value>,
        salt: &Salt,
        tokens: &[&str],
    ) -> Result<Map<String, Value>> {
        self.redact_map(data, salt, tokens, 1)
    }

    /// Returns a copy of the headers with sensitive values salted.
    ///
    /// Values of sensitive headers are salted, as is any value of any header
    /// that contains one of `tokens`.
    pub fn redact_headers(
        &self,
        headers: &BTreeMap<String, Vec<String>>,
        salt: &Salt,
        tokens: &[&str],
    ) -> BTreeMap<String, Vec<String>> {
        headers
            .iter()
            .map(|(name, values)| {
                let sensitive = self.is_sensitive_header(name);
                let values = values
                    .iter()
                    .map(|v| {
                        if sensitive || carries_token(v, tokens) {
                            salt.get_identified_hmac(v)
                        } else {
                            v.clone()
                        }
                    })
                    .collect();
                (name.clone(), values)
            })
            .collect()
    }

    /// Returns a copy of token metadata with sensitive values salted.
    pub fn redact_metadata(
        &self,
        metadata: &BTreeMap<String, String>,
        salt: &Salt,
        tokens: &[&str],
    ) -> BTreeMap<String, String> {
        metadata
            .iter()
            .map(|(key, value)| {
                let value = if self.is_sensitive_key(key) || carries_token(value, tokens) {
                    salt.get_identified_hmac(value)
                } else {
                    value.clone()
                };
                (key.clone(), value)
            })
            .collect()
    }

    fn redact_map(
        &self,
        map: &Map<String, Value>,
        salt: &Salt,
        tokens: &[&str],
        depth: usize,
    ) -> Result<Map<String, Value>> {
        check_depth(depth)?;
        map.iter()
            .map(|(key, value)| {
                let value = if self.is_sensitive_key(key) {
                    salt_leaves(value, salt, depth + 1)?
                } else {
                    self.redact_value(value, salt, tokens, depth + 1)?
                };
                Ok((key.clone(), value))
            })
            .collect()
    }

    fn redact_value(
        &self,
        value: &Value,
        salt: &Salt,
        tokens: &[&str],
        depth: usize,
    ) -> Result<Value> {
        match value {
            Value::Object(map) => self
                .redact_map(map, salt, tokens, depth)
                .map(Value::Object),
            Value::Array(items) => {
                check_depth(depth)?;
                items
                    .iter()
                    .map(|item| self.redact_value(item, salt, tokens, depth + 1))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::Array)
            }
            Value::String(s) if carries_token(s, tokens) => {
                Ok(Value::String(salt.get_identified_hmac(s)))
            }
            scalar => Ok(scalar.clone()),
        }
    }
}

impl Default for RedactionPolicy {
    fn default() -> Self {
        Self::from_config(&FormatterConfig::default())
    }
}

fn carries_token(value: &str, tokens: &[&str]) -> bool {
    tokens
        .iter()
        .any(|token| !token.is_empty() && value.contains(token))
}

/// Salts every non-null leaf beneath a sensitive key, keeping the shape.
fn salt_leaves(value: &Value, salt: &Salt, depth: usize) -> Result<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::String(s) => Ok(Value::String(salt.get_identified_hmac(s))),
        Value::Bool(b) => Ok(Value::String(salt.get_identified_hmac(&b.to_string()))),
        Value::Number(n) => Ok(Value::String(salt.get_identified_hmac(&n.to_string()))),
        Value::Array(items) => {
            check_depth(depth)?;
            items
                .iter()
                .map(|item| salt_leaves(item, salt, depth + 1))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array)
        }
        Value::Object(map) => {
            check_depth(depth)?;
            map.iter()
                .map(|(k, v)| Ok((k.clone(), salt_leaves(v, salt, depth + 1)?)))
                .collect::<Result<Map<_, _>>>()
                .map(Value::Object)
        }
    }
}

fn check_depth(depth: usize) -> Result<()> {
    if depth > MAX_DATA_DEPTH {
        return Err(Error::malformed(format!(
            "payload nests deeper than {} levels",
            MAX_DATA_DEPTH
        )));
    }
    Ok(())
}
