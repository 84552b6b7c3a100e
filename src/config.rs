use serde::{Deserialize, Serialize};

/// Data keys treated as sensitive unless the configuration replaces the list.
pub const DEFAULT_SENSITIVE_KEYS: &[&str] =
    &["password", "secret", "secret_id", "private_key", "api_key"];

/// Header names treated as sensitive unless the configuration replaces the list.
pub const DEFAULT_SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
];

/// Options that shape how an audit entry is built.
///
/// This is a plain options bundle: it is passed to every format call and
/// never captured by the formatter, so one formatter can serve callers with
/// different policies. It deserializes from any serde format, with every
/// field optional.
///
/// # Examples
///
/// ```
/// use audit_core::FormatterConfig;
///
/// let config = FormatterConfig::default()
///     .with_sensitive_key("ssh_key")
///     .with_sensitive_header("x-api-key");
///
/// assert!(!config.raw);
/// assert!(config.sensitive_keys.iter().any(|k| k == "ssh_key"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatterConfig {
    /// Emit data blocks, headers and metadata without salting.
    ///
    /// Identity secrets (client tokens, wrapping tokens) are salted even in
    /// raw mode. Intended for non-production debugging only.
    pub raw: bool,
    /// Salt token accessors as well as tokens.
    pub hmac_accessor: bool,
    /// Data and metadata keys whose values are salted, matched case-insensitively.
    pub sensitive_keys: Vec<String>,
    /// Header names whose values are salted, matched case-insensitively.
    pub sensitive_headers: Vec<String>,
}

impl FormatterConfig {
    /// Enables or disables raw mode.
    pub fn with_raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }

    /// Enables or disables accessor salting.
    pub fn with_hmac_accessor(mut self, hmac_accessor: bool) -> Self {
        self.hmac_accessor = hmac_accessor;
        self
    }

    /// Adds a sensitive data key.
    pub fn with_sensitive_key(mut self, key: impl Into<String>) -> Self {
        self.sensitive_keys.push(key.into());
        self
    }

    /// Replaces the sensitive data key list.
    pub fn with_sensitive_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sensitive_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a sensitive header name.
    pub fn with_sensitive_header(mut self, name: impl Into<String>) -> Self {
        self.sensitive_headers.push(name.into());
        self
    }

    /// Replaces the sensitive header list.
    pub fn with_sensitive_headers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sensitive_headers = names.into_iter().map(Into::into).collect();
        self
    }
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            raw: false,
            hmac_accessor: true,
            sensitive_keys: DEFAULT_SENSITIVE_KEYS.iter().map(|k| k.to_string()).collect(),
            sensitive_headers: DEFAULT_SENSITIVE_HEADERS
                .iter()
                .map(|h| h.to_string())
                .collect(),
        }
    }
}
