use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{frame, unframe, FormatWriter};
use crate::audit::{AuditRequestEntry, AuditResponseEntry};
use crate::error::{Error, Result};
use crate::salt::{Salt, SaltProvider};

/// Options for [`JsonFormatWriter`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriterOptions {
    /// Literal emitted before every record
    pub prefix: String,
    /// Indent the body instead of emitting it on one line
    pub pretty: bool,
}

/// Writes entries as JSON, one object per record.
///
/// Object keys follow the entry's field declaration order; header and
/// metadata keys are sorted; payload keys keep their input order. The output
/// for a fixed entry is therefore byte-stable across runs.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use audit_core::format::{FormatWriter, JsonFormatWriter, WriterOptions};
/// use audit_core::salt::{FixedSaltProvider, SaltConfig};
///
/// let provider = FixedSaltProvider::from_key(b"k".to_vec(), SaltConfig::default()).unwrap();
/// let writer = JsonFormatWriter::new(
///     Arc::new(provider),
///     WriterOptions { prefix: "@cee: ".to_string(), pretty: false },
/// );
/// assert_eq!(writer.prefix(), "@cee: ");
/// ```
pub struct JsonFormatWriter {
    options: WriterOptions,
    provider: Arc<dyn SaltProvider>,
}

impl JsonFormatWriter {
    /// Creates a JSON writer.
    pub fn new(provider: Arc<dyn SaltProvider>, options: WriterOptions) -> Self {
        Self { options, provider }
    }

    /// Returns the writer options.
    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    fn encode<T: Serialize>(&self, entry: &T) -> Result<Vec<u8>> {
        let body = if self.options.pretty {
            serde_json::to_vec_pretty(entry)
        } else {
            serde_json::to_vec(entry)
        }
        .map_err(|e| Error::serialization("failed to encode entry as JSON", e))?;

        Ok(frame(&self.options.prefix, &body))
    }

    fn decode<T: DeserializeOwned>(&self, record: &[u8]) -> Result<T> {
        let body = unframe(&self.options.prefix, record)?;
        serde_json::from_slice(body)
            .map_err(|e| Error::serialization("failed to decode JSON entry", e))
    }
}

impl FormatWriter for JsonFormatWriter {
    fn format_request(&self, entry: &AuditRequestEntry) -> Result<Vec<u8>> {
        self.encode(entry)
    }

    fn format_response(&self, entry: &AuditResponseEntry) -> Result<Vec<u8>> {
        self.encode(entry)
    }

    fn parse_request(&self, record: &[u8]) -> Result<AuditRequestEntry> {
        self.decode(record)
    }

    fn parse_response(&self, record: &[u8]) -> Result<AuditResponseEntry> {
        self.decode(record)
    }

    fn salt(&self) -> Result<Arc<Salt>> {
        self.provider.salt()
    }

    fn prefix(&self) -> &str {
        &self.options.prefix
    }
}

impl fmt::Debug for JsonFormatWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonFormatWriter")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditAuth, AuditRequest};
    use crate::error::ErrorKind;
    use crate::request::Operation;
    use crate::salt::{FixedSaltProvider, SaltConfig};

    fn writer(prefix: &str, pretty: bool) -> JsonFormatWriter {
        let provider = FixedSaltProvider::from_key(b"json-key".to_vec(), SaltConfig::default())
            .unwrap();
        JsonFormatWriter::new(
            Arc::new(provider),
            WriterOptions {
                prefix: prefix.to_string(),
                pretty,
            },
        )
    }

    fn entry() -> AuditRequestEntry {
        AuditRequestEntry::new(
            "2015-08-05T13:45:46Z",
            AuditAuth {
                display_name: String::new(),
                policies: vec!["root".to_string()],
                metadata: None,
            },
            AuditRequest {
                operation: Operation::Update,
                path: "/foo".to_string(),
                data: None,
                wrap_ttl: 60,
                remote_address: "127.0.0.1".to_string(),
                headers: Some([("foo".to_string(), vec!["bar".to_string()])].into()),
            },
            Some("this is an error".to_string()),
        )
    }

    #[test]
    fn compact_record_is_one_line() {
        let record = writer("", false).format_request(&entry()).unwrap();
        let text = String::from_utf8(record).unwrap();

        assert_eq!(
            text,
            "{\"time\":\"2015-08-05T13:45:46Z\",\"type\":\"request\",\"auth\":{\"display_name\":\"\",\"policies\":[\"root\"],\"metadata\":null},\"request\":{\"operation\":\"update\",\"path\":\"/foo\",\"data\":null,\"wrap_ttl\":60,\"remote_address\":\"127.0.0.1\",\"headers\":{\"foo\":[\"bar\"]}},\"error\":\"this is an error\"}\n"
        );
    }

    #[test]
    fn pretty_record_ends_with_single_newline() {
        let record = writer("", true).format_request(&entry()).unwrap();
        let text = String::from_utf8(record).unwrap();

        assert!(text.contains("\n  \"time\""));
        assert!(text.ends_with("}\n"));
        assert!(!text.ends_with("\n\n"));
    }

    #[test]
    fn prefixed_record_parses_back() {
        let writer = writer("@cee: ", false);
        let record = writer.format_request(&entry()).unwrap();

        assert!(record.starts_with(b"@cee: {"));
        assert_eq!(writer.parse_request(&record).unwrap(), entry());
    }

    #[test]
    fn request_record_is_not_a_response() {
        let writer = writer("", false);
        let record = writer.format_request(&entry()).unwrap();

        let err = writer.parse_response(&record).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SerializationFailure);
    }

    #[test]
    fn float_payload_reencodes_byte_identically() {
        let writer = writer("", false);
        let mut entry = entry();
        let data = match serde_json::json!({"v": 1.0715660391465826e-75, "w": 0.1, "x": -2.5e300}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        entry.request.data = Some(data);

        let record = writer.format_request(&entry).unwrap();
        assert!(String::from_utf8_lossy(&record).contains("1.0715660391465826e-75"));

        let parsed = writer.parse_request(&record).unwrap();
        assert_eq!(writer.format_request(&parsed).unwrap(), record);
    }
}
