//! JSONx: the XML rendering of a JSON document.
//!
//! ```text
//! <json:object xmlns:json="http://www.ibm.com/xmlns/prod/2009/jsonx">
//!   <json:string name="time">2015-08-05T13:45:46Z</json:string>
//!   <json:number name="wrap_ttl">60</json:number>
//!   <json:null name="error"/>
//! </json:object>
//! ```
//!
//! Records are emitted on a single line; line breaks inside values are
//! written as character references.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Number, Value};

use super::{frame, unframe, FormatWriter};
use crate::audit::{AuditRequestEntry, AuditResponseEntry};
use crate::error::{Error, ErrorKind, Result};
use crate::salt::{Salt, SaltProvider};

/// Namespace of JSONx elements.
pub const JSONX_NAMESPACE: &str = "http://www.ibm.com/xmlns/prod/2009/jsonx";

const OBJECT: &str = "json:object";
const ARRAY: &str = "json:array";
const STRING: &str = "json:string";
const NUMBER: &str = "json:number";
const BOOLEAN: &str = "json:boolean";
const NULL: &str = "json:null";

/// Options for [`JsonxFormatWriter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonxOptions {
    /// Literal emitted before every record
    pub prefix: String,
    /// Start each record with an XML declaration
    pub xml_declaration: bool,
}

impl Default for JsonxOptions {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            xml_declaration: true,
        }
    }
}

/// Writes entries as JSONx documents.
pub struct JsonxFormatWriter {
    options: JsonxOptions,
    provider: Arc<dyn SaltProvider>,
}

impl JsonxFormatWriter {
    /// Creates a JSONx writer.
    pub fn new(provider: Arc<dyn SaltProvider>, options: JsonxOptions) -> Self {
        Self { options, provider }
    }

    fn encode<T: Serialize>(&self, entry: &T) -> Result<Vec<u8>> {
        let document = serde_json::to_value(entry)
            .map_err(|e| Error::serialization("failed to encode entry", e))?;

        let mut writer = Writer::new(Vec::new());
        if self.options.xml_declaration {
            emit(
                &mut writer,
                Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
            )?;
        }
        write_value(&mut writer, None, &document, true)?;

        Ok(frame(&self.options.prefix, &writer.into_inner()))
    }

    fn decode<T: DeserializeOwned>(&self, record: &[u8]) -> Result<T> {
        let body = unframe(&self.options.prefix, record)?;
        let text = std::str::from_utf8(body)
            .map_err(|e| Error::serialization("JSONx record is not UTF-8", e))?;
        let document = read_document(text)?;
        serde_json::from_value(document)
            .map_err(|e| Error::serialization("JSONx document is not an audit entry", e))
    }
}

impl FormatWriter for JsonxFormatWriter {
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

impl fmt::Debug for JsonxFormatWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonxFormatWriter")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::SerializationFailure, message)
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| Error::serialization("failed to write JSONx", e))
}

fn write_value(
    writer: &mut Writer<Vec<u8>>,
    name: Option<&str>,
    value: &Value,
    root: bool,
) -> Result<()> {
    let tag = match value {
        Value::Object(_) => OBJECT,
        Value::Array(_) => ARRAY,
        Value::String(_) => STRING,
        Value::Number(_) => NUMBER,
        Value::Bool(_) => BOOLEAN,
        Value::Null => NULL,
    };

    let escaped_name = name.map(escape);
    let mut start = BytesStart::new(tag);
    if root {
        start.push_attribute(("xmlns:json", JSONX_NAMESPACE));
    }
    if let Some(escaped) = &escaped_name {
        // Pre-escaped, so the bytes are pushed as-is.
        start.push_attribute(Attribute::from((b"name".as_slice(), escaped.as_bytes())));
    }

    let text = match value {
        Value::Null => return emit(writer, Event::Empty(start)),
        Value::Object(map) => {
            emit(writer, Event::Start(start))?;
            for (key, child) in map {
                write_value(writer, Some(key), child, false)?;
            }
            return emit(writer, Event::End(BytesEnd::new(tag)));
        }
        Value::Array(items) => {
            emit(writer, Event::Start(start))?;
            for child in items {
                write_value(writer, None, child, false)?;
            }
            return emit(writer, Event::End(BytesEnd::new(tag)));
        }
        Value::String(s) => escape(s),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
    };

    emit(writer, Event::Start(start))?;
    emit(writer, Event::Text(BytesText::from_escaped(text)))?;
    emit(writer, Event::End(BytesEnd::new(tag)))
}

/// Escapes markup characters and line breaks.
fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            c => out.push(c),
        }
    }
    out
}

enum Node {
    Object(Map<String, Value>),
    Array(Vec<Value>),
    Scalar { tag: &'static str, text: String },
}

struct Frame {
    name: Option<String>,
    node: Node,
}

impl Frame {
    fn open(element: &BytesStart<'_>) -> Result<Self> {
        let tag = match element.name().as_ref() {
            b"json:object" => OBJECT,
            b"json:array" => ARRAY,
            b"json:string" => STRING,
            b"json:number" => NUMBER,
            b"json:boolean" => BOOLEAN,
            b"json:null" => NULL,
            other => {
                return Err(invalid(format!(
                    "unexpected JSONx element {:?}",
                    String::from_utf8_lossy(other)
                )))
            }
        };

        let name = element
            .try_get_attribute("name")
            .map_err(|e| Error::serialization("malformed JSONx attribute", e))?
            .map(|attr| {
                attr.unescape_value()
                    .map(Cow::into_owned)
                    .map_err(|e| Error::serialization("malformed JSONx attribute", e))
            })
            .transpose()?;

        let node = match tag {
            OBJECT => Node::Object(Map::new()),
            ARRAY => Node::Array(Vec::new()),
            tag => Node::Scalar {
                tag,
                text: String::new(),
            },
        };
        Ok(Self { name, node })
    }

    fn close(self) -> Result<(Option<String>, Value)> {
        let value = match self.node {
            Node::Object(map) => Value::Object(map),
            Node::Array(items) => Value::Array(items),
            Node::Scalar { tag, text } => scalar(tag, text)?,
        };
        Ok((self.name, value))
    }
}

fn scalar(tag: &'static str, text: String) -> Result<Value> {
    match tag {
        STRING => Ok(Value::String(text)),
        NULL => Ok(Value::Null),
        BOOLEAN => match text.as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(invalid("JSONx boolean is neither true nor false")),
        },
        _ => serde_json::from_str::<Number>(&text)
            .map(Value::Number)
            .map_err(|e| Error::serialization("malformed JSONx number", e)),
    }
}

/// Attaches a finished child to its parent, or returns it as the root.
fn attach(stack: &mut [Frame], name: Option<String>, value: Value) -> Result<Option<Value>> {
    match stack.last_mut() {
        None => Ok(Some(value)),
        Some(Frame {
            node: Node::Object(map),
            ..
        }) => {
            let key = name.ok_or_else(|| invalid("JSONx object member has no name"))?;
            map.insert(key, value);
            Ok(None)
        }
        Some(Frame {
            node: Node::Array(items),
            ..
        }) => {
            items.push(value);
            Ok(None)
        }
        Some(Frame {
            node: Node::Scalar { .. },
            ..
        }) => Err(invalid("JSONx scalar element has children")),
    }
}

fn read_document(text: &str) -> Result<Value> {
    let mut reader = Reader::from_str(text);
    let mut stack: Vec<Frame> = Vec::new();
    let mut root = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| Error::serialization("malformed JSONx", e))?;
        match event {
            Event::Start(ref e) => stack.push(Frame::open(e)?),
            Event::Empty(ref e) => {
                let (name, value) = Frame::open(e)?.close()?;
                if let Some(done) = attach(&mut stack, name, value)? {
                    root = Some(done);
                }
            }
            Event::Text(ref e) => {
                if let Some(Frame {
                    node: Node::Scalar { text, .. },
                    ..
                }) = stack.last_mut()
                {
                    let unescaped = e
                        .unescape()
                        .map_err(|e| Error::serialization("malformed JSONx text", e))?;
                    text.push_str(&unescaped);
                }
            }
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| invalid("unbalanced JSONx element"))?;
                let (name, value) = frame.close()?;
                if let Some(done) = attach(&mut stack, name, value)? {
                    root = Some(done);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    match root {
        Some(document @ Value::Object(_)) if stack.is_empty() => Ok(document),
        _ => Err(invalid("JSONx record has no root object")),
    }
}
