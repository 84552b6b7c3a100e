use std::io;
use std::sync::Arc;
use std::time::Duration;

use audit_core::format::{FormatWriter, JsonFormatWriter, WriterOptions};
use audit_core::salt::{FixedSaltProvider, Salt, SaltConfig};
use audit_core::{
    AuditFormatter, Auth, ErrorKind, FormatterConfig, Request, Response, ResponseWrapInfo,
    SecretLease,
};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Map, Value};

const KEY: &[u8] = b"format-json-test-key";

fn pinned() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2015, 8, 5, 13, 45, 46).unwrap()
}

fn formatter(prefix: &str) -> AuditFormatter {
    let provider = FixedSaltProvider::from_key(KEY.to_vec(), SaltConfig::default()).unwrap();
    AuditFormatter::new(Arc::new(JsonFormatWriter::new(
        Arc::new(provider),
        WriterOptions {
            prefix: prefix.to_string(),
            pretty: false,
        },
    )))
    .with_clock(pinned)
}

fn salt() -> Salt {
    Salt::new(KEY.to_vec(), SaltConfig::default()).unwrap()
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

const EXPECTED: &str = "{\"time\":\"2015-08-05T13:45:46Z\",\"type\":\"request\",\"auth\":{\"display_name\":\"\",\"policies\":[\"root\"],\"metadata\":null},\"request\":{\"operation\":\"update\",\"path\":\"/foo\",\"data\":null,\"wrap_ttl\":60,\"remote_address\":\"127.0.0.1\",\"headers\":{\"foo\":[\"bar\"]}},\"error\":\"this is an error\"}\n";

fn scenario() -> (Auth, Request, io::Error) {
    let auth = Auth::new("foo").with_policies(["root"]);
    let req = Request::new("update", "/foo")
        .with_remote_addr("127.0.0.1")
        .with_wrap_ttl(Duration::from_secs(60))
        .with_header("foo", "bar");
    let err = io::Error::new(io::ErrorKind::Other, "this is an error");
    (auth, req, err)
}

#[test]
fn request_scenario_without_prefix() {
    let (auth, req, err) = scenario();
    let mut out = Vec::new();

    formatter("")
        .format_request(&mut out, &FormatterConfig::default(), Some(&auth), &req, Some(&err))
        .unwrap();

    assert_eq!(String::from_utf8(out).unwrap(), EXPECTED);
}

#[test]
fn request_scenario_with_cee_prefix() {
    let (auth, req, err) = scenario();
    let mut out = Vec::new();

    formatter("@cee: ")
        .format_request(&mut out, &FormatterConfig::default(), Some(&auth), &req, Some(&err))
        .unwrap();

    assert_eq!(String::from_utf8(out).unwrap(), format!("@cee: {EXPECTED}"));
}

#[test]
fn client_token_never_reaches_the_stream() {
    let auth = Auth::new("s.Yq5xK2mPz8").with_policies(["default"]);
    let req = Request::new("read", "secret/app").with_client_token("s.Yq5xK2mPz8");
    let mut out = Vec::new();

    formatter("")
        .format_request(&mut out, &FormatterConfig::default(), Some(&auth), &req, None)
        .unwrap();

    let line = String::from_utf8(out).unwrap();
    assert!(!line.contains("s.Yq5xK2mPz8"));
    assert!(line.contains("\"error\":null"));
    assert!(line.contains("\"wrap_ttl\":0"));
}

#[test]
fn sensitive_request_data_is_salted_in_place() {
    let req = Request::new("create", "auth/userpass/users/ci").with_data(object(json!({
        "password": "hunter2",
        "policies": "default",
        "nested": {"token": "s.inner"},
    })));
    let mut out = Vec::new();

    formatter("")
        .format_request(&mut out, &FormatterConfig::default(), None, &req, None)
        .unwrap();

    let value: Value = serde_json::from_slice(&out).unwrap();
    let data = &value["request"]["data"];
    let salt = salt();
    assert_eq!(data["password"], salt.get_identified_hmac("hunter2"));
    assert_eq!(data["policies"], "default");
    assert_eq!(data["nested"]["token"], salt.get_identified_hmac("s.inner"));
}

#[test]
fn raw_mode_keeps_configured_keys_but_salts_tokens() {
    let req = Request::new("update", "secret/app")
        .with_data(object(json!({"password": "hunter2", "token": "s.raw"})))
        .with_header("Authorization", "Bearer abc")
        .with_header("Cookie", "session=abc");
    let config = FormatterConfig::default().with_raw(true);
    let mut out = Vec::new();

    formatter("")
        .format_request(&mut out, &config, None, &req, None)
        .unwrap();

    let value: Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(value["request"]["data"]["password"], "hunter2");
    assert_eq!(
        value["request"]["data"]["token"],
        salt().get_identified_hmac("s.raw")
    );
    assert_eq!(value["request"]["headers"]["Cookie"][0], "session=abc");
    assert_eq!(
        value["request"]["headers"]["Authorization"][0],
        salt().get_identified_hmac("Bearer abc")
    );
}

#[test]
fn response_entry_records_issued_credentials() {
    let req = Request::new("update", "auth/approle/login");
    let resp = Response::new(200)
        .with_auth(
            Auth::new("s.issued")
                .with_accessor("acc-issued")
                .with_display_name("approle")
                .with_policies(["default", "deploy"]),
        )
        .with_secret(SecretLease {
            lease_id: "auth/approle/login/h1".to_string(),
            ttl: Duration::from_secs(3600),
            renewable: true,
        })
        .with_wrap_info(
            ResponseWrapInfo::new("s.wrap", Duration::from_secs(120), pinned())
                .with_wrapped_accessor("acc-wrapped"),
        );
    let mut out = Vec::new();

    formatter("")
        .format_response(&mut out, &FormatterConfig::default(), None, &req, &resp, None)
        .unwrap();

    let text = String::from_utf8(out.clone()).unwrap();
    for secret in ["s.issued", "s.wrap", "acc-issued", "acc-wrapped"] {
        assert!(!text.contains(secret), "{secret} leaked");
    }

    let value: Value = serde_json::from_slice(&out).unwrap();
    let response = &value["response"];
    assert_eq!(value["type"], "response");
    assert_eq!(response["status"], 200);
    assert_eq!(response["auth"]["policies"], json!(["default", "deploy"]));
    assert_eq!(response["secret"]["ttl"], 3600);
    assert_eq!(response["wrap_info"]["ttl"], 120);
    assert_eq!(response["wrap_info"]["creation_time"], "2015-08-05T13:45:46Z");
}

#[test]
fn accessor_passes_through_when_hmac_disabled() {
    let req = Request::new("update", "auth/token/create");
    let resp = Response::new(200).with_auth(Auth::new("s.issued").with_accessor("acc-plain"));
    let config = FormatterConfig::default().with_hmac_accessor(false);
    let mut out = Vec::new();

    formatter("")
        .format_response(&mut out, &config, None, &req, &resp, None)
        .unwrap();

    let value: Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(value["response"]["auth"]["accessor"], "acc-plain");
    assert_ne!(value["response"]["auth"]["client_token"], "s.issued");
}

#[test]
fn record_parses_back_into_the_entry() {
    let provider = FixedSaltProvider::from_key(KEY.to_vec(), SaltConfig::default()).unwrap();
    let writer = Arc::new(JsonFormatWriter::new(
        Arc::new(provider),
        WriterOptions {
            prefix: "@cee: ".to_string(),
            pretty: false,
        },
    ));
    let formatter = AuditFormatter::new(writer.clone()).with_clock(pinned);
    let (auth, req, err) = scenario();
    let mut out = Vec::new();

    formatter
        .format_request(&mut out, &FormatterConfig::default(), Some(&auth), &req, Some(&err))
        .unwrap();

    let entry = writer.parse_request(&out).unwrap();
    assert_eq!(entry.request.path, "/foo");
    assert_eq!(writer.format_request(&entry).unwrap(), out);
}

#[test]
fn empty_operation_is_malformed() {
    let mut out = Vec::new();
    let err = formatter("")
        .format_request(
            &mut out,
            &FormatterConfig::default(),
            None,
            &Request::new("", "secret/app"),
            None,
        )
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MalformedEntryInput);
    assert!(out.is_empty());
}
