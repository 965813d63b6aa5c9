//! Normalization of trigger payloads into entry point arguments
//!
//! HTTP triggers become `(body?, query, headers)`; any other trigger passes
//! its payload through as the single argument. The body is only decoded when
//! the `Content-Type` header is exactly one of the two supported media types;
//! parameters such as `charset` make it unrecognized.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use url::form_urlencoded;

use super::error::ArgumentError;

/// Media type for JSON bodies
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Media type for url-encoded form bodies
pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";

/// Key to ordered values mapping used for query, form and header arguments
pub type MultiMap = BTreeMap<String, Vec<String>>;

/// Inbound payload that triggered an invocation
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerPayload {
    /// HTTP request
    Http(HttpRequest),
    /// System event or topic message
    Event(Value),
}

impl From<HttpRequest> for TriggerPayload {
    fn from(request: HttpRequest) -> Self {
        TriggerPayload::Http(request)
    }
}

impl From<Value> for TriggerPayload {
    fn from(value: Value) -> Self {
        TriggerPayload::Event(value)
    }
}

/// The parts of an HTTP request a function sees.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HttpRequest {
    /// Header pairs in arrival order; names are canonicalized on read
    pub headers: Vec<(String, String)>,
    /// Raw URL query string, without the leading `?`
    pub query: String,
    /// Raw body bytes
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Empty request
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the raw query string
    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into().trim_start_matches('?').to_string();
        self
    }

    /// Set the body
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of a header, matched case-insensitively
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Headers keyed by canonical name
    pub fn header_map(&self) -> MultiMap {
        let mut map = MultiMap::new();
        for (name, value) in &self.headers {
            map.entry(canonical_header_key(name))
                .or_default()
                .push(value.clone());
        }
        map
    }

    /// Query parameters; pairs that fail to decode are dropped
    pub fn query_map(&self) -> MultiMap {
        let mut map = MultiMap::new();
        for pair in self.query.split('&') {
            if check_escapes(pair).is_err() {
                continue;
            }
            for (key, value) in form_urlencoded::parse(pair.as_bytes()).into_owned() {
                map.entry(key).or_default().push(value);
            }
        }
        map
    }

    /// Form fields from the body followed by the query values
    pub fn form_map(&self) -> Result<MultiMap, ArgumentError> {
        let body = std::str::from_utf8(&self.body)
            .map_err(|err| ArgumentError::Form(err.to_string()))?;

        check_escapes(body).map_err(ArgumentError::Form)?;

        let mut map = MultiMap::new();
        for (key, value) in form_urlencoded::parse(body.as_bytes()).into_owned() {
            map.entry(key).or_default().push(value);
        }
        for (key, values) in self.query_map() {
            map.entry(key).or_default().extend(values);
        }
        Ok(map)
    }
}

/// Build the positional arguments for the entry point.
pub fn prepare_arguments(payload: &TriggerPayload) -> Result<Vec<Value>, ArgumentError> {
    let request = match payload {
        TriggerPayload::Event(value) => return Ok(vec![value.clone()]),
        TriggerPayload::Http(request) => request,
    };

    let mut args = Vec::with_capacity(3);
    match request.header_value("Content-Type") {
        Some(CONTENT_TYPE_JSON) => {
            let body: Value = serde_json::from_slice(&request.body)?;
            args.push(body);
        }
        Some(CONTENT_TYPE_FORM) => {
            args.push(multimap_to_json(request.form_map()?));
        }
        _ => {}
    }

    args.push(multimap_to_json(request.query_map()));
    args.push(multimap_to_json(request.header_map()));
    Ok(args)
}

/// JSON object of string arrays
pub fn multimap_to_json(map: MultiMap) -> Value {
    let object: Map<String, Value> = map
        .into_iter()
        .map(|(k, values)| {
            let values = values.into_iter().map(Value::String).collect();
            (k, Value::Array(values))
        })
        .collect();
    Value::Object(object)
}

/// MIME canonical form: first letter and letters after `-` uppercased.
pub fn canonical_header_key(name: &str) -> String {
    let mut upper = true;
    name.chars()
        .map(|c| {
            let out = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            out
        })
        .collect()
}

/// Reject `%` not followed by two hex digits.
fn check_escapes(text: &str) -> Result<(), String> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            i += 1;
            continue;
        }
        let escape = bytes.get(i + 1..i + 3);
        if !escape.is_some_and(|e| e.iter().all(u8::is_ascii_hexdigit)) {
            let end = (i + 3).min(bytes.len());
            return Err(format!(
                "invalid URL escape {:?}",
                String::from_utf8_lossy(&bytes[i..end])
            ));
        }
        i += 3;
    }
    Ok(())
}
