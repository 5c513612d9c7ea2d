//! Exchange definitions: the recorded representation of one request/response pair

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use hyper::Uri;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::config::RecordOptions;
use crate::exchange::{ExchangeResponse, OutboundRequest};
use crate::{ReelError, Result};

use super::decode;

/// Response status assumed when a definition does not carry one
pub const DEFAULT_STATUS: u16 = 200;

/// Headers that belong to the connection, not the exchange
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
];

/// One recorded request/response pair, sufficient to replay it
///
/// The serialized field names (`scope`, `method`, `path`, `query`, `body`,
/// `status`, `response`, `reqheaders`, `rawHeaders`) are the external
/// contract consumed by the replay engine and by fixture persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeDefinition {
    /// Origin (scheme + host, port only when non-default)
    pub scope: String,
    /// Uppercase HTTP verb
    pub method: String,
    /// Request path with the query string stripped
    pub path: String,
    /// Query parameters, percent-decoded; repeated keys become arrays
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, QueryValue>,
    /// Request body
    #[serde(default, skip_serializing_if = "RecordedBody::is_empty")]
    pub body: RecordedBody,
    /// Response status code
    #[serde(default = "default_status")]
    pub status: u16,
    /// Response body, decompressed before storage
    #[serde(default, skip_serializing_if = "RecordedBody::is_empty")]
    pub response: RecordedBody,
    /// Request headers (lowercased), present only when header recording is on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reqheaders: Option<BTreeMap<String, String>>,
    /// Response headers as recorded, hop-by-hop artifacts excluded
    #[serde(rename = "rawHeaders", default, skip_serializing_if = "Vec::is_empty")]
    pub raw_headers: Vec<(String, String)>,
}

fn default_status() -> u16 {
    DEFAULT_STATUS
}

impl ExchangeDefinition {
    /// Build a definition from a completed request/response cycle
    ///
    /// # Errors
    ///
    /// Returns error if the response body fails to decompress
    pub(crate) fn from_exchange(
        request: &OutboundRequest,
        response: &ExchangeResponse,
        options: &RecordOptions,
    ) -> Result<Self> {
        let uri = request.uri();

        let encoding = response.header_value("content-encoding");
        let decoded = decode::decompress(encoding, response.body.clone())?;
        let response_body = RecordedBody::from_response(response.header_value("content-type"), decoded);

        let reqheaders = options.enable_reqheaders_recording.then(|| {
            request
                .headers()
                .iter()
                .filter(|(name, _)| !name.eq_ignore_ascii_case("user-agent"))
                .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
                .collect()
        });

        let raw_headers = if options.dont_rec_res_headers {
            Vec::new()
        } else {
            response
                .headers
                .iter()
                .filter(|(name, _)| !is_hop_by_hop(name))
                .cloned()
                .collect()
        };

        Ok(Self {
            scope: scope_of(uri),
            method: request.method().to_string(),
            path: uri.path().to_string(),
            query: uri.query().map(parse_query).unwrap_or_default(),
            body: RecordedBody::from_request(
                request.header_value("content-type"),
                &request.body_bytes(),
            ),
            status: response.status,
            response: response_body,
            reqheaders,
            raw_headers,
        })
    }
}

/// Query parameter value: a single string, or an array for repeated keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    /// Parameter that appeared once
    Single(String),
    /// Parameter that appeared multiple times, in order
    Many(Vec<String>),
}

impl QueryValue {
    pub(crate) fn push(&mut self, value: String) {
        match self {
            Self::Single(first) => {
                *self = Self::Many(vec![std::mem::take(first), value]);
            }
            Self::Many(values) => values.push(value),
        }
    }

    /// JSON representation: string or array of strings
    #[must_use]
    pub fn as_json(&self) -> Value {
        match self {
            Self::Single(value) => Value::String(value.clone()),
            Self::Many(values) => {
                Value::Array(values.iter().cloned().map(Value::String).collect())
            }
        }
    }
}

/// Recorded request or response body
///
/// JSON bodies are stored parsed, text bodies as strings, anything else as
/// raw bytes that serialize to hex. A JSON string body is therefore
/// indistinguishable from a JSON value rendered to the same text once the
/// headers are gone; see DESIGN.md.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RecordedBody {
    /// No body
    #[default]
    Empty,
    /// Text body
    Text(String),
    /// Parsed JSON body
    Json(Value),
    /// Raw bytes, hex-encoded when serialized
    Binary(Vec<u8>),
}

impl RecordedBody {
    /// True when there is no body at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Classify a request body from its content-type and raw bytes
    pub(crate) fn from_request(content_type: Option<&str>, bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return Self::Empty;
        }
        if content_type.is_some_and(is_json_content_type) {
            if let Ok(value) = serde_json::from_slice(bytes) {
                return Self::Json(value);
            }
        }
        match std::str::from_utf8(bytes) {
            Ok(text) => Self::Text(text.to_string()),
            Err(_) => Self::Binary(bytes.to_vec()),
        }
    }

    /// Classify a (decompressed) response body from its content-type
    pub(crate) fn from_response(content_type: Option<&str>, bytes: Vec<u8>) -> Self {
        if bytes.is_empty() {
            return Self::Empty;
        }
        match content_type {
            Some(ct) if !is_text_content_type(ct) => Self::Binary(bytes),
            _ => match String::from_utf8(bytes) {
                Ok(text) => Self::Text(text),
                Err(err) => Self::Binary(err.into_bytes()),
            },
        }
    }

    /// Bytes to put on the wire when replaying this body, emitted as stored
    #[must_use]
    pub fn replay_bytes(&self) -> Vec<u8> {
        match self {
            Self::Empty => Vec::new(),
            Self::Text(text) => text.clone().into_bytes(),
            Self::Json(value) => serde_json::to_vec(value).unwrap_or_default(),
            Self::Binary(bytes) => bytes.clone(),
        }
    }

    fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Self::Empty,
            Value::String(s) if s.is_empty() => Self::Empty,
            Value::String(s) => match decode_binary_hex(&s) {
                Some(bytes) => Self::Binary(bytes),
                None => Self::Text(s),
            },
            other => Self::Json(other),
        }
    }
}

impl Serialize for RecordedBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Empty => serializer.serialize_str(""),
            Self::Text(text) => serializer.serialize_str(text),
            Self::Json(value) => value.serialize(serializer),
            Self::Binary(bytes) => serializer.serialize_str(&hex::encode(bytes)),
        }
    }
}

impl<'de> Deserialize<'de> for RecordedBody {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(value))
    }
}

impl From<&str> for RecordedBody {
    fn from(text: &str) -> Self {
        if text.is_empty() {
            Self::Empty
        } else {
            Self::Text(text.to_string())
        }
    }
}

impl From<String> for RecordedBody {
    fn from(text: String) -> Self {
        if text.is_empty() {
            Self::Empty
        } else {
            Self::Text(text)
        }
    }
}

impl From<Value> for RecordedBody {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

impl From<Vec<u8>> for RecordedBody {
    fn from(bytes: Vec<u8>) -> Self {
        if bytes.is_empty() {
            Self::Empty
        } else {
            Self::Binary(bytes)
        }
    }
}

/// Hex detection for deserialized bodies: plausible hex whose decoded bytes
/// are not valid UTF-8. Heuristic; an all-hex text body that decodes to
/// non-UTF-8 bytes will round-trip as binary.
fn decode_binary_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() < 2 || s.len() % 2 != 0 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let bytes = hex::decode(s).ok()?;
    if std::str::from_utf8(&bytes).is_ok() {
        None
    } else {
        Some(bytes)
    }
}

fn is_json_content_type(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("json")
}

fn is_text_content_type(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct.starts_with("text/")
        || ct.contains("json")
        || ct.contains("xml")
        || ct.contains("javascript")
        || ct.contains("x-www-form-urlencoded")
}

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

/// Format an origin, omitting the scheme's default port
pub(crate) fn format_scope(scheme: &str, host: &str, port: Option<u16>) -> String {
    match (scheme, port) {
        (_, None) | ("http", Some(80)) | ("https", Some(443)) => format!("{scheme}://{host}"),
        (_, Some(port)) => format!("{scheme}://{host}:{port}"),
    }
}

/// Origin of an absolute URI
pub(crate) fn scope_of(uri: &Uri) -> String {
    let scheme = uri.scheme_str().unwrap_or("http");
    let host = uri.host().unwrap_or_default().to_ascii_lowercase();
    format_scope(scheme, &host, uri.port_u16())
}

/// Normalize a definition scope string for matching
///
/// # Errors
///
/// Returns error if the scope is not an absolute origin
pub(crate) fn normalize_scope(scope: &str) -> Result<String> {
    let uri: Uri = scope
        .parse()
        .map_err(|e| ReelError::InvalidDefinition(format!("scope {scope:?}: {e}")))?;

    if uri.scheme_str().is_none() || uri.host().is_none() {
        return Err(ReelError::InvalidDefinition(format!(
            "scope {scope:?} must be an absolute origin"
        )));
    }

    Ok(scope_of(&uri))
}

/// Parse a raw query string into the definition's query mapping
pub(crate) fn parse_query(raw: &str) -> BTreeMap<String, QueryValue> {
    let mut query = BTreeMap::new();

    for pair in raw.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(key);
        let value = decode_component(value);

        match query.entry(key) {
            Entry::Vacant(entry) => {
                entry.insert(QueryValue::Single(value));
            }
            Entry::Occupied(mut entry) => entry.get_mut().push(value),
        }
    }

    query
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    let decoded = urlencoding::decode(&spaced).map(|c| c.into_owned()).ok();
    decoded.unwrap_or(spaced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scope_omits_default_port() {
        assert_eq!(
            scope_of(&"http://example.com:80/a".parse().unwrap()),
            "http://example.com"
        );
        assert_eq!(
            scope_of(&"https://example.com:443/a".parse().unwrap()),
            "https://example.com"
        );
        assert_eq!(
            scope_of(&"http://example.com/a".parse().unwrap()),
            "http://example.com"
        );
    }

    #[test]
    fn test_scope_keeps_explicit_port() {
        assert_eq!(
            scope_of(&"http://localhost:3000/".parse().unwrap()),
            "http://localhost:3000"
        );
    }

    #[test]
    fn test_normalize_scope() {
        assert_eq!(
            normalize_scope("http://EXAMPLE.com:80").unwrap(),
            "http://example.com"
        );
        assert!(normalize_scope("/not/an/origin").is_err());
    }

    #[test]
    fn test_parse_query_single_and_repeated() {
        let query = parse_query("page=1&tag=a&tag=b");

        assert_eq!(
            query.get("page"),
            Some(&QueryValue::Single("1".to_string()))
        );
        assert_eq!(
            query.get("tag"),
            Some(&QueryValue::Many(vec!["a".to_string(), "b".to_string()]))
        );
    }

    #[test]
    fn test_parse_query_decodes_values() {
        let query = parse_query("q=hello%20world&name=a+b");

        assert_eq!(
            query.get("q"),
            Some(&QueryValue::Single("hello world".to_string()))
        );
        assert_eq!(
            query.get("name"),
            Some(&QueryValue::Single("a b".to_string()))
        );
    }

    #[test]
    fn test_parse_query_valueless_key() {
        let query = parse_query("flag");
        assert_eq!(query.get("flag"), Some(&QueryValue::Single(String::new())));
    }

    #[test]
    fn test_request_body_json_content_type_parses() {
        let body = RecordedBody::from_request(Some("application/json"), b"{\"a\":1}");
        assert_eq!(body, RecordedBody::Json(json!({"a": 1})));
    }

    #[test]
    fn test_request_body_invalid_json_stays_text() {
        let body = RecordedBody::from_request(Some("application/json"), b"not json");
        assert_eq!(body, RecordedBody::Text("not json".to_string()));
    }

    #[test]
    fn test_request_body_binary() {
        let body = RecordedBody::from_request(None, &[0x00, 0xff, 0x80]);
        assert_eq!(body, RecordedBody::Binary(vec![0x00, 0xff, 0x80]));
    }

    #[test]
    fn test_response_body_classification() {
        assert_eq!(
            RecordedBody::from_response(Some("text/plain"), b"012345".to_vec()),
            RecordedBody::Text("012345".to_string())
        );
        assert_eq!(
            RecordedBody::from_response(Some("application/octet-stream"), vec![1, 2, 3]),
            RecordedBody::Binary(vec![1, 2, 3])
        );
        assert_eq!(
            RecordedBody::from_response(None, b"plain".to_vec()),
            RecordedBody::Text("plain".to_string())
        );
    }

    #[test]
    fn test_binary_body_serializes_to_hex() {
        let body = RecordedBody::Binary(vec![0x00, 0xff]);
        assert_eq!(serde_json::to_value(&body).unwrap(), json!("00ff"));

        let back: RecordedBody = serde_json::from_value(json!("00ff")).unwrap();
        assert_eq!(back, body);
    }

    #[test]
    fn test_text_body_survives_deserialization() {
        // Valid hex characters, but the decoded bytes are valid UTF-8, so it
        // stays text.
        let back: RecordedBody = serde_json::from_value(json!("012345")).unwrap();
        assert_eq!(back, RecordedBody::Text("012345".to_string()));
    }

    #[test]
    fn test_definition_serde_contract() {
        let json = json!({
            "scope": "http://example.com",
            "method": "GET",
            "path": "/",
            "response": "012345",
            "rawHeaders": [["content-type", "text/plain"]]
        });

        let def: ExchangeDefinition = serde_json::from_value(json).unwrap();

        assert_eq!(def.status, 200, "status defaults to 200");
        assert_eq!(def.response, RecordedBody::Text("012345".to_string()));
        assert_eq!(
            def.raw_headers,
            vec![("content-type".to_string(), "text/plain".to_string())]
        );
        assert!(def.reqheaders.is_none());

        let round = serde_json::to_value(&def).unwrap();
        assert!(round.get("rawHeaders").is_some());
        assert!(round.get("reqheaders").is_none());
        assert!(round.get("body").is_none(), "empty body is omitted");
    }

    #[test]
    fn test_from_exchange_basic() {
        let request = OutboundRequest::new("get", "http://localhost:3000/a/b?page=2")
            .unwrap()
            .body("ABCDEF");
        let response = ExchangeResponse {
            status: 200,
            headers: vec![
                ("content-type".to_string(), "text/plain".to_string()),
                ("connection".to_string(), "keep-alive".to_string()),
            ],
            body: b"012345".to_vec(),
        };

        let def =
            ExchangeDefinition::from_exchange(&request, &response, &RecordOptions::default())
                .unwrap();

        assert_eq!(def.scope, "http://localhost:3000");
        assert_eq!(def.method, "GET");
        assert_eq!(def.path, "/a/b");
        assert_eq!(def.query.get("page"), Some(&QueryValue::Single("2".into())));
        assert_eq!(def.body, RecordedBody::Text("ABCDEF".to_string()));
        assert_eq!(def.status, 200);
        assert_eq!(def.response, RecordedBody::Text("012345".to_string()));
        assert!(def.reqheaders.is_none());
        assert_eq!(
            def.raw_headers,
            vec![("content-type".to_string(), "text/plain".to_string())],
            "hop-by-hop headers are excluded"
        );
    }

    #[test]
    fn test_from_exchange_reqheaders_exclude_user_agent() {
        let request = OutboundRequest::new("GET", "http://example.com/")
            .unwrap()
            .header("X-Token", "abc")
            .header("User-Agent", "test-agent");
        let response = ExchangeResponse {
            status: 200,
            headers: vec![],
            body: vec![],
        };
        let options = RecordOptions {
            enable_reqheaders_recording: true,
            ..RecordOptions::default()
        };

        let def = ExchangeDefinition::from_exchange(&request, &response, &options).unwrap();
        let reqheaders = def.reqheaders.expect("reqheaders recorded");

        assert_eq!(reqheaders.get("x-token"), Some(&"abc".to_string()));
        assert!(!reqheaders.contains_key("user-agent"));
    }

    #[test]
    fn test_from_exchange_dont_rec_res_headers() {
        let request = OutboundRequest::new("GET", "http://example.com/").unwrap();
        let response = ExchangeResponse {
            status: 200,
            headers: vec![("content-type".to_string(), "text/plain".to_string())],
            body: vec![],
        };
        let options = RecordOptions {
            dont_rec_res_headers: true,
            ..RecordOptions::default()
        };

        let def = ExchangeDefinition::from_exchange(&request, &response, &options).unwrap();
        assert!(def.raw_headers.is_empty());
    }
}
