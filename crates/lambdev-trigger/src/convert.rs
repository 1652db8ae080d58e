//! HTTP conversions between axum and the JSON shapes handlers see.
//!
//! Inbound: an axum request becomes an [`InboundRequest`] with its body
//! parsed and its query string decoded. Outbound: JSON values become
//! responses using the same rules as a `send(value)` call on a node
//! response (strings as HTML, other values as JSON, `null` as empty).

use axum::body::Body;
use axum::extract::Request;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::Response;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

/// Largest accepted request body (the platform's synchronous payload limit).
pub const MAX_BODY_BYTES: usize = 6 * 1024 * 1024;

const HTML_UTF8: &str = "text/html; charset=utf-8";
const JSON_UTF8: &str = "application/json; charset=utf-8";

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("failed to read request body: {0}")]
    Body(#[from] axum::Error),

    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),
}

/// The parts of an inbound request endpoints build events from.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    /// Raw (still percent-encoded) request path.
    pub path: String,
    pub query: Map<String, Value>,
    pub headers: HeaderMap,
    pub body: Value,
}

impl InboundRequest {
    /// A bodyless request; the body defaults to `{}` like an unparsed request.
    pub fn new(method: Method, path_and_query: &str) -> Self {
        let (path, query) = match path_and_query.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path_and_query, None),
        };
        Self {
            method,
            path: path.to_string(),
            query: parse_query(query),
            headers: HeaderMap::new(),
            body: Value::Object(Map::new()),
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Read and parse a full axum request.
    pub async fn from_request(request: Request) -> Result<Self, RequestError> {
        let (parts, body) = request.into_parts();
        let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES).await?;
        let content_type = parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());
        let body = parse_body(content_type, &bytes)?;
        Ok(Self {
            method: parts.method,
            path: parts.uri.path().to_string(),
            query: parse_query(parts.uri.query()),
            headers: parts.headers,
            body,
        })
    }

    /// Headers as a JSON object. Non-UTF-8 values are skipped.
    pub fn headers_json(&self) -> Map<String, Value> {
        let mut map = Map::new();
        for (name, value) in &self.headers {
            if let Ok(value) = value.to_str() {
                map.insert(name.as_str().to_string(), Value::String(value.to_string()));
            }
        }
        map
    }
}

/// Parse a request body.
///
/// JSON content types are parsed, an empty body becomes `{}`, anything else
/// is passed on as a (lossy UTF-8) string.
pub fn parse_body(content_type: Option<&str>, bytes: &[u8]) -> Result<Value, serde_json::Error> {
    if bytes.is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    if content_type.is_some_and(is_json) {
        return serde_json::from_slice(bytes);
    }
    Ok(Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

fn is_json(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}

/// Decode a query string into key → value. Repeated keys keep the last value.
pub fn parse_query(raw: Option<&str>) -> Map<String, Value> {
    let mut map = Map::new();
    for pair in raw.unwrap_or_default().split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        map.insert(decode_component(key), Value::String(decode_component(value)));
    }
    map
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// Read a `statusCode` value (number or numeric string).
pub fn status_from_value(value: &Value) -> Option<StatusCode> {
    let code = match value {
        Value::Number(n) => u16::try_from(n.as_u64()?).ok()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    StatusCode::from_u16(code).ok()
}

/// Convert a JSON header object. Invalid names or values are logged and dropped.
pub fn headers_from_json(value: &Value) -> HeaderMap {
    let mut map = HeaderMap::new();
    let Some(object) = value.as_object() else {
        return map;
    };
    for (name, value) in object {
        let value = match value {
            Value::String(s) => s.clone(),
            Value::Null => continue,
            other => other.to_string(),
        };
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => warn!(header = %name, "dropping invalid response header"),
        }
    }
    map
}

/// Build a response the way `send(body)` would: `null` is empty, strings
/// are HTML, any other value is serialized as JSON. A content type already
/// present in `headers` is kept.
pub fn send(status: StatusCode, mut headers: HeaderMap, body: &Value) -> Response {
    let bytes = match body {
        Value::Null => Vec::new(),
        Value::String(s) => {
            default_content_type(&mut headers, HTML_UTF8);
            s.clone().into_bytes()
        }
        other => {
            default_content_type(&mut headers, JSON_UTF8);
            other.to_string().into_bytes()
        }
    };
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    response.headers_mut().extend(headers);
    response
}

fn default_content_type(headers: &mut HeaderMap, value: &'static str) {
    if !headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(value));
    }
}

/// A bare status response with no body.
pub fn status_only(status: StatusCode) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_parsing() {
        let query = parse_query(Some("a=b&c=d&a=z&flag&sp=a+b&enc=%2Fx%20y"));
        assert_eq!(query["a"], "z");
        assert_eq!(query["c"], "d");
        assert_eq!(query["flag"], "");
        assert_eq!(query["sp"], "a b");
        assert_eq!(query["enc"], "/x y");
    }

    #[test]
    fn empty_query_is_empty_map() {
        assert!(parse_query(None).is_empty());
        assert!(parse_query(Some("")).is_empty());
    }

    #[test]
    fn inbound_request_splits_path_and_query() {
        let req = InboundRequest::new(Method::GET, "/http/items/42?x=1");
        assert_eq!(req.path, "/http/items/42");
        assert_eq!(req.query["x"], "1");
        assert_eq!(req.body, json!({}));
    }

    #[test]
    fn body_parsing() {
        assert_eq!(parse_body(None, b"").unwrap(), json!({}));
        assert_eq!(
            parse_body(Some("application/json"), br#"{"foo":"bar"}"#).unwrap(),
            json!({ "foo": "bar" })
        );
        assert_eq!(
            parse_body(Some("application/vnd.api+json; charset=utf-8"), b"[1]").unwrap(),
            json!([1])
        );
        assert_eq!(parse_body(Some("text/plain"), b"hi").unwrap(), json!("hi"));
        assert!(parse_body(Some("application/json"), b"{nope").is_err());
    }

    #[test]
    fn status_values() {
        assert_eq!(status_from_value(&json!(204)), Some(StatusCode::NO_CONTENT));
        assert_eq!(status_from_value(&json!("201")), Some(StatusCode::CREATED));
        assert_eq!(status_from_value(&json!(99999)), None);
        assert_eq!(status_from_value(&json!(null)), None);
        assert_eq!(status_from_value(&json!(-1)), None);
    }

    #[test]
    fn header_conversion() {
        let headers = headers_from_json(&json!({
            "Content-Type": "application/json",
            "X-Count": 3,
            "X-Null": null,
            "bad header": "x",
        }));
        assert_eq!(headers["content-type"], "application/json");
        assert_eq!(headers["x-count"], "3");
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn send_content_types() {
        let response = send(StatusCode::OK, HeaderMap::new(), &json!("<p>hi</p>"));
        assert_eq!(response.headers()[CONTENT_TYPE], HTML_UTF8);

        let response = send(StatusCode::OK, HeaderMap::new(), &json!({ "a": 1 }));
        assert_eq!(response.headers()[CONTENT_TYPE], JSON_UTF8);

        let response = send(StatusCode::NO_CONTENT, HeaderMap::new(), &Value::Null);
        assert!(response.headers().get(CONTENT_TYPE).is_none());
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        let response = send(StatusCode::OK, headers, &json!("x"));
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain");
    }
}
