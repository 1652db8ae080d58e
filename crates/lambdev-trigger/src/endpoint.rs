//! Endpoints: one per recognized trigger of a function.
//!
//! An [`Endpoint`] knows its route and how to translate in both directions:
//! inbound request → invocation event, and handler outcome → HTTP response.
//!
//! | Kind | Route | Event |
//! |---|---|---|
//! | Skill | `POST /alexa-skill/<function>` | request body, unchanged |
//! | Http | `<METHOD> /http<resource>` | API-gateway proxy event |

use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::Response;
use axum::routing::MethodFilter;
use lambdev_core::{HttpTriggerConfig, TriggerKind};
use lambdev_invoke::HandlerError;
use regex::{Captures, Regex};
use serde_json::{Map, Value, json};
use tracing::warn;

use crate::convert::{InboundRequest, headers_from_json, send, status_from_value, status_only};
use crate::error::EndpointError;

pub const SKILL_MOUNT: &str = "/alexa-skill";
pub const HTTP_MOUNT: &str = "/http";

/// `{name}` or the greedy `{name+}`.
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z0-9_]+)(\+)?\}").expect("placeholder regex"));

/// Method an endpoint answers to. `ANY` matches every verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteMethod {
    Any,
    Only(Method),
}

impl RouteMethod {
    fn parse(function: &str, raw: &str) -> Result<Self, EndpointError> {
        let upper = raw.to_ascii_uppercase();
        if upper == "ANY" {
            return Ok(RouteMethod::Any);
        }
        let invalid = || EndpointError::InvalidMethod {
            function: function.to_string(),
            method: raw.to_string(),
        };
        let method = Method::from_bytes(upper.as_bytes()).map_err(|_| invalid())?;
        // Only verbs the router can filter on are bindable.
        MethodFilter::try_from(method.clone()).map_err(|_| invalid())?;
        Ok(RouteMethod::Only(method))
    }

    /// True when both methods would answer the same request verb.
    pub fn overlaps(&self, other: &RouteMethod) -> bool {
        match (self, other) {
            (RouteMethod::Any, _) | (_, RouteMethod::Any) => true,
            (RouteMethod::Only(a), RouteMethod::Only(b)) => a == b,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RouteMethod::Any => "ANY",
            RouteMethod::Only(method) => method.as_str(),
        }
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Greedy(String),
}

impl Segment {
    fn route_token(&self) -> String {
        match self {
            Segment::Literal(s) => s.clone(),
            Segment::Param(name) => format!("{{{name}}}"),
            Segment::Greedy(name) => format!("{{*{name}}}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SkillEndpoint {
    function_name: String,
    route_path: String,
}

#[derive(Debug, Clone)]
pub struct HttpEndpoint {
    function_name: String,
    method: RouteMethod,
    /// Declared resource path, placeholders intact.
    resource: String,
    route_path: String,
    template: Vec<Segment>,
}

#[derive(Debug, Clone)]
pub enum Endpoint {
    Skill(SkillEndpoint),
    Http(HttpEndpoint),
}

impl Endpoint {
    pub fn skill(function_name: &str) -> Self {
        Endpoint::Skill(SkillEndpoint {
            function_name: function_name.to_string(),
            route_path: format!("{SKILL_MOUNT}/{function_name}"),
        })
    }

    /// Build an HTTP endpoint; fails when method or path is missing or unusable.
    pub fn http(function_name: &str, config: &HttpTriggerConfig) -> Result<Self, EndpointError> {
        if config.method.is_empty() {
            return Err(EndpointError::MissingMethod {
                function: function_name.to_string(),
            });
        }
        if config.path.is_empty() {
            return Err(EndpointError::MissingPath {
                function: function_name.to_string(),
            });
        }
        let method = RouteMethod::parse(function_name, &config.method)?;
        let template = parse_template(function_name, &config.path)?;
        let route_path = std::iter::once(HTTP_MOUNT.to_string())
            .chain(template.iter().map(|s| format!("/{}", s.route_token())))
            .collect();
        Ok(Endpoint::Http(HttpEndpoint {
            function_name: function_name.to_string(),
            method,
            resource: config.path.clone(),
            route_path,
            template,
        }))
    }

    pub fn kind(&self) -> TriggerKind {
        match self {
            Endpoint::Skill(_) => TriggerKind::Skill,
            Endpoint::Http(_) => TriggerKind::Http,
        }
    }

    pub fn method(&self) -> RouteMethod {
        match self {
            Endpoint::Skill(_) => RouteMethod::Only(Method::POST),
            Endpoint::Http(http) => http.method.clone(),
        }
    }

    /// Mount-prefixed route path in router syntax.
    pub fn path(&self) -> &str {
        match self {
            Endpoint::Skill(skill) => &skill.route_path,
            Endpoint::Http(http) => &http.route_path,
        }
    }

    /// Paths to register: the route plus its trailing-slash variant. A
    /// catch-all route already absorbs the slash.
    pub fn route_paths(&self) -> Vec<String> {
        let path = self.path();
        let greedy = path.rsplit('/').next().is_some_and(|last| last.starts_with("{*"));
        if greedy {
            vec![path.to_string()]
        } else {
            vec![path.to_string(), format!("{path}/")]
        }
    }

    pub fn function_name(&self) -> &str {
        match self {
            Endpoint::Skill(skill) => &skill.function_name,
            Endpoint::Http(http) => &http.function_name,
        }
    }

    /// Build the invocation event for this trigger kind.
    pub fn build_event(&self, request: &InboundRequest) -> Value {
        match self {
            Endpoint::Skill(_) => request.body.clone(),
            Endpoint::Http(http) => http.build_event(request),
        }
    }

    pub fn render_success(&self, value: Value) -> Response {
        match self {
            Endpoint::Skill(_) => send(StatusCode::OK, HeaderMap::new(), &value),
            Endpoint::Http(http) => http.render_success(&value),
        }
    }

    /// Both kinds answer failures with a bare 500; the platform's error
    /// envelope is not reproduced.
    pub fn render_failure(&self, _error: &HandlerError) -> Response {
        status_only(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Skill(skill) => write!(f, "Alexa-Skill: {}", skill.function_name),
            Endpoint::Http(http) => write!(f, "HTTP: {} {}", http.method, http.resource),
        }
    }
}

impl HttpEndpoint {
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Capture placeholder values from a request path under the mount prefix.
    pub fn path_parameters(&self, request_path: &str) -> Map<String, Value> {
        let rest = request_path.strip_prefix(HTTP_MOUNT).unwrap_or(request_path);
        let parts: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
        let mut params = Map::new();
        for (idx, segment) in self.template.iter().enumerate() {
            match segment {
                Segment::Literal(_) => {}
                Segment::Param(name) => {
                    if let Some(raw) = parts.get(idx) {
                        params.insert(name.clone(), Value::String(decode_segment(raw)));
                    }
                }
                Segment::Greedy(name) => {
                    let tail = parts.get(idx..).unwrap_or_default().join("/");
                    params.insert(name.clone(), Value::String(decode_segment(&tail)));
                }
            }
        }
        params
    }

    /// The declared resource with placeholders replaced by captured values.
    pub fn concrete_path(&self, params: &Map<String, Value>) -> String {
        PLACEHOLDER
            .replace_all(&self.resource, |caps: &Captures| {
                params
                    .get(&caps[1])
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            })
            .into_owned()
    }

    fn build_event(&self, request: &InboundRequest) -> Value {
        let params = self.path_parameters(&request.path);
        let path = self.concrete_path(&params);
        // Handlers compare against this exact formatting.
        let body = serde_json::to_string_pretty(&request.body).unwrap_or_default();
        json!({
            "resource": self.resource,
            "path": path,
            "httpMethod": request.method.as_str(),
            "headers": request.headers_json(),
            "queryStringParameters": request.query,
            "pathParameters": params,
            "body": body,
        })
    }

    fn render_success(&self, value: &Value) -> Response {
        let Some(status) = value.get("statusCode").and_then(status_from_value) else {
            warn!(function = %self.function_name, "handler result has no valid statusCode");
            return status_only(StatusCode::INTERNAL_SERVER_ERROR);
        };
        let headers = value.get("headers").map(headers_from_json).unwrap_or_default();
        let body = value.get("body").unwrap_or(&Value::Null);
        send(status, headers, body)
    }
}

fn decode_segment(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// Split a declared resource into route segments (POSIX-style: empty and
/// `.` segments vanish, `..` drops the previous one).
fn parse_template(function: &str, resource: &str) -> Result<Vec<Segment>, EndpointError> {
    let invalid = |reason| EndpointError::InvalidPath {
        function: function.to_string(),
        path: resource.to_string(),
        reason,
    };
    let mut segments = Vec::new();
    for raw in resource.split('/') {
        match raw {
            "" | "." => continue,
            ".." => {
                segments.pop();
                continue;
            }
            _ => {}
        }
        if matches!(segments.last(), Some(Segment::Greedy(_))) {
            return Err(invalid("greedy parameter must be the last segment"));
        }
        let segment = match PLACEHOLDER.captures(raw) {
            Some(caps) if caps[0].len() == raw.len() => {
                let name = caps[1].to_string();
                if caps.get(2).is_some() {
                    Segment::Greedy(name)
                } else {
                    Segment::Param(name)
                }
            }
            Some(_) => return Err(invalid("placeholder must span a whole segment")),
            None if raw.contains(['{', '}']) => return Err(invalid("unbalanced braces")),
            None if raw.starts_with([':', '*']) => {
                return Err(invalid("segment cannot start with ':' or '*'"));
            }
            None => Segment::Literal(raw.to_string()),
        };
        segments.push(segment);
    }

    let mut names = HashSet::new();
    for segment in &segments {
        if let Segment::Param(name) | Segment::Greedy(name) = segment {
            if !names.insert(name.as_str()) {
                return Err(invalid("duplicate parameter name"));
            }
        }
    }
    Ok(segments)
}
