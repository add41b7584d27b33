//! Bazaar declaration types and the declaration builder.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// The bazaar extension key.
pub const BAZAAR: &str = "bazaar";

/// Returns whether the method carries its input in the query string
/// (GET, HEAD, DELETE). Case-insensitive.
#[must_use]
pub fn is_query_method(method: &str) -> bool {
    matches!(
        method.to_ascii_uppercase().as_str(),
        "GET" | "HEAD" | "DELETE"
    )
}

/// Returns whether the method carries its input in the request body
/// (POST, PUT, PATCH). Case-insensitive.
#[must_use]
pub fn is_body_method(method: &str) -> bool {
    matches!(method.to_ascii_uppercase().as_str(), "POST" | "PUT" | "PATCH")
}

/// Input description for query-style invocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryInput {
    /// Transport type; always `"http"`.
    #[serde(rename = "type")]
    pub kind: String,

    /// HTTP method, injected by server-side enrichment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// Example query parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_params: Option<Value>,

    /// Example request headers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Value>,
}

/// Input description for body-style invocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyInput {
    /// Transport type; always `"http"`.
    #[serde(rename = "type")]
    pub kind: String,

    /// HTTP method, injected by server-side enrichment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// Body encoding (e.g., `"json"`).
    pub body_type: String,

    /// Example request body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    /// Example request headers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Value>,
}

/// Output description for a discovered resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputInfo {
    /// Output encoding (e.g., `"json"`).
    #[serde(rename = "type")]
    pub kind: String,

    /// Example output value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
}

/// Discovery info for query-style resources (GET/HEAD/DELETE).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDiscoveryInfo {
    /// Input description.
    pub input: QueryInput,

    /// Optional output description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputInfo>,
}

/// Discovery info for body-style resources (POST/PUT/PATCH).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyDiscoveryInfo {
    /// Input description.
    pub input: BodyInput,

    /// Optional output description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputInfo>,
}

/// Discovery info, typed by invocation style.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DiscoveryInfo {
    /// Body-style info (tried first: `bodyType` is its distinguishing
    /// field).
    Body(BodyDiscoveryInfo),
    /// Query-style info.
    Query(QueryDiscoveryInfo),
}

impl DiscoveryInfo {
    /// Returns the declared HTTP method, if enrichment has run.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Body(info) => info.input.method.as_deref(),
            Self::Query(info) => info.input.method.as_deref(),
        }
    }
}

/// A full bazaar declaration: discovery info plus a JSON schema of the
/// input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryExtension {
    /// The discovery info.
    pub info: DiscoveryInfo,

    /// JSON schema describing the input object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
}

/// Parses a declaration value into a typed [`DiscoveryExtension`].
///
/// Body-style declarations are recognized by `info.input.bodyType`.
#[must_use]
pub fn parse_discovery_extension(declaration: &Value) -> Option<DiscoveryExtension> {
    serde_json::from_value(declaration.clone()).ok()
}

/// Parses a bare discovery info value (the `info` object of a
/// declaration).
#[must_use]
pub fn parse_discovery_info(info: &Value) -> Option<DiscoveryInfo> {
    serde_json::from_value(info.clone()).ok()
}

/// Builds a bazaar declaration for a route's extension map.
///
/// Returns `{"bazaar": declaration}` ready to merge into
/// `RouteConfig.extensions`. The HTTP method is *not* part of the
/// declaration: the server-side extension injects it per request.
///
/// - `input` — example input (query parameters or body, depending on
///   `body_type`).
/// - `input_schema` — optional JSON-schema `properties` for the input.
/// - `body_type` — present for body-style resources (e.g., `"json"`).
/// - `output` — optional example output.
#[must_use]
pub fn declare_discovery_extension(
    input: Value,
    input_schema: Option<Value>,
    body_type: Option<&str>,
    output: Option<Value>,
) -> Map<String, Value> {
    let input_decl = match body_type {
        Some(body_type) => json!({
            "type": "http",
            "bodyType": body_type,
            "body": input,
        }),
        None => json!({
            "type": "http",
            "queryParams": input,
        }),
    };

    let mut info = Map::new();
    info.insert("input".into(), input_decl);
    if let Some(output) = output {
        info.insert("output".into(), json!({"type": "json", "example": output}));
    }

    let mut input_properties = json!({
        "type": {"type": "string"},
        "method": {"type": "string"},
    });
    if let Some(Value::Object(schema)) = input_schema {
        let merged = input_properties
            .as_object_mut()
            .expect("input_properties is an object");
        let extra = schema
            .get("properties")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or(schema);
        for (key, value) in extra {
            merged.insert(key, value);
        }
    }

    let declaration = json!({
        "info": Value::Object(info),
        "schema": {
            "type": "object",
            "properties": {
                "input": {
                    "type": "object",
                    "properties": input_properties,
                    "required": ["type"],
                }
            }
        }
    });

    let mut extensions = Map::new();
    extensions.insert(BAZAAR.into(), declaration);
    extensions
}
