//! Facilitator-side bazaar extraction.
//!
//! After a verified payment, the facilitator can lift a
//! [`DiscoveredResource`] out of the payment payload for cataloging.
//! V2 payloads carry the declaration under `extensions.bazaar`; V1
//! requirements carry it under `outputSchema.input` with
//! `discoverable: true`.

use serde_json::Value;

use super::types::{BAZAAR, DiscoveryInfo, parse_discovery_extension, parse_discovery_info};

/// A paid resource lifted from a verified payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredResource {
    /// Resource URL with query string and fragment stripped.
    pub resource_url: String,

    /// The HTTP method the resource is invoked with.
    pub method: String,

    /// Protocol version the payment used.
    pub x402_version: u32,

    /// The payment requirements the resource was paid under.
    pub payment_requirements: Value,

    /// Typed discovery info from the declaration.
    pub discovery_info: DiscoveryInfo,
}

/// Outcome of declaration validation.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Whether the declaration is well-formed.
    pub valid: bool,

    /// Problems found, empty when valid.
    pub errors: Vec<String>,

    /// The parsed info when validation succeeded.
    pub info: Option<DiscoveryInfo>,
}

/// Validates a bazaar declaration value.
#[must_use]
pub fn validate_discovery_extension(declaration: &Value) -> ValidationResult {
    let mut errors = Vec::new();

    let Some(info_value) = declaration.get("info") else {
        return ValidationResult {
            valid: false,
            errors: vec!["declaration has no info object".into()],
            info: None,
        };
    };
    let Some(input) = info_value.get("input") else {
        return ValidationResult {
            valid: false,
            errors: vec!["declaration info has no input object".into()],
            info: None,
        };
    };
    if input.get("type").and_then(Value::as_str) != Some("http") {
        errors.push("input type must be \"http\"".into());
    }

    let info = parse_discovery_info(info_value);
    if info.is_none() {
        errors.push("declaration info does not parse as discovery info".into());
    }

    ValidationResult {
        valid: errors.is_empty() && info.is_some(),
        errors,
        info,
    }
}

/// Validates a declaration and returns the parsed info in one pass.
#[must_use]
pub fn validate_and_extract(declaration: &Value) -> ValidationResult {
    validate_discovery_extension(declaration)
}

/// Parses the discovery info out of a declaration value.
#[must_use]
pub fn extract_discovery_info_from_extension(declaration: &Value) -> Option<DiscoveryInfo> {
    parse_discovery_extension(declaration).map(|ext| ext.info)
}

/// Lifts a [`DiscoveredResource`] out of a payment payload and its
/// requirements, both given as raw JSON.
///
/// Returns `None` when no bazaar declaration is present or the
/// declaration does not parse. Query strings and fragments are stripped
/// from the resource URL so the catalog keys on the canonical resource.
#[must_use]
pub fn extract_discovery_info(payload: &Value, requirements: &Value) -> Option<DiscoveredResource> {
    let version = payload
        .get("x402Version")
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(2);

    if version == 1 {
        extract_v1(payload, requirements)
    } else {
        extract_v2(version, payload, requirements)
    }
}

fn extract_v2(
    version: u32,
    payload: &Value,
    requirements: &Value,
) -> Option<DiscoveredResource> {
    let declaration = payload.get("extensions")?.get(BAZAAR)?;
    let info = extract_discovery_info_from_extension(declaration)?;
    let url = payload.get("resource")?.get("url")?.as_str()?;
    let method = info.method().unwrap_or("GET").to_owned();

    Some(DiscoveredResource {
        resource_url: strip_url(url),
        method,
        x402_version: version,
        payment_requirements: requirements.clone(),
        discovery_info: info,
    })
}

fn extract_v1(payload: &Value, requirements: &Value) -> Option<DiscoveredResource> {
    let input = requirements.get("outputSchema")?.get("input")?;
    if input.get("discoverable").and_then(Value::as_bool) != Some(true) {
        return None;
    }
    let info = parse_discovery_info(&serde_json::json!({ "input": input }))?;
    let url = requirements.get("resource")?.as_str()?;
    let method = info.method().unwrap_or("GET").to_owned();

    Some(DiscoveredResource {
        resource_url: strip_url(url),
        method,
        x402_version: payload
            .get("x402Version")
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(1),
        payment_requirements: requirements.clone(),
        discovery_info: info,
    })
}

/// Cuts a URL at its query string or fragment, whichever comes first.
fn strip_url(url: &str) -> String {
    let end = url
        .find(['?', '#'])
        .unwrap_or(url.len());
    url[..end].to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bazaar::declare_discovery_extension;
    use serde_json::json;

    fn v2_payload(url: &str) -> Value {
        let extensions = declare_discovery_extension(
            json!({"city": "SF"}),
            Some(json!({"properties": {"city": {"type": "string"}}})),
            None,
            None,
        );
        json!({
            "x402Version": 2,
            "resource": {"url": url},
            "extensions": extensions,
            "accepted": {},
        })
    }

    #[test]
    fn extracts_v2_query_extension() {
        let payload = v2_payload("https://api.example.com/weather");
        let requirements = json!({"scheme": "exact", "network": "eip155:8453"});

        let result = extract_discovery_info(&payload, &requirements).unwrap();
        assert_eq!(result.resource_url, "https://api.example.com/weather");
        assert_eq!(result.x402_version, 2);
        assert!(matches!(result.discovery_info, DiscoveryInfo::Query(_)));
    }

    #[test]
    fn extracts_v2_body_extension() {
        let extensions =
            declare_discovery_extension(json!({"text": "hello"}), None, Some("json"), None);
        let payload = json!({
            "x402Version": 2,
            "resource": {"url": "https://api.example.com/translate"},
            "extensions": extensions,
            "accepted": {},
        });
        let result = extract_discovery_info(&payload, &json!({})).unwrap();
        assert!(matches!(result.discovery_info, DiscoveryInfo::Body(_)));
    }

    #[test]
    fn absent_extension_yields_none() {
        let payload = json!({
            "x402Version": 2,
            "resource": {"url": "https://api.example.com/data"},
            "extensions": {},
            "accepted": {},
        });
        assert!(extract_discovery_info(&payload, &json!({})).is_none());

        let no_extensions = json!({
            "x402Version": 2,
            "resource": {"url": "https://api.example.com/data"},
            "accepted": {},
        });
        assert!(extract_discovery_info(&no_extensions, &json!({})).is_none());
    }

    #[test]
    fn strips_query_and_fragment_from_v2_url() {
        for (raw, expected) in [
            (
                "https://api.example.com/weather?city=NYC&units=metric",
                "https://api.example.com/weather",
            ),
            (
                "https://api.example.com/docs#section-1",
                "https://api.example.com/docs",
            ),
            (
                "https://api.example.com/page?foo=bar#anchor",
                "https://api.example.com/page",
            ),
        ] {
            let result = extract_discovery_info(&v2_payload(raw), &json!({})).unwrap();
            assert_eq!(result.resource_url, expected);
        }
    }

    #[test]
    fn extracts_v1_from_output_schema() {
        let requirements = json!({
            "scheme": "exact",
            "network": "eip155:8453",
            "maxAmountRequired": "10000",
            "resource": "https://api.example.com/search?q=test&page=1",
            "outputSchema": {
                "input": {
                    "type": "http",
                    "method": "GET",
                    "discoverable": true,
                    "queryParams": {"q": "string"},
                },
            },
            "payTo": "0x...",
            "maxTimeoutSeconds": 300,
            "asset": "0x...",
        });
        let payload = json!({
            "x402Version": 1,
            "scheme": "exact",
            "network": "eip155:8453",
            "payload": {},
        });

        let result = extract_discovery_info(&payload, &requirements).unwrap();
        assert_eq!(result.resource_url, "https://api.example.com/search");
        assert_eq!(result.x402_version, 1);
        assert_eq!(result.method, "GET");
    }

    #[test]
    fn v1_without_discoverable_flag_yields_none() {
        let requirements = json!({
            "resource": "https://api.example.com/x",
            "outputSchema": {"input": {"type": "http", "method": "GET"}},
        });
        let payload = json!({"x402Version": 1});
        assert!(extract_discovery_info(&payload, &requirements).is_none());
    }

    #[test]
    fn validation_reports_problems() {
        let ok = declare_discovery_extension(json!({"q": "x"}), None, None, None);
        let result = validate_and_extract(&ok[BAZAAR]);
        assert!(result.valid);
        assert!(result.info.is_some());
        assert!(result.errors.is_empty());

        let bad = json!({"schema": {}});
        let result = validate_discovery_extension(&bad);
        assert!(!result.valid);
        assert!(!result.errors.is_empty());
    }
}
