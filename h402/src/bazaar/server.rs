//! Server-side bazaar enrichment.

use serde_json::Value;

use crate::server::ResourceServerExtension;

use super::types::BAZAAR;

/// Enriches bazaar declarations with the live request's HTTP method.
///
/// Register on an [`X402ResourceServer`](crate::X402ResourceServer); the
/// HTTP runner passes a transport context of the shape
/// `{"method": "GET"}` when building a 402 response. Declarations stay
/// untouched when no usable context is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct BazaarServerExtension;

impl ResourceServerExtension for BazaarServerExtension {
    fn key(&self) -> &str {
        BAZAAR
    }

    fn enrich_declaration(&self, declaration: Value, transport_context: &Value) -> Value {
        let Some(method) = transport_context.get("method").and_then(Value::as_str) else {
            return declaration;
        };
        let method = method.to_ascii_uppercase();

        let mut enriched = declaration;
        if let Some(input) = enriched
            .get_mut("info")
            .and_then(|info| info.get_mut("input"))
            .and_then(Value::as_object_mut)
        {
            input.insert("method".into(), Value::String(method));
        } else {
            return enriched;
        }

        // The method is now a hard requirement of the input schema.
        if let Some(required) = enriched
            .get_mut("schema")
            .and_then(|schema| schema.get_mut("properties"))
            .and_then(|props| props.get_mut("input"))
            .and_then(|input| input.get_mut("required"))
            .and_then(Value::as_array_mut)
        {
            if !required.iter().any(|v| v == "method") {
                required.push(Value::String("method".into()));
            }
        }

        enriched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bazaar::declare_discovery_extension;
    use serde_json::json;

    fn declaration() -> Value {
        declare_discovery_extension(json!({"query": "test"}), None, None, None)[BAZAAR].clone()
    }

    #[test]
    fn injects_method_from_context() {
        let enriched =
            BazaarServerExtension.enrich_declaration(declaration(), &json!({"method": "get"}));
        assert_eq!(enriched["info"]["input"]["method"], "GET");
    }

    #[test]
    fn marks_method_required_in_schema() {
        let enriched =
            BazaarServerExtension.enrich_declaration(declaration(), &json!({"method": "DELETE"}));
        let required = enriched["schema"]["properties"]["input"]["required"]
            .as_array()
            .unwrap();
        assert!(required.iter().any(|v| v == "method"));
    }

    #[test]
    fn missing_context_leaves_declaration_unchanged() {
        let original = declaration();
        let enriched =
            BazaarServerExtension.enrich_declaration(original.clone(), &json!({"not_a_request": true}));
        assert_eq!(enriched, original);
    }

    #[test]
    fn preserves_existing_declaration_data() {
        let extensions = declare_discovery_extension(
            json!({"city": "San Francisco", "units": "celsius"}),
            Some(json!({"properties": {"city": {"type": "string"}}})),
            None,
            None,
        );
        let enriched = BazaarServerExtension
            .enrich_declaration(extensions[BAZAAR].clone(), &json!({"method": "GET"}));
        assert_eq!(enriched["info"]["input"]["type"], "http");
        assert_eq!(
            enriched["info"]["input"]["queryParams"]["city"],
            "San Francisco"
        );
        assert_eq!(
            enriched["schema"]["properties"]["input"]["properties"]["city"]["type"],
            "string"
        );
    }
}
