//! Protocol version 2 (current) wire types.
//!
//! V2 identifies networks by CAIP-2 chain IDs (`"eip155:8453"`,
//! `"solana:<genesis-hash>"`) and embeds the accepted requirements inside
//! the payment payload, so a facilitator can check the buyer agreed to
//! the exact terms the server offered.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Network;

/// Payment terms offered by a resource server.
///
/// After server-side enhancement, `amount` is a decimal integer string in
/// the asset's smallest unit and `extra` carries scheme-specific data
/// (EIP-712 domain parameters, a Solana fee payer, …). Requirements are
/// immutable once offered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// Payment scheme identifier (e.g., `"exact"`).
    pub scheme: String,

    /// CAIP-2 network identifier.
    pub network: Network,

    /// Amount in the asset's smallest unit, as a decimal string.
    pub amount: String,

    /// Recipient address.
    pub pay_to: String,

    /// Maximum validity window for the payment, in seconds.
    pub max_timeout_seconds: u64,

    /// Asset address/identifier.
    pub asset: String,

    /// Scheme-specific extra data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

impl PaymentRequirements {
    /// Compares the five protocol-critical fields: scheme, network,
    /// amount, asset, and `payTo`.
    ///
    /// `maxTimeoutSeconds` and `extra` are deliberately ignored so that
    /// facilitator enrichment cannot produce false-negative rejections.
    #[must_use]
    pub fn core_fields_match(&self, other: &Self) -> bool {
        self.scheme == other.scheme
            && self.network == other.network
            && self.amount == other.amount
            && self.asset == other.asset
            && self.pay_to == other.pay_to
    }
}

/// Metadata about the resource being paid for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    /// URL of the resource.
    pub url: String,

    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// MIME type of the resource content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl ResourceInfo {
    /// Creates resource info with only a URL.
    #[must_use]
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            description: None,
            mime_type: None,
        }
    }
}

/// A signed payment from the buyer.
///
/// `accepted` is the exact offer the buyer chose; the resource server
/// requires it to match one of its offered requirements before verifying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    /// Protocol version (always `2`).
    pub x402_version: u32,

    /// The payment requirements the buyer accepted.
    pub accepted: PaymentRequirements,

    /// Scheme-specific signed payload.
    pub payload: Value,

    /// Information about the resource being paid for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceInfo>,

    /// Protocol extension data keyed by extension name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl PaymentPayload {
    /// Returns the accepted scheme identifier.
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.accepted.scheme
    }

    /// Returns the accepted network identifier.
    #[must_use]
    pub fn network(&self) -> &str {
        &self.accepted.network
    }
}

/// HTTP 402 Payment Required response body / header value.
///
/// `accepts` is the server's offer set in preference order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    /// Protocol version (always `2`).
    pub x402_version: u32,

    /// Acceptable payment options, most preferred first.
    #[serde(default)]
    pub accepts: Vec<PaymentRequirements>,

    /// Optional error description when the previous attempt was rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Information about the protected resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceInfo>,

    /// Protocol extension data keyed by extension name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

/// Body of a facilitator `POST /verify` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    /// The signed payment payload.
    pub payment_payload: PaymentPayload,

    /// The requirements the payload is checked against.
    pub payment_requirements: PaymentRequirements,
}

/// Body of a facilitator `POST /settle` request.
///
/// Structurally identical to [`VerifyRequest`]; a distinct type keeps the
/// two operations from being confused at compile time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleRequest {
    /// The signed payment payload.
    pub payment_payload: PaymentPayload,

    /// The requirements the payload is settled against.
    pub payment_requirements: PaymentRequirements,
}

impl From<VerifyRequest> for SettleRequest {
    fn from(request: VerifyRequest) -> Self {
        Self {
            payment_payload: request.payment_payload,
            payment_requirements: request.payment_requirements,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".into(),
            network: "eip155:8453".into(),
            amount: "1000000".into(),
            pay_to: "0x1234567890123456789012345678901234567890".into(),
            max_timeout_seconds: 300,
            asset: "0x0000000000000000000000000000000000000000".into(),
            extra: None,
        }
    }

    #[test]
    fn requirements_serialize_camel_case() {
        let value = serde_json::to_value(requirements()).unwrap();
        assert_eq!(value["payTo"], "0x1234567890123456789012345678901234567890");
        assert_eq!(value["maxTimeoutSeconds"], 300);
        assert!(value.get("extra").is_none());
    }

    #[test]
    fn payload_roundtrip() {
        let payload = PaymentPayload {
            x402_version: 2,
            accepted: requirements(),
            payload: json!({"signature": "0x123"}),
            resource: Some(ResourceInfo::from_url("https://example.com/api")),
            extensions: None,
        };
        let encoded = serde_json::to_string(&payload).unwrap();
        let decoded: PaymentPayload = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, payload);
        assert_eq!(decoded.scheme(), "exact");
        assert_eq!(decoded.network(), "eip155:8453");
    }

    #[test]
    fn core_fields_ignore_timeout_and_extra() {
        let a = requirements();
        let mut b = requirements();
        b.max_timeout_seconds = 999;
        b.extra = Some(json!({"name": "USD Coin", "version": "2"}));
        assert!(a.core_fields_match(&b));

        let mut c = requirements();
        c.amount = "2000000".into();
        assert!(!a.core_fields_match(&c));
    }
}
