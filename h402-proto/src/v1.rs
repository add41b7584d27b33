//! Protocol version 1 (legacy) wire types.
//!
//! V1 identifies networks by human-readable aliases (`"base-sepolia"`),
//! carries resource metadata inline in the requirements, and its payment
//! payload names `scheme`/`network` at the top level instead of embedding
//! the accepted requirements.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payment terms offered by a resource server (V1 shape).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirementsV1 {
    /// Payment scheme identifier (e.g., `"exact"`).
    pub scheme: String,

    /// Network alias (e.g., `"base-sepolia"`).
    pub network: String,

    /// Maximum amount required, smallest unit, as a decimal string.
    pub max_amount_required: String,

    /// URL of the protected resource.
    pub resource: String,

    /// Human-readable description of the resource.
    #[serde(default)]
    pub description: String,

    /// MIME type of the resource content.
    #[serde(default)]
    pub mime_type: String,

    /// Optional JSON schema of the resource output (also carries V1
    /// bazaar discovery declarations under `input`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,

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

/// A signed payment from the buyer (V1 shape).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayloadV1 {
    /// Protocol version (always `1`).
    pub x402_version: u32,

    /// Payment scheme identifier.
    pub scheme: String,

    /// Network alias.
    pub network: String,

    /// Scheme-specific signed payload.
    pub payload: Value,
}

/// HTTP 402 Payment Required response body (V1 shape).
///
/// V1 has no header form: the JSON travels in the response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequiredV1 {
    /// Protocol version (always `1`).
    pub x402_version: u32,

    /// Acceptable payment options, most preferred first.
    #[serde(default)]
    pub accepts: Vec<PaymentRequirementsV1>,

    /// Optional error description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
