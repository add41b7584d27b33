//! Facilitator response types.
//!
//! Exchanged between resource servers and facilitators during payment
//! verification and settlement, and surfaced to buyers in the
//! `PAYMENT-RESPONSE` header.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{VecSkipError, serde_as};

use crate::Network;
use crate::reason::ErrorReason;

/// Result of payment verification.
///
/// `payer` is set exactly when `is_valid` is true; a failed
/// verification carries only the reason code and message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    /// Whether the payment passed all checks.
    pub is_valid: bool,

    /// Stable reason code when invalid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,

    /// Human-readable detail accompanying the reason code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_message: Option<String>,

    /// The payer's address, if identified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

impl VerifyResponse {
    /// A successful verification naming the payer.
    #[must_use]
    pub fn valid(payer: impl Into<String>) -> Self {
        Self {
            is_valid: true,
            invalid_reason: None,
            invalid_message: None,
            payer: Some(payer.into()),
        }
    }

    /// A failed verification with a stable reason code.
    #[must_use]
    pub fn invalid(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            invalid_reason: Some(reason.into()),
            invalid_message: Some(message.into()),
            payer: None,
        }
    }

    /// Returns the reason as a typed [`ErrorReason`] when it is one of
    /// the closed-set tokens.
    #[must_use]
    pub fn reason(&self) -> Option<ErrorReason> {
        let raw = self.invalid_reason.as_deref()?;
        serde_json::from_value(Value::String(raw.to_owned())).ok()
    }
}

/// Result of payment settlement.
///
/// On failure `transaction` is empty, or carries the hash of a submitted
/// but reverted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    /// Whether settlement landed on-chain.
    pub success: bool,

    /// Stable reason code when settlement failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,

    /// Human-readable detail accompanying the reason code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// The payer's address, if identified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,

    /// On-chain transaction identifier.
    #[serde(default)]
    pub transaction: String,

    /// Network where settlement was attempted.
    pub network: Network,
}

impl SettleResponse {
    /// A successful settlement.
    #[must_use]
    pub fn success(
        transaction: impl Into<String>,
        network: impl Into<String>,
        payer: impl Into<String>,
    ) -> Self {
        Self {
            success: true,
            error_reason: None,
            error_message: None,
            payer: Some(payer.into()),
            transaction: transaction.into(),
            network: network.into(),
        }
    }

    /// A failed settlement with a stable reason code.
    #[must_use]
    pub fn error(
        reason: impl Into<String>,
        message: impl Into<String>,
        network: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            error_reason: Some(reason.into()),
            error_message: Some(message.into()),
            payer: None,
            transaction: String::new(),
            network: network.into(),
        }
    }
}

/// A single (version, scheme, network) combination a facilitator handles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedKind {
    /// Protocol version for this kind (1 or 2).
    pub x402_version: u32,

    /// Payment scheme identifier.
    pub scheme: String,

    /// Network identifier or CAIP family pattern (e.g., `"eip155:*"`).
    pub network: Network,

    /// Scheme-specific support data (e.g., a Solana `feePayer`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

/// Response from a facilitator's `GET /supported` endpoint.
///
/// Unrecognized entries in `kinds` are skipped rather than failing the
/// whole response, so a facilitator may advertise kinds this client
/// does not model yet.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedResponse {
    /// Supported payment kinds.
    #[serde(default)]
    #[serde_as(as = "VecSkipError<_>")]
    pub kinds: Vec<SupportedKind>,

    /// Supported protocol extension keys (e.g., `["bazaar"]`).
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Signer addresses keyed by CAIP family pattern,
    /// e.g. `{"eip155:*": ["0xFacilitator…"]}`.
    #[serde(default)]
    pub signers: HashMap<String, Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_response_wire_shape() {
        let ok = VerifyResponse::valid("0xPayer");
        let value = serde_json::to_value(&ok).unwrap();
        assert_eq!(value["isValid"], true);
        assert_eq!(value["payer"], "0xPayer");
        assert!(value.get("invalidReason").is_none());

        let bad = VerifyResponse::invalid(ErrorReason::InvalidSignature, "bad signature");
        let value = serde_json::to_value(&bad).unwrap();
        assert_eq!(value["isValid"], false);
        assert_eq!(value["invalidReason"], "invalid_signature");
        // payer is set exactly when the payment is valid.
        assert!(value.get("payer").is_none());
    }

    #[test]
    fn verify_response_typed_reason() {
        let bad = VerifyResponse::invalid(ErrorReason::NonceUsed, "replay");
        assert_eq!(bad.reason(), Some(ErrorReason::NonceUsed));

        let custom = VerifyResponse::invalid("expired_signature", "cash only");
        assert_eq!(custom.reason(), None);
    }

    #[test]
    fn settle_response_roundtrip() {
        let ok = SettleResponse::success("0xabc123", "eip155:8453", "0xPayer");
        let json = serde_json::to_string(&ok).unwrap();
        let back: SettleResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ok);

        let err = SettleResponse::error(ErrorReason::Reverted, "status 0", "eip155:8453");
        assert!(!err.success);
        assert_eq!(err.transaction, "");
        assert_eq!(err.error_reason.as_deref(), Some("reverted"));
    }

    #[test]
    fn supported_response_defaults() {
        let parsed: SupportedResponse = serde_json::from_str("{\"kinds\": []}").unwrap();
        assert!(parsed.extensions.is_empty());
        assert!(parsed.signers.is_empty());
    }
}
