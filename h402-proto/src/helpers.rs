//! Version detection, tolerant parsing, and network pattern matching.
//!
//! These helpers sit between raw JSON and the typed [`v1`](crate::v1) /
//! [`v2`](crate::v2) structures. Parsing is tolerant: unknown fields are
//! ignored, and the protocol version is auto-detected from the
//! `x402Version` field (or, for payloads, from the presence of the V2
//! `accepted` field).

use serde_json::Value;

use crate::v1::{PaymentPayloadV1, PaymentRequiredV1, PaymentRequirementsV1};
use crate::v2::{PaymentPayload, PaymentRequired, PaymentRequirements};
use crate::{Network, ProtocolError};

/// Extracts the `x402Version` field from a JSON value.
///
/// # Errors
///
/// [`ProtocolError::MissingPaymentRequired`] when the field is absent,
/// [`ProtocolError::UnsupportedVersion`] for anything but 1 or 2.
pub fn detect_version(data: &Value) -> Result<u32, ProtocolError> {
    let version = data
        .get("x402Version")
        .and_then(Value::as_u64)
        .ok_or(ProtocolError::MissingPaymentRequired)?;
    match version {
        1 | 2 => Ok(u32::try_from(version).unwrap_or(2)),
        other => Err(ProtocolError::UnsupportedVersion(other)),
    }
}

/// Extracts the `x402Version` from raw JSON bytes.
///
/// # Errors
///
/// Returns [`ProtocolError`] on parse failure or an unsupported version.
pub fn detect_version_bytes(data: &[u8]) -> Result<u32, ProtocolError> {
    let parsed: Value = serde_json::from_slice(data)?;
    detect_version(&parsed)
}

/// Extracts `(scheme, network)` from a payment payload JSON value.
///
/// V1 carries both at the top level; V2 nests them under `accepted`.
///
/// # Errors
///
/// Returns [`ProtocolError::MissingField`] when either is absent.
pub fn get_scheme_and_network(
    version: u32,
    payload: &Value,
) -> Result<(String, String), ProtocolError> {
    let (scheme_val, network_val) = if version == 1 {
        (payload.get("scheme"), payload.get("network"))
    } else {
        let accepted = payload
            .get("accepted")
            .ok_or(ProtocolError::MissingField("accepted"))?;
        (accepted.get("scheme"), accepted.get("network"))
    };

    let scheme = scheme_val
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingField("scheme"))?
        .to_owned();
    let network = network_val
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingField("network"))?
        .to_owned();
    Ok((scheme, network))
}

/// Parses a 402 response into the appropriate version type.
///
/// # Errors
///
/// Returns [`ProtocolError`] on parse failure.
pub fn parse_payment_required(data: &Value) -> Result<PaymentRequiredEnum, ProtocolError> {
    match detect_version(data)? {
        1 => Ok(PaymentRequiredEnum::V1(Box::new(serde_json::from_value(
            data.clone(),
        )?))),
        _ => Ok(PaymentRequiredEnum::V2(Box::new(serde_json::from_value(
            data.clone(),
        )?))),
    }
}

/// Parses a 402 response from raw JSON bytes.
///
/// # Errors
///
/// Returns [`ProtocolError`] on parse failure.
pub fn parse_payment_required_bytes(data: &[u8]) -> Result<PaymentRequiredEnum, ProtocolError> {
    let parsed: Value = serde_json::from_slice(data)?;
    parse_payment_required(&parsed)
}

/// Parses a payment payload, auto-detecting V1 vs V2.
///
/// V2 is recognized by the `accepted` field; a payload with top-level
/// `scheme` + `network` and `x402Version: 1` is V1.
///
/// # Errors
///
/// Returns [`ProtocolError`] on parse failure.
pub fn parse_payment_payload(data: &Value) -> Result<PaymentPayloadEnum, ProtocolError> {
    let version = if data.get("accepted").is_some() {
        2
    } else {
        detect_version(data)?
    };
    match version {
        1 => Ok(PaymentPayloadEnum::V1(Box::new(serde_json::from_value(
            data.clone(),
        )?))),
        _ => Ok(PaymentPayloadEnum::V2(Box::new(serde_json::from_value(
            data.clone(),
        )?))),
    }
}

/// Parses a payment payload from raw JSON bytes.
///
/// # Errors
///
/// Returns [`ProtocolError`] on parse failure.
pub fn parse_payment_payload_bytes(data: &[u8]) -> Result<PaymentPayloadEnum, ProtocolError> {
    let parsed: Value = serde_json::from_slice(data)?;
    parse_payment_payload(&parsed)
}

/// Parses payment requirements for a given protocol version.
///
/// Requirements carry no `x402Version` of their own; the version comes
/// from the payload they accompany.
///
/// # Errors
///
/// Returns [`ProtocolError`] on parse failure or an unsupported version.
pub fn parse_payment_requirements(
    x402_version: u32,
    data: &Value,
) -> Result<PaymentRequirementsEnum, ProtocolError> {
    match x402_version {
        1 => Ok(PaymentRequirementsEnum::V1(Box::new(
            serde_json::from_value(data.clone())?,
        ))),
        2 => Ok(PaymentRequirementsEnum::V2(Box::new(
            serde_json::from_value(data.clone())?,
        ))),
        other => Err(ProtocolError::UnsupportedVersion(u64::from(other))),
    }
}

/// Checks whether a payment payload matches the given requirements.
///
/// V1 compares `scheme` + `network`; V2 compares the five core fields of
/// `accepted` against the requirements.
#[must_use]
pub fn match_payload_to_requirements(version: u32, payload: &Value, requirements: &Value) -> bool {
    if version == 1 {
        payload.get("scheme") == requirements.get("scheme")
            && payload.get("network") == requirements.get("network")
    } else {
        let Some(accepted) = payload.get("accepted") else {
            return false;
        };
        accepted.get("scheme") == requirements.get("scheme")
            && accepted.get("network") == requirements.get("network")
            && accepted.get("amount") == requirements.get("amount")
            && accepted.get("asset") == requirements.get("asset")
            && accepted.get("payTo") == requirements.get("payTo")
    }
}

/// Checks whether a network matches a pattern.
///
/// A pattern is either an exact network identifier or a CAIP family
/// wildcard: a single `*` after the family separator (`"eip155:*"`).
/// No other glob syntax is recognized.
#[must_use]
pub fn matches_network_pattern(network: &str, pattern: &str) -> bool {
    match pattern.strip_suffix(":*") {
        Some(family) => network
            .split_once(':')
            .is_some_and(|(ns, _)| ns == family),
        None => pattern == network,
    }
}

/// Derives a common CAIP family pattern from a list of networks.
///
/// When every network shares one namespace the result is its wildcard
/// (`"eip155:*"`); otherwise the first network is returned verbatim.
///
/// # Panics
///
/// Panics if `networks` is empty.
#[must_use]
pub fn derive_network_pattern(networks: &[&str]) -> String {
    assert!(!networks.is_empty(), "at least one network required");
    let first_family = networks[0].split(':').next().unwrap_or_default();
    let uniform = networks
        .iter()
        .all(|n| n.split(':').next() == Some(first_family));
    if uniform && !first_family.is_empty() {
        format!("{first_family}:*")
    } else {
        networks[0].to_owned()
    }
}

/// A version-tagged `PaymentRequired`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentRequiredEnum {
    /// Legacy V1 format.
    V1(Box<PaymentRequiredV1>),
    /// Current V2 format.
    V2(Box<PaymentRequired>),
}

impl PaymentRequiredEnum {
    /// Returns the protocol version.
    #[must_use]
    pub const fn version(&self) -> u32 {
        match self {
            Self::V1(_) => 1,
            Self::V2(_) => 2,
        }
    }
}

/// A version-tagged `PaymentPayload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentPayloadEnum {
    /// Legacy V1 format.
    V1(Box<PaymentPayloadV1>),
    /// Current V2 format.
    V2(Box<PaymentPayload>),
}

impl PaymentPayloadEnum {
    /// Returns the protocol version.
    #[must_use]
    pub const fn version(&self) -> u32 {
        match self {
            Self::V1(p) => p.x402_version,
            Self::V2(p) => p.x402_version,
        }
    }

    /// Returns the payment scheme.
    #[must_use]
    pub fn scheme(&self) -> &str {
        match self {
            Self::V1(p) => &p.scheme,
            Self::V2(p) => p.scheme(),
        }
    }

    /// Returns the network identifier.
    #[must_use]
    pub fn network(&self) -> &str {
        match self {
            Self::V1(p) => &p.network,
            Self::V2(p) => p.network(),
        }
    }
}

/// A version-tagged `PaymentRequirements`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentRequirementsEnum {
    /// Legacy V1 format.
    V1(Box<PaymentRequirementsV1>),
    /// Current V2 format.
    V2(Box<PaymentRequirements>),
}

impl PaymentRequirementsEnum {
    /// Returns the payment scheme.
    #[must_use]
    pub fn scheme(&self) -> &str {
        match self {
            Self::V1(r) => &r.scheme,
            Self::V2(r) => &r.scheme,
        }
    }

    /// Returns the network identifier.
    #[must_use]
    pub fn network(&self) -> &Network {
        match self {
            Self::V1(r) => &r.network,
            Self::V2(r) => &r.network,
        }
    }

    /// Returns the required amount as a decimal string.
    #[must_use]
    pub fn amount(&self) -> &str {
        match self {
            Self::V1(r) => &r.max_amount_required,
            Self::V2(r) => &r.amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_versions() {
        assert_eq!(detect_version(&json!({"x402Version": 1})).unwrap(), 1);
        assert_eq!(detect_version(&json!({"x402Version": 2})).unwrap(), 2);
        assert!(matches!(
            detect_version(&json!({"x402Version": 7})),
            Err(ProtocolError::UnsupportedVersion(7))
        ));
        assert!(matches!(
            detect_version(&json!({})),
            Err(ProtocolError::MissingPaymentRequired)
        ));
    }

    #[test]
    fn payload_autodetects_v2_by_accepted() {
        let data = json!({
            "x402Version": 2,
            "accepted": {
                "scheme": "exact",
                "network": "eip155:8453",
                "amount": "1000000",
                "payTo": "0x1234567890123456789012345678901234567890",
                "maxTimeoutSeconds": 300,
                "asset": "0x0000000000000000000000000000000000000000"
            },
            "payload": {"signature": "0x123"}
        });
        let parsed = parse_payment_payload(&data).unwrap();
        assert!(matches!(parsed, PaymentPayloadEnum::V2(_)));
        assert_eq!(parsed.scheme(), "exact");
        assert_eq!(parsed.version(), 2);
    }

    #[test]
    fn payload_autodetects_v1_by_top_level_fields() {
        let data = json!({
            "x402Version": 1,
            "scheme": "exact",
            "network": "base-sepolia",
            "payload": {"signature": "0xabc"}
        });
        let parsed = parse_payment_payload(&data).unwrap();
        assert!(matches!(parsed, PaymentPayloadEnum::V1(_)));
        assert_eq!(parsed.network(), "base-sepolia");
    }

    #[test]
    fn scheme_and_network_extraction() {
        let v1 = json!({"scheme": "exact", "network": "base"});
        assert_eq!(
            get_scheme_and_network(1, &v1).unwrap(),
            ("exact".to_owned(), "base".to_owned())
        );

        let v2 = json!({"accepted": {"scheme": "exact", "network": "eip155:1"}});
        assert_eq!(
            get_scheme_and_network(2, &v2).unwrap(),
            ("exact".to_owned(), "eip155:1".to_owned())
        );

        assert!(get_scheme_and_network(2, &json!({})).is_err());
    }

    #[test]
    fn network_pattern_matching() {
        assert!(matches_network_pattern("eip155:8453", "eip155:8453"));
        assert!(matches_network_pattern("eip155:8453", "eip155:*"));
        assert!(matches_network_pattern("eip155:1", "eip155:*"));
        assert!(!matches_network_pattern("solana:mainnet", "eip155:*"));
        assert!(!matches_network_pattern("eip155:8453", "eip155:1"));
        // No prefix-glob semantics beyond the family wildcard.
        assert!(!matches_network_pattern("eip155x:1", "eip155:*"));
    }

    #[test]
    fn derives_family_pattern() {
        assert_eq!(
            derive_network_pattern(&["eip155:1", "eip155:8453"]),
            "eip155:*"
        );
        assert_eq!(
            derive_network_pattern(&["eip155:1", "solana:mainnet"]),
            "eip155:1"
        );
    }

    #[test]
    fn v2_payload_matches_requirements_on_core_fields() {
        let requirements = json!({
            "scheme": "exact",
            "network": "eip155:8453",
            "amount": "100",
            "asset": "0xA",
            "payTo": "0xB",
            "maxTimeoutSeconds": 300
        });
        let payload = json!({"accepted": requirements.clone()});
        assert!(match_payload_to_requirements(2, &payload, &requirements));

        let other = json!({
            "scheme": "exact",
            "network": "eip155:8453",
            "amount": "999",
            "asset": "0xA",
            "payTo": "0xB"
        });
        assert!(!match_payload_to_requirements(2, &payload, &other));
    }
}
