//! Protocol headers and their base64 codecs.
//!
//! Three headers carry protocol data; V2 names take precedence over the
//! legacy V1 aliases. Matching is case-insensitive, emission uses the
//! exact names below. Values are `base64(utf8(json(value)))` with the
//! standard alphabet, padded on emit, unpadded accepted on decode.

use http::HeaderMap;

use h402_proto::helpers::{
    self, PaymentPayloadEnum, PaymentRequiredEnum, parse_payment_payload_bytes,
    parse_payment_required_bytes,
};
use h402_proto::{
    Base64Bytes, PaymentPayload, PaymentPayloadV1, PaymentRequired, PaymentRequiredV1,
    ProtocolError, SettleResponse,
};

/// Payment requirements, server → client on 402 (V2).
pub const PAYMENT_REQUIRED: &str = "PAYMENT-REQUIRED";

/// Signed payment, client → server on retry (V2).
pub const PAYMENT_SIGNATURE: &str = "PAYMENT-SIGNATURE";

/// Settlement result, server → client on 200 (V2).
pub const PAYMENT_RESPONSE: &str = "PAYMENT-RESPONSE";

/// Signed payment, client → server (V1 alias).
pub const X_PAYMENT: &str = "X-PAYMENT";

/// Settlement result, server → client (V1 alias).
pub const X_PAYMENT_RESPONSE: &str = "X-PAYMENT-RESPONSE";

fn encode<T: serde::Serialize>(value: &T) -> Result<String, ProtocolError> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64Bytes::encode(json).to_string())
}

fn decode(header_value: &str) -> Result<Vec<u8>, ProtocolError> {
    Ok(Base64Bytes::from(header_value).decode()?)
}

/// Encodes a V2 `PaymentRequired` for the [`PAYMENT_REQUIRED`] header.
pub fn encode_payment_required(required: &PaymentRequired) -> Result<String, ProtocolError> {
    encode(required)
}

/// Encodes a V1 `PaymentRequired` (used in 402 response bodies).
pub fn encode_payment_required_v1(required: &PaymentRequiredV1) -> Result<String, ProtocolError> {
    encode(required)
}

/// Decodes a [`PAYMENT_REQUIRED`] header value, auto-detecting V1/V2.
pub fn decode_payment_required(header_value: &str) -> Result<PaymentRequiredEnum, ProtocolError> {
    parse_payment_required_bytes(&decode(header_value)?)
}

/// Encodes a V2 payload for the [`PAYMENT_SIGNATURE`] header.
pub fn encode_payment_signature(payload: &PaymentPayload) -> Result<String, ProtocolError> {
    encode(payload)
}

/// Encodes a V1 payload for the [`X_PAYMENT`] header.
pub fn encode_x_payment(payload: &PaymentPayloadV1) -> Result<String, ProtocolError> {
    encode(payload)
}

/// Decodes a [`PAYMENT_SIGNATURE`] / [`X_PAYMENT`] header value,
/// auto-detecting V1/V2.
pub fn decode_payment_payload(header_value: &str) -> Result<PaymentPayloadEnum, ProtocolError> {
    parse_payment_payload_bytes(&decode(header_value)?)
}

/// Encodes a settlement result for the [`PAYMENT_RESPONSE`] header.
pub fn encode_payment_response(response: &SettleResponse) -> Result<String, ProtocolError> {
    encode(response)
}

/// Decodes a [`PAYMENT_RESPONSE`] / [`X_PAYMENT_RESPONSE`] header value.
pub fn decode_payment_response(header_value: &str) -> Result<SettleResponse, ProtocolError> {
    Ok(serde_json::from_slice(&decode(header_value)?)?)
}

/// Extracts the payment header from a request, V2 name first.
#[must_use]
pub fn payment_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(PAYMENT_SIGNATURE)
        .or_else(|| headers.get(X_PAYMENT))
        .and_then(|value| value.to_str().ok())
}

/// Detects the protocol version of a 402 response.
///
/// 1. A `PAYMENT-REQUIRED` header means V2.
/// 2. An `X-PAYMENT` header means V1.
/// 3. Otherwise the body's `x402Version` decides.
pub fn detect_payment_required_version(
    headers: &HeaderMap,
    body: Option<&[u8]>,
) -> Result<u32, ProtocolError> {
    if headers.contains_key(PAYMENT_REQUIRED) {
        return Ok(2);
    }
    if headers.contains_key(X_PAYMENT) {
        return Ok(1);
    }
    match body {
        Some(body) => helpers::detect_version_bytes(body),
        None => Err(ProtocolError::MissingPaymentRequired),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn requirements() -> h402_proto::PaymentRequirements {
        h402_proto::PaymentRequirements {
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
    fn payment_signature_roundtrip() {
        let payload = PaymentPayload {
            x402_version: 2,
            accepted: requirements(),
            payload: json!({"signature": "0x123"}),
            resource: None,
            extensions: None,
        };
        let encoded = encode_payment_signature(&payload).unwrap();
        let decoded = decode_payment_payload(&encoded).unwrap();
        assert_eq!(decoded, PaymentPayloadEnum::V2(Box::new(payload)));
    }

    #[test]
    fn x_payment_roundtrip() {
        let payload = PaymentPayloadV1 {
            x402_version: 1,
            scheme: "exact".into(),
            network: "base-sepolia".into(),
            payload: json!({"signature": "0xabc"}),
        };
        let encoded = encode_x_payment(&payload).unwrap();
        let decoded = decode_payment_payload(&encoded).unwrap();
        assert_eq!(decoded, PaymentPayloadEnum::V1(Box::new(payload)));
    }

    #[test]
    fn payment_required_roundtrip() {
        let required = PaymentRequired {
            x402_version: 2,
            accepts: vec![requirements()],
            error: None,
            resource: None,
            extensions: None,
        };
        let encoded = encode_payment_required(&required).unwrap();
        let decoded = decode_payment_required(&encoded).unwrap();
        assert_eq!(decoded, PaymentRequiredEnum::V2(Box::new(required)));
    }

    #[test]
    fn payment_response_roundtrip() {
        let response = SettleResponse::success("0xabc123", "eip155:8453", "0xPayer");
        let encoded = encode_payment_response(&response).unwrap();
        assert_eq!(decode_payment_response(&encoded).unwrap(), response);

        let failed = SettleResponse::error("insufficient_funds", "broke", "eip155:8453");
        let encoded = encode_payment_response(&failed).unwrap();
        let decoded = decode_payment_response(&encoded).unwrap();
        assert!(!decoded.success);
        assert_eq!(decoded.error_reason.as_deref(), Some("insufficient_funds"));
    }

    #[test]
    fn version_detection_prefers_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(PAYMENT_REQUIRED, "x".parse().unwrap());
        assert_eq!(detect_payment_required_version(&headers, None).unwrap(), 2);

        let mut headers = HeaderMap::new();
        headers.insert(X_PAYMENT, "x".parse().unwrap());
        assert_eq!(detect_payment_required_version(&headers, None).unwrap(), 1);

        // HeaderMap lookups are case-insensitive by construction.
        let mut headers = HeaderMap::new();
        headers.insert("payment-required", "x".parse().unwrap());
        assert_eq!(detect_payment_required_version(&headers, None).unwrap(), 2);
    }

    #[test]
    fn version_detection_falls_back_to_body() {
        let headers = HeaderMap::new();
        let body = serde_json::to_vec(&json!({"x402Version": 1, "accepts": []})).unwrap();
        assert_eq!(
            detect_payment_required_version(&headers, Some(&body)).unwrap(),
            1
        );
        let body = serde_json::to_vec(&json!({"x402Version": 2, "accepts": []})).unwrap();
        assert_eq!(
            detect_payment_required_version(&headers, Some(&body)).unwrap(),
            2
        );

        assert!(detect_payment_required_version(&headers, None).is_err());
        assert!(detect_payment_required_version(&headers, Some(b"not json")).is_err());
    }

    #[test]
    fn decode_accepts_unpadded_values() {
        let payload = PaymentPayloadV1 {
            x402_version: 1,
            scheme: "exact".into(),
            network: "base".into(),
            payload: json!({}),
        };
        let padded = encode_x_payment(&payload).unwrap();
        let unpadded = padded.trim_end_matches('=');
        assert!(decode_payment_payload(unpadded).is_ok());
    }
}
