//! Wire format types and codecs for the x402 payment protocol.
//!
//! This crate defines the serialization-level data structures exchanged
//! between buyers, resource servers, and facilitators, covering both the
//! current V2 format and the legacy V1 format. It has minimal dependencies
//! (serde, serde_json, base64) and is the shared vocabulary of the whole
//! h402 stack.
//!
//! # Modules
//!
//! - [`v2`] — Current protocol types (`PaymentRequirements`, `PaymentPayload`, …)
//! - [`v1`] — Legacy protocol types (`PaymentRequirementsV1`, `PaymentPayloadV1`, …)
//! - [`responses`] — Facilitator responses (`VerifyResponse`, `SettleResponse`, …)
//! - [`reason`] — The closed set of machine-readable failure reason codes
//! - [`helpers`] — Version detection, tolerant parsing, network pattern matching
//! - [`encoding`] — Base64 framing and HTML-safe JSON
//! - [`timestamp`] — Unix timestamps carried as decimal strings

pub mod encoding;
pub mod helpers;
pub mod reason;
pub mod responses;
pub mod timestamp;
pub mod v1;
pub mod v2;

pub use encoding::{Base64Bytes, htmlsafe_json};
pub use reason::ErrorReason;
pub use responses::{SettleResponse, SupportedKind, SupportedResponse, VerifyResponse};
pub use timestamp::UnixTimestamp;
pub use v1::{PaymentPayloadV1, PaymentRequiredV1, PaymentRequirementsV1};
pub use v2::{
    PaymentPayload, PaymentRequired, PaymentRequirements, ResourceInfo, SettleRequest,
    VerifyRequest,
};

/// The current protocol version.
pub const X402_VERSION: u32 = 2;

/// A network identifier on the wire.
///
/// V2 uses CAIP-2 form (`"eip155:8453"`, `"solana:<genesis-hash>"`); V1
/// carries human-readable aliases (`"base-sepolia"`).
pub type Network = String;

/// Errors raised while parsing x402 protocol messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// No `x402Version` field could be located in headers or body.
    #[error("missing_payment_required")]
    MissingPaymentRequired,

    /// The `x402Version` field carries a value this implementation does
    /// not speak.
    #[error("unsupported_version: {0}")]
    UnsupportedVersion(u64),

    /// A structurally required field is absent.
    #[error("invalid_payload: missing field `{0}`")]
    MissingField(&'static str),

    /// The payload failed JSON deserialization.
    #[error("invalid_payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload failed base64 decoding.
    #[error("invalid_payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl ProtocolError {
    /// Maps this parse failure onto the stable wire reason code.
    #[must_use]
    pub const fn reason(&self) -> ErrorReason {
        match self {
            Self::MissingPaymentRequired => ErrorReason::MissingPaymentRequired,
            Self::UnsupportedVersion(_) => ErrorReason::UnsupportedVersion,
            Self::MissingField(_) | Self::Json(_) | Self::Base64(_) => ErrorReason::InvalidPayload,
        }
    }
}
