//! Machine-readable failure reason codes.
//!
//! The protocol emits a closed set of stable snake_case tokens on the
//! wire. Human-readable messages accompany them, but callers branch on
//! the code, never the message.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The closed set of stable reason codes emitted in `invalidReason` /
/// `errorReason` fields.
///
/// Serialized as snake_case strings, e.g.
/// `ErrorReason::NonceUsed` ⇒ `"nonce_used"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ErrorReason {
    // Protocol framing
    /// No payment requirements could be located in the response.
    MissingPaymentRequired,
    /// The payload is malformed (bad base64, bad JSON, missing fields).
    InvalidPayload,
    /// The `x402Version` value is not supported.
    UnsupportedVersion,
    /// The payload's accepted requirements match none of the server's offers.
    RequirementsMismatch,

    // Scheme / network
    /// The scheme is not handled by this party.
    UnsupportedScheme,
    /// The payload's network differs from the requirements' network.
    NetworkMismatch,
    /// No offered payment option is supported by the client.
    NoSupportedPaymentOption,

    // Payment content
    /// The authorized recipient differs from `payTo`.
    RecipientMismatch,
    /// The authorized value is below the required amount.
    AuthorizationValueInsufficient,
    /// The authorization validity window has passed (or not yet opened).
    ExpiredAuthorization,
    /// The signature does not verify against the payer.
    InvalidSignature,
    /// The EIP-3009 nonce was already consumed on-chain.
    NonceUsed,
    /// EIP-712 domain parameters are absent from `extra`.
    MissingEip712Domain,
    /// The payer's on-chain balance cannot cover the authorized value.
    InsufficientFunds,
    /// The Solana payload or transaction is malformed.
    InvalidExactSvmPayload,
    /// `extra.feePayer` is absent from the requirements.
    InvalidExactSvmPayloadMissingFeePayer,
    /// The transaction names a fee payer this facilitator does not manage.
    FeePayerNotManagedByFacilitator,

    // Settlement
    /// Pre-flight simulation reported failure.
    SimulationFailed,
    /// The transaction could not be submitted to the chain.
    SubmissionFailed,
    /// The transaction was mined but reverted.
    Reverted,

    // Hook control
    /// A lifecycle hook aborted the operation.
    Aborted,
}

impl ErrorReason {
    /// Returns the wire token for this reason.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingPaymentRequired => "missing_payment_required",
            Self::InvalidPayload => "invalid_payload",
            Self::UnsupportedVersion => "unsupported_version",
            Self::RequirementsMismatch => "requirements_mismatch",
            Self::UnsupportedScheme => "unsupported_scheme",
            Self::NetworkMismatch => "network_mismatch",
            Self::NoSupportedPaymentOption => "no_supported_payment_option",
            Self::RecipientMismatch => "recipient_mismatch",
            Self::AuthorizationValueInsufficient => "authorization_value_insufficient",
            Self::ExpiredAuthorization => "expired_authorization",
            Self::InvalidSignature => "invalid_signature",
            Self::NonceUsed => "nonce_used",
            Self::MissingEip712Domain => "missing_eip712_domain",
            Self::InsufficientFunds => "insufficient_funds",
            Self::InvalidExactSvmPayload => "invalid_exact_svm_payload",
            Self::InvalidExactSvmPayloadMissingFeePayer => {
                "invalid_exact_svm_payload_missing_fee_payer"
            }
            Self::FeePayerNotManagedByFacilitator => "fee_payer_not_managed_by_facilitator",
            Self::SimulationFailed => "simulation_failed",
            Self::SubmissionFailed => "submission_failed",
            Self::Reverted => "reverted",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ErrorReason> for String {
    fn from(reason: ErrorReason) -> Self {
        reason.as_str().to_owned()
    }
}
