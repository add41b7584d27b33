//! Traits a payment mechanism implements per role.
//!
//! A *mechanism* is a concrete implementation of a scheme on a network
//! family (e.g., `exact` on `eip155:*`). It contributes up to three
//! pieces: a client side that signs payloads, a server side that turns
//! human prices into requirements, and a facilitator side that verifies
//! and settles.
//!
//! All I/O-bound methods are async-first. Return types use [`BoxFuture`]
//! so the traits stay dyn-compatible for dynamic registration; no sync
//! variants exist at this layer (see [`crate::blocking`] for façades).

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use h402_proto::{
    PaymentPayload, PaymentPayloadV1, PaymentRequirements, PaymentRequirementsV1, SettleResponse,
    SupportedKind, VerifyResponse,
};

/// Boxed, `Send` future — the dyn-compatible async return type used
/// across role and mechanism traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Boxed error type used across scheme trait boundaries.
pub type SchemeError = Box<dyn std::error::Error + Send + Sync>;

/// Client side of a mechanism: produces the scheme-specific inner
/// payload for a chosen offer.
pub trait SchemeClient: Send + Sync {
    /// Payment scheme identifier (e.g., `"exact"`).
    fn scheme(&self) -> &str;

    /// Creates the scheme-specific inner payload for the accepted
    /// requirements. Async because it may reach an RPC node or a
    /// hardware signer.
    fn create_payment_payload<'a>(
        &'a self,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<Value, SchemeError>>;
}

/// Client side of a mechanism for the legacy V1 format.
pub trait SchemeClientV1: Send + Sync {
    /// Payment scheme identifier.
    fn scheme(&self) -> &str;

    /// Creates the scheme-specific inner payload for V1 requirements.
    fn create_payment_payload<'a>(
        &'a self,
        requirements: &'a PaymentRequirementsV1,
    ) -> BoxFuture<'a, Result<Value, SchemeError>>;
}

/// Server side of a mechanism: price parsing and requirement
/// enhancement. Pure computation, so the methods are sync.
pub trait SchemeServer: Send + Sync {
    /// Payment scheme identifier (e.g., `"exact"`).
    fn scheme(&self) -> &str;

    /// Converts a human-friendly price into an atomic asset amount.
    ///
    /// Accepts a money string (`"$1.50"`, `"1.50"`), a JSON number, or a
    /// pre-parsed [`AssetAmount`] object.
    ///
    /// # Errors
    ///
    /// Returns an error when the price format is invalid or the network
    /// is unsupported.
    fn parse_price(&self, price: &Value, network: &str) -> Result<AssetAmount, SchemeError>;

    /// Adds scheme-specific fields to base payment requirements.
    ///
    /// For EVM this contributes the EIP-712 domain (`name`, `version`);
    /// for Solana the facilitator's `feePayer` from the supported kind.
    fn enhance_payment_requirements(
        &self,
        requirements: PaymentRequirements,
        supported_kind: &SupportedKind,
        extensions: &[String],
    ) -> PaymentRequirements;
}

/// Facilitator side of a mechanism: verification and settlement.
///
/// Failures are encoded in the returned responses (`isValid: false` /
/// `success: false` with a stable reason code) rather than errors;
/// an `Err` at the role layer is reserved for dispatch problems.
pub trait SchemeFacilitator: Send + Sync {
    /// Payment scheme identifier (e.g., `"exact"`).
    fn scheme(&self) -> &str;

    /// CAIP family pattern served (e.g., `"eip155:*"`).
    fn caip_family(&self) -> &str;

    /// Scheme-specific data advertised in [`SupportedKind::extra`]
    /// (e.g., the Solana fee payer address).
    fn get_extra(&self, network: &str) -> Option<Value>;

    /// Signer addresses this mechanism controls on the given network.
    fn get_signers(&self, network: &str) -> Vec<String>;

    /// Verifies a payment payload against requirements.
    fn verify<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, VerifyResponse>;

    /// Settles a verified payment on-chain.
    fn settle<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, SettleResponse>;
}

/// Facilitator side of a mechanism for the legacy V1 format.
pub trait SchemeFacilitatorV1: Send + Sync {
    /// Payment scheme identifier.
    fn scheme(&self) -> &str;

    /// CAIP family pattern served.
    fn caip_family(&self) -> &str;

    /// Scheme-specific data advertised in [`SupportedKind::extra`].
    fn get_extra(&self, network: &str) -> Option<Value>;

    /// Signer addresses this mechanism controls on the given network.
    fn get_signers(&self, network: &str) -> Vec<String>;

    /// Verifies a V1 payment payload against V1 requirements.
    fn verify<'a>(
        &'a self,
        payload: &'a PaymentPayloadV1,
        requirements: &'a PaymentRequirementsV1,
    ) -> BoxFuture<'a, VerifyResponse>;

    /// Settles a verified V1 payment on-chain.
    fn settle<'a>(
        &'a self,
        payload: &'a PaymentPayloadV1,
        requirements: &'a PaymentRequirementsV1,
    ) -> BoxFuture<'a, SettleResponse>;
}

/// Amount in an asset's smallest unit, with the asset identifier.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetAmount {
    /// Amount in the smallest unit (e.g., `"1500000"` for 1.5 USDC).
    pub amount: String,

    /// Asset address/identifier.
    pub asset: String,

    /// Optional additional metadata merged into requirements `extra`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}
