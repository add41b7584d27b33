//! Lifecycle hook contexts and results.
//!
//! Each role exposes hook points around its staged operations:
//!
//! - **before** hooks may abort the operation by returning
//!   [`AbortResult`]; later hooks of the same stage do not run.
//! - **after** hooks observe the result; their errors are logged and
//!   swallowed.
//! - **failure** hooks may recover by returning a substitute result.
//!
//! Hooks run in registration order. Contexts carry version-agnostic
//! views so one hook serves both V1 and V2 traffic.

use h402_proto::helpers::{PaymentPayloadEnum, PaymentRequiredEnum, PaymentRequirementsEnum};
use h402_proto::{SettleResponse, VerifyResponse};

/// Returned by a `before` hook to abort the staged operation.
#[derive(Debug, Clone)]
pub struct AbortResult {
    /// Reason for aborting, reported to the caller.
    pub reason: String,
}

impl AbortResult {
    /// Creates an abort result with the given reason.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Returned by a client failure hook to recover with a payload.
#[derive(Debug, Clone)]
pub struct RecoveredPayload {
    /// The substitute payment payload.
    pub payload: PaymentPayloadEnum,
}

/// Returned by a verify failure hook to recover with a result.
#[derive(Debug, Clone)]
pub struct RecoveredVerify {
    /// The substitute verify response.
    pub result: VerifyResponse,
}

/// Returned by a settle failure hook to recover with a result.
#[derive(Debug, Clone)]
pub struct RecoveredSettle {
    /// The substitute settle response.
    pub result: SettleResponse,
}

/// Context for client payment-creation hooks.
#[derive(Debug, Clone)]
pub struct PaymentCreationContext {
    /// The 402 response being answered.
    pub payment_required: PaymentRequiredEnum,
    /// The offer the client selected.
    pub selected: PaymentRequirementsEnum,
}

/// Context passed to after-payment-creation hooks.
#[derive(Debug, Clone)]
pub struct PaymentCreatedContext {
    /// The 402 response being answered.
    pub payment_required: PaymentRequiredEnum,
    /// The offer the client selected.
    pub selected: PaymentRequirementsEnum,
    /// The freshly created payment payload.
    pub payment_payload: PaymentPayloadEnum,
}

/// Context passed to payment-creation-failure hooks.
#[derive(Debug, Clone)]
pub struct PaymentCreationFailureContext {
    /// The 402 response being answered.
    pub payment_required: PaymentRequiredEnum,
    /// The offer the client selected.
    pub selected: PaymentRequirementsEnum,
    /// Description of the failure.
    pub error: String,
}

/// Context for verify hooks (facilitator and resource server).
#[derive(Debug, Clone)]
pub struct VerifyContext {
    /// The payload under verification.
    pub payment_payload: PaymentPayloadEnum,
    /// The requirements it is checked against.
    pub requirements: PaymentRequirementsEnum,
}

/// Context passed to after-verify hooks.
#[derive(Debug, Clone)]
pub struct VerifyResultContext {
    /// The payload that was verified.
    pub payment_payload: PaymentPayloadEnum,
    /// The requirements it was checked against.
    pub requirements: PaymentRequirementsEnum,
    /// The verification result.
    pub result: VerifyResponse,
}

/// Context passed to verify-failure hooks.
#[derive(Debug, Clone)]
pub struct VerifyFailureContext {
    /// The payload that failed verification.
    pub payment_payload: PaymentPayloadEnum,
    /// The requirements it was checked against.
    pub requirements: PaymentRequirementsEnum,
    /// Reason code or error description.
    pub error: String,
}

/// Context for settle hooks (facilitator and resource server).
#[derive(Debug, Clone)]
pub struct SettleContext {
    /// The payload being settled.
    pub payment_payload: PaymentPayloadEnum,
    /// The requirements it is settled against.
    pub requirements: PaymentRequirementsEnum,
}

/// Context passed to after-settle hooks.
#[derive(Debug, Clone)]
pub struct SettleResultContext {
    /// The payload that was settled.
    pub payment_payload: PaymentPayloadEnum,
    /// The requirements it was settled against.
    pub requirements: PaymentRequirementsEnum,
    /// The settlement result.
    pub result: SettleResponse,
}

/// Context passed to settle-failure hooks.
#[derive(Debug, Clone)]
pub struct SettleFailureContext {
    /// The payload that failed settlement.
    pub payment_payload: PaymentPayloadEnum,
    /// The requirements it was settled against.
    pub requirements: PaymentRequirementsEnum,
    /// Reason code or error description.
    pub error: String,
}
