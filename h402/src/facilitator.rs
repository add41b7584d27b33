//! The facilitator role.
//!
//! [`X402Facilitator`] owns the mechanism handlers and dispatches
//! verify/settle calls to them by `(version, scheme, network)`. Six hook
//! points wrap the two operations; a `before` hook abort is reported as
//! a failure *response* (reason `aborted`), never as an error to the
//! caller.

use std::collections::HashMap;
use std::sync::Arc;

use h402_proto::helpers::{PaymentPayloadEnum, PaymentRequirementsEnum};
use h402_proto::reason::ErrorReason;
use h402_proto::{
    PaymentPayload, PaymentPayloadV1, PaymentRequirements, PaymentRequirementsV1, SettleResponse,
    SupportedKind, SupportedResponse, VerifyResponse,
};

use crate::error::PaymentError;
use crate::hooks::{
    AbortResult, RecoveredSettle, RecoveredVerify, SettleContext, SettleFailureContext,
    SettleResultContext, VerifyContext, VerifyFailureContext, VerifyResultContext,
};
use crate::registry::SchemeRegistry;
use crate::scheme::{BoxFuture, SchemeError, SchemeFacilitator, SchemeFacilitatorV1};

/// Hook run before verification; may abort.
pub type BeforeVerifyHook =
    Box<dyn Fn(&VerifyContext) -> BoxFuture<'_, Option<AbortResult>> + Send + Sync>;

/// Hook run after successful verification; errors are logged and
/// swallowed.
pub type AfterVerifyHook =
    Box<dyn Fn(&VerifyResultContext) -> BoxFuture<'_, Result<(), SchemeError>> + Send + Sync>;

/// Hook run when verification fails; may recover with a substitute
/// response.
pub type VerifyFailureHook =
    Box<dyn Fn(&VerifyFailureContext) -> BoxFuture<'_, Option<RecoveredVerify>> + Send + Sync>;

/// Hook run before settlement; may abort.
pub type BeforeSettleHook =
    Box<dyn Fn(&SettleContext) -> BoxFuture<'_, Option<AbortResult>> + Send + Sync>;

/// Hook run after successful settlement; errors are logged and
/// swallowed.
pub type AfterSettleHook =
    Box<dyn Fn(&SettleResultContext) -> BoxFuture<'_, Result<(), SchemeError>> + Send + Sync>;

/// Hook run when settlement fails; may recover with a substitute
/// response.
pub type SettleFailureHook =
    Box<dyn Fn(&SettleFailureContext) -> BoxFuture<'_, Option<RecoveredSettle>> + Send + Sync>;

/// The facilitator role: verifies and settles payments through
/// registered mechanism handlers.
///
/// Registration must complete before the facilitator starts serving;
/// handlers are shared read-only afterwards.
#[derive(Default)]
pub struct X402Facilitator {
    schemes: SchemeRegistry<Arc<dyn SchemeFacilitator>>,
    schemes_v1: SchemeRegistry<Arc<dyn SchemeFacilitatorV1>>,
    extensions: Vec<String>,
    before_verify: Vec<BeforeVerifyHook>,
    after_verify: Vec<AfterVerifyHook>,
    on_verify_failure: Vec<VerifyFailureHook>,
    before_settle: Vec<BeforeSettleHook>,
    after_settle: Vec<AfterSettleHook>,
    on_settle_failure: Vec<SettleFailureHook>,
}

impl std::fmt::Debug for X402Facilitator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X402Facilitator")
            .field("schemes", &self.schemes)
            .field("schemes_v1", &self.schemes_v1)
            .field("extensions", &self.extensions)
            .finish_non_exhaustive()
    }
}

impl X402Facilitator {
    /// Creates a facilitator with no registered mechanisms.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a V2 mechanism handler for one or more networks.
    ///
    /// Each network may be exact (`eip155:8453`) or a family pattern
    /// (`eip155:*`). The handler is shared across all of them.
    ///
    /// # Panics
    ///
    /// Panics when a network pattern is malformed.
    pub fn register<I, S>(&mut self, networks: I, handler: Arc<dyn SchemeFacilitator>) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for network in networks {
            let pattern = network
                .as_ref()
                .parse()
                .expect("invalid network pattern");
            self.schemes
                .register(2, handler.scheme().to_owned(), pattern, Arc::clone(&handler));
        }
        self
    }

    /// Registers a V1 mechanism handler for one or more network aliases.
    ///
    /// # Panics
    ///
    /// Panics when a network pattern is malformed.
    pub fn register_v1<I, S>(
        &mut self,
        networks: I,
        handler: Arc<dyn SchemeFacilitatorV1>,
    ) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for network in networks {
            let pattern = network
                .as_ref()
                .parse()
                .expect("invalid network pattern");
            self.schemes_v1
                .register(1, handler.scheme().to_owned(), pattern, Arc::clone(&handler));
        }
        self
    }

    /// Declares support for a protocol extension (e.g., `"bazaar"`).
    pub fn register_extension(&mut self, key: impl Into<String>) -> &mut Self {
        self.extensions.push(key.into());
        self
    }

    /// Registers a hook run before verification.
    pub fn on_before_verify(&mut self, hook: BeforeVerifyHook) -> &mut Self {
        self.before_verify.push(hook);
        self
    }

    /// Registers a hook run after successful verification.
    pub fn on_after_verify(&mut self, hook: AfterVerifyHook) -> &mut Self {
        self.after_verify.push(hook);
        self
    }

    /// Registers a hook run when verification fails.
    pub fn on_verify_failure(&mut self, hook: VerifyFailureHook) -> &mut Self {
        self.on_verify_failure.push(hook);
        self
    }

    /// Registers a hook run before settlement.
    pub fn on_before_settle(&mut self, hook: BeforeSettleHook) -> &mut Self {
        self.before_settle.push(hook);
        self
    }

    /// Registers a hook run after successful settlement.
    pub fn on_after_settle(&mut self, hook: AfterSettleHook) -> &mut Self {
        self.after_settle.push(hook);
        self
    }

    /// Registers a hook run when settlement fails.
    pub fn on_settle_failure(&mut self, hook: SettleFailureHook) -> &mut Self {
        self.on_settle_failure.push(hook);
        self
    }

    /// Verifies a V2 payment payload against requirements.
    ///
    /// A hook abort surfaces as `isValid: false` with reason `aborted`.
    ///
    /// # Errors
    ///
    /// [`PaymentError::SchemeNotFound`] when no handler serves the
    /// payload's `(scheme, network)`.
    pub async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, PaymentError> {
        let handler = self
            .schemes
            .lookup(2, payload.scheme(), payload.network())
            .ok_or_else(|| PaymentError::scheme_not_found(payload.scheme(), payload.network()))?;

        let ctx = VerifyContext {
            payment_payload: PaymentPayloadEnum::V2(Box::new(payload.clone())),
            requirements: PaymentRequirementsEnum::V2(Box::new(requirements.clone())),
        };
        if let Some(abort) = self.run_before_verify(&ctx).await {
            return Ok(VerifyResponse::invalid(ErrorReason::Aborted, abort.reason));
        }

        let response = handler.verify(payload, requirements).await;
        Ok(self.finish_verify(ctx, response).await)
    }

    /// Settles a V2 payment on-chain.
    ///
    /// A hook abort surfaces as `success: false` with reason `aborted`.
    ///
    /// # Errors
    ///
    /// [`PaymentError::SchemeNotFound`] when no handler serves the
    /// payload's `(scheme, network)`.
    pub async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, PaymentError> {
        let handler = self
            .schemes
            .lookup(2, payload.scheme(), payload.network())
            .ok_or_else(|| PaymentError::scheme_not_found(payload.scheme(), payload.network()))?;

        let ctx = SettleContext {
            payment_payload: PaymentPayloadEnum::V2(Box::new(payload.clone())),
            requirements: PaymentRequirementsEnum::V2(Box::new(requirements.clone())),
        };
        if let Some(abort) = self.run_before_settle(&ctx).await {
            return Ok(SettleResponse::error(
                ErrorReason::Aborted,
                abort.reason,
                &requirements.network,
            ));
        }

        let response = handler.settle(payload, requirements).await;
        Ok(self.finish_settle(ctx, response).await)
    }

    /// Verifies a legacy V1 payment payload.
    ///
    /// # Errors
    ///
    /// [`PaymentError::SchemeNotFound`] when no V1 handler serves the
    /// payload's `(scheme, network)`.
    pub async fn verify_v1(
        &self,
        payload: &PaymentPayloadV1,
        requirements: &PaymentRequirementsV1,
    ) -> Result<VerifyResponse, PaymentError> {
        let handler = self
            .schemes_v1
            .lookup(1, &payload.scheme, &payload.network)
            .ok_or_else(|| PaymentError::scheme_not_found(&payload.scheme, &payload.network))?;

        let ctx = VerifyContext {
            payment_payload: PaymentPayloadEnum::V1(Box::new(payload.clone())),
            requirements: PaymentRequirementsEnum::V1(Box::new(requirements.clone())),
        };
        if let Some(abort) = self.run_before_verify(&ctx).await {
            return Ok(VerifyResponse::invalid(ErrorReason::Aborted, abort.reason));
        }

        let response = handler.verify(payload, requirements).await;
        Ok(self.finish_verify(ctx, response).await)
    }

    /// Settles a legacy V1 payment on-chain.
    ///
    /// # Errors
    ///
    /// [`PaymentError::SchemeNotFound`] when no V1 handler serves the
    /// payload's `(scheme, network)`.
    pub async fn settle_v1(
        &self,
        payload: &PaymentPayloadV1,
        requirements: &PaymentRequirementsV1,
    ) -> Result<SettleResponse, PaymentError> {
        let handler = self
            .schemes_v1
            .lookup(1, &payload.scheme, &payload.network)
            .ok_or_else(|| PaymentError::scheme_not_found(&payload.scheme, &payload.network))?;

        let ctx = SettleContext {
            payment_payload: PaymentPayloadEnum::V1(Box::new(payload.clone())),
            requirements: PaymentRequirementsEnum::V1(Box::new(requirements.clone())),
        };
        if let Some(abort) = self.run_before_settle(&ctx).await {
            return Ok(SettleResponse::error(
                ErrorReason::Aborted,
                abort.reason,
                &requirements.network,
            ));
        }

        let response = handler.settle(payload, requirements).await;
        Ok(self.finish_settle(ctx, response).await)
    }

    /// Enumerates supported payment kinds, signer addresses, and
    /// extensions across all registered handlers.
    #[must_use]
    pub fn get_supported(&self) -> SupportedResponse {
        let mut kinds = Vec::new();
        let mut signers: HashMap<String, Vec<String>> = HashMap::new();

        for (version, scheme, pattern, handler) in self.schemes.iter() {
            let network = pattern.to_string();
            kinds.push(SupportedKind {
                x402_version: version,
                scheme: scheme.to_owned(),
                network: network.clone(),
                extra: handler.get_extra(&network),
            });
            let addresses = handler.get_signers(&network);
            if !addresses.is_empty() {
                let entry = signers.entry(handler.caip_family().to_owned()).or_default();
                for address in addresses {
                    if !entry.contains(&address) {
                        entry.push(address);
                    }
                }
            }
        }
        for (version, scheme, pattern, handler) in self.schemes_v1.iter() {
            let network = pattern.to_string();
            kinds.push(SupportedKind {
                x402_version: version,
                scheme: scheme.to_owned(),
                network: network.clone(),
                extra: handler.get_extra(&network),
            });
            let addresses = handler.get_signers(&network);
            if !addresses.is_empty() {
                let entry = signers.entry(handler.caip_family().to_owned()).or_default();
                for address in addresses {
                    if !entry.contains(&address) {
                        entry.push(address);
                    }
                }
            }
        }

        SupportedResponse {
            kinds,
            extensions: self.extensions.clone(),
            signers,
        }
    }

    async fn run_before_verify(&self, ctx: &VerifyContext) -> Option<AbortResult> {
        for hook in &self.before_verify {
            if let Some(abort) = hook(ctx).await {
                return Some(abort);
            }
        }
        None
    }

    async fn run_before_settle(&self, ctx: &SettleContext) -> Option<AbortResult> {
        for hook in &self.before_settle {
            if let Some(abort) = hook(ctx).await {
                return Some(abort);
            }
        }
        None
    }

    async fn finish_verify(&self, ctx: VerifyContext, response: VerifyResponse) -> VerifyResponse {
        if response.is_valid {
            let result_ctx = VerifyResultContext {
                payment_payload: ctx.payment_payload,
                requirements: ctx.requirements,
                result: response.clone(),
            };
            for hook in &self.after_verify {
                if let Err(err) = hook(&result_ctx).await {
                    tracing::warn!(error = %err, "after_verify hook failed");
                }
            }
            response
        } else {
            let failure_ctx = VerifyFailureContext {
                payment_payload: ctx.payment_payload,
                requirements: ctx.requirements,
                error: response.invalid_reason.clone().unwrap_or_default(),
            };
            for hook in &self.on_verify_failure {
                if let Some(recovered) = hook(&failure_ctx).await {
                    return recovered.result;
                }
            }
            response
        }
    }

    async fn finish_settle(&self, ctx: SettleContext, response: SettleResponse) -> SettleResponse {
        if response.success {
            let result_ctx = SettleResultContext {
                payment_payload: ctx.payment_payload,
                requirements: ctx.requirements,
                result: response.clone(),
            };
            for hook in &self.after_settle {
                if let Err(err) = hook(&result_ctx).await {
                    tracing::warn!(error = %err, "after_settle hook failed");
                }
            }
            response
        } else {
            let failure_ctx = SettleFailureContext {
                payment_payload: ctx.payment_payload,
                requirements: ctx.requirements,
                error: response.error_reason.clone().unwrap_or_default(),
            };
            for hook in &self.on_settle_failure {
                if let Some(recovered) = hook(&failure_ctx).await {
                    return recovered.result;
                }
            }
            response
        }
    }
}
