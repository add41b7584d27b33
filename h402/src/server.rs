//! The resource server role.
//!
//! [`X402ResourceServer`] sits between protected routes and one or more
//! facilitators. It builds payment requirements from a
//! [`ResourceConfig`], matches incoming payloads against its offers, and
//! delegates verify/settle to the facilitator that advertised support
//! for the payload's `(scheme, network)` — first advertiser wins.

use h402_proto::helpers::{PaymentPayloadEnum, PaymentRequirementsEnum, matches_network_pattern};
use h402_proto::{
    PaymentPayload, PaymentPayloadV1, PaymentRequired, PaymentRequirements, PaymentRequirementsV1,
    ResourceInfo, SettleResponse, SupportedKind, SupportedResponse, VerifyResponse,
};
use serde_json::Value;

use crate::config::ResourceConfig;
use crate::error::PaymentError;
use crate::facilitator::{
    AfterSettleHook, AfterVerifyHook, BeforeSettleHook, BeforeVerifyHook, SettleFailureHook,
    VerifyFailureHook,
};
use crate::hooks::{
    SettleContext, SettleFailureContext, SettleResultContext, VerifyContext, VerifyFailureContext,
    VerifyResultContext,
};
use crate::registry::SchemeRegistry;
use crate::scheme::{AssetAmount, BoxFuture, SchemeError, SchemeServer};

/// Default payment validity window when a resource config leaves
/// `max_timeout_seconds` unset.
pub const DEFAULT_MAX_TIMEOUT_SECONDS: u64 = 300;

/// Client-side view of a facilitator, as used by resource servers.
///
/// The primary implementation is the HTTP client in `h402-http`; tests
/// wrap an in-process [`X402Facilitator`](crate::X402Facilitator).
pub trait FacilitatorClient: Send + Sync {
    /// Verifies a V2 payment.
    fn verify<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<VerifyResponse, SchemeError>>;

    /// Settles a V2 payment.
    fn settle<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<SettleResponse, SchemeError>>;

    /// Verifies a legacy V1 payment.
    ///
    /// The default implementation reports V1 as unsupported.
    fn verify_v1<'a>(
        &'a self,
        _payload: &'a PaymentPayloadV1,
        _requirements: &'a PaymentRequirementsV1,
    ) -> BoxFuture<'a, Result<VerifyResponse, SchemeError>> {
        Box::pin(async { Err(SchemeError::from("facilitator does not support x402 v1")) })
    }

    /// Settles a legacy V1 payment.
    ///
    /// The default implementation reports V1 as unsupported.
    fn settle_v1<'a>(
        &'a self,
        _payload: &'a PaymentPayloadV1,
        _requirements: &'a PaymentRequirementsV1,
    ) -> BoxFuture<'a, Result<SettleResponse, SchemeError>> {
        Box::pin(async { Err(SchemeError::from("facilitator does not support x402 v1")) })
    }

    /// Returns the payment kinds this facilitator supports.
    ///
    /// Called once during [`X402ResourceServer::initialize`].
    fn get_supported(&self) -> BoxFuture<'_, Result<SupportedResponse, SchemeError>>;
}

/// Enriches extension declarations with transport-specific data.
///
/// The HTTP runner calls registered extensions before building a 402
/// response; the bazaar extension, for example, injects the effective
/// HTTP method into its discovery declaration.
pub trait ResourceServerExtension: Send + Sync {
    /// Unique extension key (e.g., `"bazaar"`).
    fn key(&self) -> &str;

    /// Enriches one declaration. `transport_context` is an opaque JSON
    /// view of the live request (e.g., `{"method": "GET"}`).
    fn enrich_declaration(&self, declaration: Value, transport_context: &Value) -> Value;
}

struct DiscoveredKind {
    kind: SupportedKind,
    client_index: usize,
    extensions: Vec<String>,
}

/// The resource server role.
pub struct X402ResourceServer {
    facilitator_clients: Vec<Box<dyn FacilitatorClient>>,
    schemes: SchemeRegistry<Box<dyn SchemeServer>>,
    discovered: Vec<DiscoveredKind>,
    extensions: Vec<Box<dyn ResourceServerExtension>>,
    before_verify: Vec<BeforeVerifyHook>,
    after_verify: Vec<AfterVerifyHook>,
    on_verify_failure: Vec<VerifyFailureHook>,
    before_settle: Vec<BeforeSettleHook>,
    after_settle: Vec<AfterSettleHook>,
    on_settle_failure: Vec<SettleFailureHook>,
    initialized: bool,
}

impl std::fmt::Debug for X402ResourceServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X402ResourceServer")
            .field("facilitator_clients", &self.facilitator_clients.len())
            .field("schemes", &self.schemes)
            .field("discovered_kinds", &self.discovered.len())
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

impl Default for X402ResourceServer {
    fn default() -> Self {
        Self::new()
    }
}

impl X402ResourceServer {
    /// Creates a resource server with no facilitators.
    #[must_use]
    pub fn new() -> Self {
        Self {
            facilitator_clients: Vec::new(),
            schemes: SchemeRegistry::new(),
            discovered: Vec::new(),
            extensions: Vec::new(),
            before_verify: Vec::new(),
            after_verify: Vec::new(),
            on_verify_failure: Vec::new(),
            before_settle: Vec::new(),
            after_settle: Vec::new(),
            on_settle_failure: Vec::new(),
            initialized: false,
        }
    }

    /// Creates a resource server with one facilitator client.
    #[must_use]
    pub fn with_facilitator(client: Box<dyn FacilitatorClient>) -> Self {
        let mut server = Self::new();
        server.facilitator_clients.push(client);
        server
    }

    /// Adds another facilitator client. Facilitators are consulted in
    /// registration order; the first to advertise a `(scheme, network)`
    /// serves it.
    pub fn add_facilitator(&mut self, client: Box<dyn FacilitatorClient>) -> &mut Self {
        self.facilitator_clients.push(client);
        self
    }

    /// Registers a scheme server for a network or family pattern.
    ///
    /// # Panics
    ///
    /// Panics when the network pattern is malformed.
    pub fn register(&mut self, network: &str, server: Box<dyn SchemeServer>) -> &mut Self {
        let pattern = network.parse().expect("invalid network pattern");
        let scheme = server.scheme().to_owned();
        self.schemes.register(2, scheme, pattern, server);
        self
    }

    /// Registers a transport extension (e.g., the bazaar extension).
    pub fn register_extension(&mut self, extension: Box<dyn ResourceServerExtension>) -> &mut Self {
        self.extensions.push(extension);
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

    /// Fetches supported kinds from every facilitator client and records
    /// the first-wins `(scheme, network) → facilitator` mapping.
    ///
    /// Must complete before requirements are built or payments verified.
    ///
    /// # Errors
    ///
    /// Returns the first facilitator discovery failure.
    pub async fn initialize(&mut self) -> Result<(), PaymentError> {
        for (index, client) in self.facilitator_clients.iter().enumerate() {
            let supported = client.get_supported().await.map_err(PaymentError::Scheme)?;
            for kind in &supported.kinds {
                let already_claimed = self.discovered.iter().any(|d| {
                    d.kind.x402_version == kind.x402_version
                        && d.kind.scheme == kind.scheme
                        && d.kind.network == kind.network
                });
                if !already_claimed {
                    self.discovered.push(DiscoveredKind {
                        kind: kind.clone(),
                        client_index: index,
                        extensions: supported.extensions.clone(),
                    });
                }
            }
        }
        self.initialized = true;
        Ok(())
    }

    /// Returns whether [`initialize`](Self::initialize) has completed.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Returns the supported kind serving `(version, scheme, network)`,
    /// if any facilitator advertised one (exact network first, then a
    /// family wildcard kind).
    #[must_use]
    pub fn get_supported_kind(
        &self,
        version: u32,
        scheme: &str,
        network: &str,
    ) -> Option<&SupportedKind> {
        self.find_discovered(version, scheme, network).map(|d| &d.kind)
    }

    /// Builds the payment requirements for a protected resource.
    ///
    /// Runs the scheme server's `parse_price` and
    /// `enhance_payment_requirements` against the supported kind the
    /// facilitator advertised.
    ///
    /// # Errors
    ///
    /// [`PaymentError::Uninitialized`] before `initialize()`;
    /// [`PaymentError::SchemeNotFound`] when no scheme server or
    /// facilitator covers the config; price-parse failures as
    /// [`PaymentError::Scheme`].
    pub fn build_payment_requirements(
        &self,
        config: &ResourceConfig,
    ) -> Result<Vec<PaymentRequirements>, PaymentError> {
        if !self.initialized {
            return Err(PaymentError::Uninitialized);
        }

        let server = self
            .schemes
            .lookup(2, &config.scheme, &config.network)
            .ok_or_else(|| PaymentError::scheme_not_found(&config.scheme, &config.network))?;

        let discovered = self
            .find_discovered(2, &config.scheme, &config.network)
            .ok_or_else(|| PaymentError::scheme_not_found(&config.scheme, &config.network))?;

        let AssetAmount {
            amount,
            asset,
            extra,
        } = server
            .parse_price(&config.price, &config.network)
            .map_err(PaymentError::Scheme)?;

        let base = PaymentRequirements {
            scheme: config.scheme.clone(),
            network: config.network.clone(),
            amount,
            pay_to: config.pay_to.clone(),
            max_timeout_seconds: config
                .max_timeout_seconds
                .unwrap_or(DEFAULT_MAX_TIMEOUT_SECONDS),
            asset,
            extra,
        };

        let enhanced =
            server.enhance_payment_requirements(base, &discovered.kind, &discovered.extensions);
        Ok(vec![enhanced])
    }

    /// Assembles a 402 Payment Required value from built requirements.
    #[must_use]
    pub const fn create_payment_required(
        &self,
        accepts: Vec<PaymentRequirements>,
        resource: Option<ResourceInfo>,
        error: Option<String>,
        extensions: Option<Value>,
    ) -> PaymentRequired {
        PaymentRequired {
            x402_version: 2,
            accepts,
            error,
            resource,
            extensions,
        }
    }

    /// Finds the offered requirements a V2 payload accepted.
    ///
    /// Compares the five protocol-critical fields; `None` means the
    /// request must be rejected with `requirements_mismatch`.
    #[must_use]
    pub fn find_matching_requirements<'a>(
        &self,
        available: &'a [PaymentRequirements],
        payload: &PaymentPayload,
    ) -> Option<&'a PaymentRequirements> {
        available
            .iter()
            .find(|req| payload.accepted.core_fields_match(req))
    }

    /// Finds the offered requirements matching a V1 payload by
    /// `(scheme, network)`.
    #[must_use]
    pub fn find_matching_requirements_v1<'a>(
        &self,
        available: &'a [PaymentRequirementsV1],
        payload: &PaymentPayloadV1,
    ) -> Option<&'a PaymentRequirementsV1> {
        available
            .iter()
            .find(|req| req.scheme == payload.scheme && req.network == payload.network)
    }

    /// Runs extension enrichment over a declarations object.
    ///
    /// Keys with a registered extension are replaced by the extension's
    /// enriched declaration; other keys pass through.
    #[must_use]
    pub fn enrich_extensions(&self, declarations: &Value, transport_context: &Value) -> Value {
        let Some(object) = declarations.as_object() else {
            return declarations.clone();
        };
        let mut result = object.clone();
        for (key, declaration) in object {
            if let Some(extension) = self.extensions.iter().find(|e| e.key() == key) {
                result.insert(
                    key.clone(),
                    extension.enrich_declaration(declaration.clone(), transport_context),
                );
            }
        }
        Value::Object(result)
    }

    /// Verifies a V2 payment through the owning facilitator, running
    /// the server's own hook lifecycle.
    ///
    /// # Errors
    ///
    /// [`PaymentError::Uninitialized`] before `initialize()`;
    /// [`PaymentError::SchemeNotFound`] when no facilitator claimed the
    /// payload's kind; [`PaymentError::Aborted`] on hook abort.
    pub async fn verify_payment(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, PaymentError> {
        if !self.initialized {
            return Err(PaymentError::Uninitialized);
        }
        let ctx = VerifyContext {
            payment_payload: PaymentPayloadEnum::V2(Box::new(payload.clone())),
            requirements: PaymentRequirementsEnum::V2(Box::new(requirements.clone())),
        };
        for hook in &self.before_verify {
            if let Some(abort) = hook(&ctx).await {
                return Err(PaymentError::Aborted {
                    reason: abort.reason,
                });
            }
        }

        let client = self.facilitator_for(2, payload.scheme(), payload.network())?;
        let result = client
            .verify(payload, requirements)
            .await
            .map_err(PaymentError::Scheme);
        self.finish_verify(ctx, result).await
    }

    /// Settles a V2 payment through the owning facilitator, running the
    /// server's own hook lifecycle.
    ///
    /// Within one request settlement must follow a successful
    /// verification of the same payload; the HTTP runner enforces that
    /// ordering with a typed token.
    ///
    /// # Errors
    ///
    /// As [`verify_payment`](Self::verify_payment).
    pub async fn settle_payment(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, PaymentError> {
        if !self.initialized {
            return Err(PaymentError::Uninitialized);
        }
        let ctx = SettleContext {
            payment_payload: PaymentPayloadEnum::V2(Box::new(payload.clone())),
            requirements: PaymentRequirementsEnum::V2(Box::new(requirements.clone())),
        };
        for hook in &self.before_settle {
            if let Some(abort) = hook(&ctx).await {
                return Err(PaymentError::Aborted {
                    reason: abort.reason,
                });
            }
        }

        let client = self.facilitator_for(2, payload.scheme(), payload.network())?;
        let result = client
            .settle(payload, requirements)
            .await
            .map_err(PaymentError::Scheme);
        self.finish_settle(ctx, result).await
    }

    /// Verifies a legacy V1 payment through the owning facilitator.
    ///
    /// # Errors
    ///
    /// As [`verify_payment`](Self::verify_payment).
    pub async fn verify_payment_v1(
        &self,
        payload: &PaymentPayloadV1,
        requirements: &PaymentRequirementsV1,
    ) -> Result<VerifyResponse, PaymentError> {
        if !self.initialized {
            return Err(PaymentError::Uninitialized);
        }
        let ctx = VerifyContext {
            payment_payload: PaymentPayloadEnum::V1(Box::new(payload.clone())),
            requirements: PaymentRequirementsEnum::V1(Box::new(requirements.clone())),
        };
        for hook in &self.before_verify {
            if let Some(abort) = hook(&ctx).await {
                return Err(PaymentError::Aborted {
                    reason: abort.reason,
                });
            }
        }

        let client = self.facilitator_for(1, &payload.scheme, &payload.network)?;
        let result = client
            .verify_v1(payload, requirements)
            .await
            .map_err(PaymentError::Scheme);
        self.finish_verify(ctx, result).await
    }

    /// Settles a legacy V1 payment through the owning facilitator.
    ///
    /// # Errors
    ///
    /// As [`verify_payment`](Self::verify_payment).
    pub async fn settle_payment_v1(
        &self,
        payload: &PaymentPayloadV1,
        requirements: &PaymentRequirementsV1,
    ) -> Result<SettleResponse, PaymentError> {
        if !self.initialized {
            return Err(PaymentError::Uninitialized);
        }
        let ctx = SettleContext {
            payment_payload: PaymentPayloadEnum::V1(Box::new(payload.clone())),
            requirements: PaymentRequirementsEnum::V1(Box::new(requirements.clone())),
        };
        for hook in &self.before_settle {
            if let Some(abort) = hook(&ctx).await {
                return Err(PaymentError::Aborted {
                    reason: abort.reason,
                });
            }
        }

        let client = self.facilitator_for(1, &payload.scheme, &payload.network)?;
        let result = client
            .settle_v1(payload, requirements)
            .await
            .map_err(PaymentError::Scheme);
        self.finish_settle(ctx, result).await
    }

    fn find_discovered(
        &self,
        version: u32,
        scheme: &str,
        network: &str,
    ) -> Option<&DiscoveredKind> {
        let candidates = || {
            self.discovered
                .iter()
                .filter(move |d| d.kind.x402_version == version && d.kind.scheme == scheme)
        };
        candidates()
            .find(|d| d.kind.network == network)
            .or_else(|| {
                candidates().find(|d| {
                    d.kind.network.ends_with(":*")
                        && matches_network_pattern(network, &d.kind.network)
                })
            })
    }

    fn facilitator_for(
        &self,
        version: u32,
        scheme: &str,
        network: &str,
    ) -> Result<&dyn FacilitatorClient, PaymentError> {
        let discovered = self
            .find_discovered(version, scheme, network)
            .ok_or_else(|| PaymentError::scheme_not_found(scheme, network))?;
        self.facilitator_clients
            .get(discovered.client_index)
            .map(AsRef::as_ref)
            .ok_or_else(|| PaymentError::scheme_not_found(scheme, network))
    }

    async fn finish_verify(
        &self,
        ctx: VerifyContext,
        result: Result<VerifyResponse, PaymentError>,
    ) -> Result<VerifyResponse, PaymentError> {
        match result {
            Ok(response) if response.is_valid => {
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
                Ok(response)
            }
            Ok(response) => {
                let failure_ctx = VerifyFailureContext {
                    payment_payload: ctx.payment_payload,
                    requirements: ctx.requirements,
                    error: response.invalid_reason.clone().unwrap_or_default(),
                };
                for hook in &self.on_verify_failure {
                    if let Some(recovered) = hook(&failure_ctx).await {
                        return Ok(recovered.result);
                    }
                }
                Ok(response)
            }
            Err(err) => {
                let failure_ctx = VerifyFailureContext {
                    payment_payload: ctx.payment_payload,
                    requirements: ctx.requirements,
                    error: err.to_string(),
                };
                for hook in &self.on_verify_failure {
                    if let Some(recovered) = hook(&failure_ctx).await {
                        return Ok(recovered.result);
                    }
                }
                Err(err)
            }
        }
    }

    async fn finish_settle(
        &self,
        ctx: SettleContext,
        result: Result<SettleResponse, PaymentError>,
    ) -> Result<SettleResponse, PaymentError> {
        match result {
            Ok(response) if response.success => {
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
                Ok(response)
            }
            Ok(response) => {
                let failure_ctx = SettleFailureContext {
                    payment_payload: ctx.payment_payload,
                    requirements: ctx.requirements,
                    error: response.error_reason.clone().unwrap_or_default(),
                };
                for hook in &self.on_settle_failure {
                    if let Some(recovered) = hook(&failure_ctx).await {
                        return Ok(recovered.result);
                    }
                }
                Ok(response)
            }
            Err(err) => {
                let failure_ctx = SettleFailureContext {
                    payment_payload: ctx.payment_payload,
                    requirements: ctx.requirements,
                    error: err.to_string(),
                };
                for hook in &self.on_settle_failure {
                    if let Some(recovered) = hook(&failure_ctx).await {
                        return Ok(recovered.result);
                    }
                }
                Err(err)
            }
        }
    }
}
