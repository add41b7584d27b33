//! The buyer role.
//!
//! [`X402Client`] answers a 402 challenge: it filters the server's offer
//! set down to the schemes it has registered, reorders the survivors
//! through payment policies, lets a selector pick one, and asks the
//! matching mechanism to sign a payload.

use h402_proto::helpers::{PaymentPayloadEnum, PaymentRequiredEnum, PaymentRequirementsEnum};
use h402_proto::{PaymentPayload, PaymentPayloadV1, PaymentRequired, PaymentRequiredV1};

use crate::config::{ClientConfig, SchemeRegistration};
use crate::error::PaymentError;
use crate::hooks::{
    AbortResult, PaymentCreatedContext, PaymentCreationContext, PaymentCreationFailureContext,
    RecoveredPayload,
};
use crate::registry::SchemeRegistry;
use crate::scheme::{BoxFuture, SchemeClient, SchemeClientV1};

/// Filters and reorders the supported offers.
///
/// Receives the protocol version and the current candidate list; returns
/// the list to pass on. Returning an empty list fails the negotiation.
pub type PaymentPolicy =
    Box<dyn Fn(u32, Vec<PaymentRequirementsEnum>) -> Vec<PaymentRequirementsEnum> + Send + Sync>;

/// Picks the index of the final offer from the policy-filtered list.
pub type RequirementsSelector =
    Box<dyn Fn(u32, &[PaymentRequirementsEnum]) -> usize + Send + Sync>;

/// Hook run before payload creation; may abort the negotiation.
pub type BeforePaymentCreationHook =
    Box<dyn Fn(&PaymentCreationContext) -> BoxFuture<'_, Option<AbortResult>> + Send + Sync>;

/// Hook run after successful payload creation; errors are logged and
/// swallowed.
pub type AfterPaymentCreationHook = Box<
    dyn Fn(&PaymentCreatedContext) -> BoxFuture<'_, Result<(), crate::scheme::SchemeError>>
        + Send
        + Sync,
>;

/// Hook run when payload creation fails; may recover with a substitute
/// payload.
pub type PaymentCreationFailureHook = Box<
    dyn Fn(&PaymentCreationFailureContext) -> BoxFuture<'_, Option<RecoveredPayload>> + Send + Sync,
>;

/// Builds a policy that moves offers on the given network to the front.
#[must_use]
pub fn prefer_network(network: impl Into<String>) -> PaymentPolicy {
    let network = network.into();
    Box::new(move |_version, offers| {
        let (preferred, others): (Vec<_>, Vec<_>) = offers
            .into_iter()
            .partition(|offer| offer.network() == &network);
        preferred.into_iter().chain(others).collect()
    })
}

/// Builds a policy that moves offers with the given scheme to the front.
#[must_use]
pub fn prefer_scheme(scheme: impl Into<String>) -> PaymentPolicy {
    let scheme = scheme.into();
    Box::new(move |_version, offers| {
        let (preferred, others): (Vec<_>, Vec<_>) = offers
            .into_iter()
            .partition(|offer| offer.scheme() == scheme);
        preferred.into_iter().chain(others).collect()
    })
}

/// Builds a policy that drops offers whose amount exceeds `max_value`
/// (in the asset's smallest unit).
#[must_use]
pub fn max_amount(max_value: u128) -> PaymentPolicy {
    Box::new(move |_version, offers| {
        offers
            .into_iter()
            .filter(|offer| {
                offer
                    .amount()
                    .parse::<u128>()
                    .is_ok_and(|amount| amount <= max_value)
            })
            .collect()
    })
}

fn default_selector(_version: u32, _offers: &[PaymentRequirementsEnum]) -> usize {
    0
}

/// The buyer role: turns a `PaymentRequired` into a signed
/// `PaymentPayload` using registered scheme clients.
pub struct X402Client {
    schemes: SchemeRegistry<Box<dyn SchemeClient>>,
    schemes_v1: SchemeRegistry<Box<dyn SchemeClientV1>>,
    policies: Vec<PaymentPolicy>,
    selector: RequirementsSelector,
    before_payment_creation: Vec<BeforePaymentCreationHook>,
    after_payment_creation: Vec<AfterPaymentCreationHook>,
    on_payment_creation_failure: Vec<PaymentCreationFailureHook>,
}

impl std::fmt::Debug for X402Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X402Client")
            .field("schemes", &self.schemes)
            .field("schemes_v1", &self.schemes_v1)
            .field("policies", &self.policies.len())
            .finish_non_exhaustive()
    }
}

impl Default for X402Client {
    fn default() -> Self {
        Self::new()
    }
}

impl X402Client {
    /// Creates a client with no registered schemes and the first-offer
    /// selector.
    #[must_use]
    pub fn new() -> Self {
        Self {
            schemes: SchemeRegistry::new(),
            schemes_v1: SchemeRegistry::new(),
            policies: Vec::new(),
            selector: Box::new(default_selector),
            before_payment_creation: Vec::new(),
            after_payment_creation: Vec::new(),
            on_payment_creation_failure: Vec::new(),
        }
    }

    /// Builds a client from an explicit configuration value.
    ///
    /// Equivalent to manual registration in declaration order.
    ///
    /// # Errors
    ///
    /// Returns an error when a registration carries an invalid network
    /// pattern.
    pub fn from_config(config: ClientConfig) -> Result<Self, PaymentError> {
        let mut client = Self::new();
        for registration in config.schemes {
            match registration {
                SchemeRegistration::V2 { network, client: c } => {
                    client.try_register(&network, c)?;
                }
                SchemeRegistration::V1 { network, client: c } => {
                    client.try_register_v1(&network, c)?;
                }
            }
        }
        for policy in config.policies {
            client.register_policy(policy);
        }
        if let Some(selector) = config.selector {
            client.selector = selector;
        }
        Ok(client)
    }

    /// Registers a V2 scheme client for a network or family pattern.
    ///
    /// # Panics
    ///
    /// Panics on an invalid network pattern; use
    /// [`try_register`](Self::try_register) to handle that case.
    pub fn register(&mut self, network: &str, client: Box<dyn SchemeClient>) -> &mut Self {
        self.try_register(network, client)
            .expect("invalid network pattern");
        self
    }

    /// Registers a V2 scheme client, reporting pattern errors.
    ///
    /// # Errors
    ///
    /// Returns an error when the network pattern is malformed.
    pub fn try_register(
        &mut self,
        network: &str,
        client: Box<dyn SchemeClient>,
    ) -> Result<&mut Self, PaymentError> {
        let pattern = network
            .parse()
            .map_err(|e: crate::registry::InvalidNetworkPattern| PaymentError::from(e.to_string()))?;
        let scheme = client.scheme().to_owned();
        self.schemes.register(2, scheme, pattern, client);
        Ok(self)
    }

    /// Registers a V1 scheme client for a network alias.
    ///
    /// # Panics
    ///
    /// Panics on an invalid network pattern.
    pub fn register_v1(&mut self, network: &str, client: Box<dyn SchemeClientV1>) -> &mut Self {
        self.try_register_v1(network, client)
            .expect("invalid network pattern");
        self
    }

    /// Registers a V1 scheme client, reporting pattern errors.
    ///
    /// # Errors
    ///
    /// Returns an error when the network pattern is malformed.
    pub fn try_register_v1(
        &mut self,
        network: &str,
        client: Box<dyn SchemeClientV1>,
    ) -> Result<&mut Self, PaymentError> {
        let pattern = network
            .parse()
            .map_err(|e: crate::registry::InvalidNetworkPattern| PaymentError::from(e.to_string()))?;
        let scheme = client.scheme().to_owned();
        self.schemes_v1.register(1, scheme, pattern, client);
        Ok(self)
    }

    /// Appends a payment policy; policies run in registration order.
    pub fn register_policy(&mut self, policy: PaymentPolicy) -> &mut Self {
        self.policies.push(policy);
        self
    }

    /// Replaces the offer selector.
    pub fn with_selector(&mut self, selector: RequirementsSelector) -> &mut Self {
        self.selector = selector;
        self
    }

    /// Registers a hook run before payload creation.
    pub fn on_before_payment_creation(&mut self, hook: BeforePaymentCreationHook) -> &mut Self {
        self.before_payment_creation.push(hook);
        self
    }

    /// Registers a hook run after successful payload creation.
    pub fn on_after_payment_creation(&mut self, hook: AfterPaymentCreationHook) -> &mut Self {
        self.after_payment_creation.push(hook);
        self
    }

    /// Registers a hook run when payload creation fails.
    pub fn on_payment_creation_failure(&mut self, hook: PaymentCreationFailureHook) -> &mut Self {
        self.on_payment_creation_failure.push(hook);
        self
    }

    /// Returns whether a scheme client is registered for
    /// `(version, scheme, network)`.
    #[must_use]
    pub fn has_registered_scheme(&self, version: u32, scheme: &str, network: &str) -> bool {
        match version {
            1 => self.schemes_v1.contains(1, scheme, network),
            _ => self.schemes.contains(2, scheme, network),
        }
    }

    /// Answers a 402 challenge with a signed payment payload.
    ///
    /// The resulting payload's version always equals the chosen offer's
    /// version, and its accepted requirements are the offer verbatim.
    ///
    /// # Errors
    ///
    /// [`PaymentError::NoSupportedPaymentOption`] when nothing matches,
    /// [`PaymentError::Aborted`] when a before-hook aborts, or the
    /// mechanism error when signing fails unrecovered.
    pub async fn create_payment_payload(
        &self,
        payment_required: &PaymentRequiredEnum,
    ) -> Result<PaymentPayloadEnum, PaymentError> {
        match payment_required {
            PaymentRequiredEnum::V2(required) => self
                .create_payment_payload_v2(required)
                .await
                .map(|p| PaymentPayloadEnum::V2(Box::new(p))),
            PaymentRequiredEnum::V1(required) => self
                .create_payment_payload_v1(required)
                .await
                .map(|p| PaymentPayloadEnum::V1(Box::new(p))),
        }
    }

    /// Answers a V2 challenge.
    ///
    /// # Errors
    ///
    /// See [`create_payment_payload`](Self::create_payment_payload).
    pub async fn create_payment_payload_v2(
        &self,
        payment_required: &PaymentRequired,
    ) -> Result<PaymentPayload, PaymentError> {
        let offers: Vec<PaymentRequirementsEnum> = payment_required
            .accepts
            .iter()
            .filter(|req| self.schemes.contains(2, &req.scheme, &req.network))
            .cloned()
            .map(|req| PaymentRequirementsEnum::V2(Box::new(req)))
            .collect();
        let selected = self.select_offer(2, offers)?;
        let PaymentRequirementsEnum::V2(requirements) = selected.clone() else {
            unreachable!("V2 selection yields V2 requirements")
        };

        let ctx = PaymentCreationContext {
            payment_required: PaymentRequiredEnum::V2(Box::new(payment_required.clone())),
            selected,
        };
        self.run_before_hooks(&ctx).await?;

        let client = self
            .schemes
            .lookup(2, &requirements.scheme, &requirements.network)
            .ok_or_else(|| {
                PaymentError::scheme_not_found(&requirements.scheme, &requirements.network)
            })?;

        match client.create_payment_payload(&requirements).await {
            Ok(inner) => {
                let payload = PaymentPayload {
                    x402_version: 2,
                    accepted: *requirements,
                    payload: inner,
                    resource: payment_required.resource.clone(),
                    extensions: payment_required.extensions.clone(),
                };
                self.run_after_hooks(&ctx, PaymentPayloadEnum::V2(Box::new(payload.clone())))
                    .await;
                Ok(payload)
            }
            Err(err) => match self.run_failure_hooks(&ctx, &err).await {
                Some(PaymentPayloadEnum::V2(recovered)) => Ok(*recovered),
                _ => Err(PaymentError::Scheme(err)),
            },
        }
    }

    /// Answers a legacy V1 challenge.
    ///
    /// # Errors
    ///
    /// See [`create_payment_payload`](Self::create_payment_payload).
    pub async fn create_payment_payload_v1(
        &self,
        payment_required: &PaymentRequiredV1,
    ) -> Result<PaymentPayloadV1, PaymentError> {
        let offers: Vec<PaymentRequirementsEnum> = payment_required
            .accepts
            .iter()
            .filter(|req| self.schemes_v1.contains(1, &req.scheme, &req.network))
            .cloned()
            .map(|req| PaymentRequirementsEnum::V1(Box::new(req)))
            .collect();
        let selected = self.select_offer(1, offers)?;
        let PaymentRequirementsEnum::V1(requirements) = selected.clone() else {
            unreachable!("V1 selection yields V1 requirements")
        };

        let ctx = PaymentCreationContext {
            payment_required: PaymentRequiredEnum::V1(Box::new(payment_required.clone())),
            selected,
        };
        self.run_before_hooks(&ctx).await?;

        let client = self
            .schemes_v1
            .lookup(1, &requirements.scheme, &requirements.network)
            .ok_or_else(|| {
                PaymentError::scheme_not_found(&requirements.scheme, &requirements.network)
            })?;

        match client.create_payment_payload(&requirements).await {
            Ok(inner) => {
                let payload = PaymentPayloadV1 {
                    x402_version: 1,
                    scheme: requirements.scheme.clone(),
                    network: requirements.network.clone(),
                    payload: inner,
                };
                self.run_after_hooks(&ctx, PaymentPayloadEnum::V1(Box::new(payload.clone())))
                    .await;
                Ok(payload)
            }
            Err(err) => match self.run_failure_hooks(&ctx, &err).await {
                Some(PaymentPayloadEnum::V1(recovered)) => Ok(*recovered),
                _ => Err(PaymentError::Scheme(err)),
            },
        }
    }

    fn select_offer(
        &self,
        version: u32,
        offers: Vec<PaymentRequirementsEnum>,
    ) -> Result<PaymentRequirementsEnum, PaymentError> {
        if offers.is_empty() {
            return Err(PaymentError::NoSupportedPaymentOption(
                "no offered payment option matches a registered scheme".into(),
            ));
        }

        let mut filtered = offers;
        for policy in &self.policies {
            filtered = policy(version, filtered);
            if filtered.is_empty() {
                return Err(PaymentError::NoSupportedPaymentOption(
                    "all payment options were filtered out by policies".into(),
                ));
            }
        }

        let index = (self.selector)(version, &filtered);
        filtered.into_iter().nth(index).ok_or_else(|| {
            PaymentError::NoSupportedPaymentOption("selector returned an invalid index".into())
        })
    }

    async fn run_before_hooks(&self, ctx: &PaymentCreationContext) -> Result<(), PaymentError> {
        for hook in &self.before_payment_creation {
            if let Some(abort) = hook(ctx).await {
                return Err(PaymentError::Aborted {
                    reason: abort.reason,
                });
            }
        }
        Ok(())
    }

    async fn run_after_hooks(&self, ctx: &PaymentCreationContext, payload: PaymentPayloadEnum) {
        let created = PaymentCreatedContext {
            payment_required: ctx.payment_required.clone(),
            selected: ctx.selected.clone(),
            payment_payload: payload,
        };
        for hook in &self.after_payment_creation {
            if let Err(err) = hook(&created).await {
                tracing::warn!(error = %err, "after_payment_creation hook failed");
            }
        }
    }

    async fn run_failure_hooks(
        &self,
        ctx: &PaymentCreationContext,
        err: &crate::scheme::SchemeError,
    ) -> Option<PaymentPayloadEnum> {
        let failure = PaymentCreationFailureContext {
            payment_required: ctx.payment_required.clone(),
            selected: ctx.selected.clone(),
            error: err.to_string(),
        };
        for hook in &self.on_payment_creation_failure {
            if let Some(recovered) = hook(&failure).await {
                return Some(recovered.payload);
            }
        }
        None
    }
}
