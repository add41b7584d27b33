//! Framework-neutral payment gate.
//!
//! [`PaymentGate`] implements the server side of the 402 dance against
//! an [`X402ResourceServer`]: challenge when no payment header is
//! present, admit (decode + match + verify) when one is, and settle
//! after the downstream handler succeeded. Settlement takes a
//! [`VerifiedPayment`] token that only [`PaymentGate::admit`] can mint,
//! so a settle without a prior successful verify of the same payload
//! does not typecheck.

use std::sync::Arc;

use serde_json::{Value, json};

use h402::server::X402ResourceServer;
use h402::PaymentError;
use h402_proto::helpers::PaymentPayloadEnum;
use h402_proto::reason::ErrorReason;
use h402_proto::{
    PaymentPayload, PaymentRequirements, PaymentRequirementsV1, ResourceInfo, htmlsafe_json,
};

use crate::headers::{decode_payment_payload, encode_payment_required, encode_payment_response};
use crate::request::RequestContext;

use super::route::RouteConfig;

/// A 402 response: the requirements header plus an HTML-safe JSON body.
#[derive(Debug, Clone)]
pub struct Challenge {
    /// Value for the `PAYMENT-REQUIRED` header.
    pub header_value: String,

    /// HTML-safe JSON body (the same `PaymentRequired` document).
    pub body: String,
}

/// A settle failure after the handler already ran: 402 with error JSON.
#[derive(Debug, Clone)]
pub struct SettleFailure {
    /// HTML-safe JSON error body.
    pub body: String,
}

/// Outcome of admitting a request that carried a payment header.
#[derive(Debug)]
pub enum AdmitOutcome {
    /// The payment verified; run the handler, then settle with the
    /// token.
    Verified(VerifiedPayment),

    /// The payment was rejected; respond 402 with this challenge.
    Rejected(Challenge),
}

/// Proof that a payload passed verification within this request.
///
/// Only [`PaymentGate::admit`] constructs these, and
/// [`PaymentGate::settle`] consumes them, which pins the
/// verify-before-settle ordering into the type system.
#[derive(Debug)]
pub struct VerifiedPayment(Verified);

#[derive(Debug)]
enum Verified {
    V2 {
        payload: Box<PaymentPayload>,
        requirements: Box<PaymentRequirements>,
    },
    V1 {
        payload: Box<h402_proto::PaymentPayloadV1>,
        requirements: Box<PaymentRequirementsV1>,
    },
}

/// Failures that are the server's fault, not the payer's: they produce
/// a sanitized 500, never a payment challenge.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// A deferred price / payTo hook failed or timed out.
    #[error("hook failure: {0}")]
    Hook(String),

    /// Requirements could not be built or encoded.
    #[error("{0}")]
    Internal(String),
}

/// The server side of the 402 dance, bound to a resource server.
#[derive(Debug, Clone)]
pub struct PaymentGate {
    server: Arc<X402ResourceServer>,
}

impl PaymentGate {
    /// Creates a gate over an initialized resource server.
    #[must_use]
    pub fn new(server: Arc<X402ResourceServer>) -> Self {
        Self { server }
    }

    /// Returns the underlying resource server.
    #[must_use]
    pub fn server(&self) -> &Arc<X402ResourceServer> {
        &self.server
    }

    /// Builds the route's offer set for one request, evaluating
    /// deferred price / payTo hooks under the route timeout.
    pub async fn build_accepts(
        &self,
        route: &RouteConfig,
        ctx: &RequestContext,
    ) -> Result<Vec<PaymentRequirements>, GateError> {
        let mut accepts = Vec::with_capacity(route.accepts.len());
        for option in &route.accepts {
            let price = option
                .price
                .resolve(ctx, route.hook_timeout)
                .await
                .map_err(GateError::Hook)?;
            let pay_to = option
                .pay_to
                .resolve(ctx, route.hook_timeout)
                .await
                .map_err(GateError::Hook)?;
            let pay_to = pay_to
                .as_str()
                .map(ToOwned::to_owned)
                .ok_or_else(|| GateError::Hook("payTo hook must return a string".into()))?;

            let config = h402::ResourceConfig {
                scheme: option.scheme.clone(),
                pay_to,
                price,
                network: option.network.clone(),
                max_timeout_seconds: option.max_timeout_seconds,
            };
            let built = self
                .server
                .build_payment_requirements(&config)
                .map_err(|e| GateError::Internal(e.to_string()))?;
            accepts.extend(built);
        }
        Ok(accepts)
    }

    /// Produces the 402 challenge for a request without (or with a
    /// rejected) payment.
    pub async fn challenge(
        &self,
        route: &RouteConfig,
        ctx: &RequestContext,
        error: Option<String>,
    ) -> Result<Challenge, GateError> {
        let accepts = self.build_accepts(route, ctx).await?;
        let extensions = route.extensions.as_ref().map(|declarations| {
            self.server
                .enrich_extensions(declarations, &json!({"method": ctx.method}))
        });
        let resource = ResourceInfo {
            url: ctx.url.clone(),
            description: route.description.clone(),
            mime_type: route.mime_type.clone(),
        };
        let required =
            self.server
                .create_payment_required(accepts, Some(resource), error, extensions);

        let header_value = encode_payment_required(&required)
            .map_err(|e| GateError::Internal(e.to_string()))?;
        let body = htmlsafe_json(&required).map_err(|e| GateError::Internal(e.to_string()))?;
        Ok(Challenge { header_value, body })
    }

    /// Decodes, matches, and verifies an incoming payment header.
    pub async fn admit(
        &self,
        route: &RouteConfig,
        ctx: &RequestContext,
        header_value: &str,
    ) -> Result<AdmitOutcome, GateError> {
        let payload = match decode_payment_payload(header_value) {
            Ok(payload) => payload,
            Err(err) => {
                return self
                    .rejected(route, ctx, err.reason(), &err.to_string())
                    .await;
            }
        };
        let accepts = self.build_accepts(route, ctx).await?;

        match payload {
            PaymentPayloadEnum::V2(payload) => {
                let Some(requirements) = self
                    .server
                    .find_matching_requirements(&accepts, &payload)
                    .cloned()
                else {
                    return self
                        .rejected(
                            route,
                            ctx,
                            ErrorReason::RequirementsMismatch,
                            "payment does not match any offered requirements",
                        )
                        .await;
                };

                match self.server.verify_payment(&payload, &requirements).await {
                    Ok(response) if response.is_valid => {
                        Ok(AdmitOutcome::Verified(VerifiedPayment(Verified::V2 {
                            payload,
                            requirements: Box::new(requirements),
                        })))
                    }
                    Ok(response) => {
                        let reason = response
                            .invalid_reason
                            .unwrap_or_else(|| ErrorReason::InvalidPayload.into());
                        let message = response.invalid_message.unwrap_or_default();
                        let challenge = self
                            .challenge(route, ctx, Some(reason.clone()))
                            .await?;
                        tracing::debug!(reason, message, "payment rejected");
                        Ok(AdmitOutcome::Rejected(challenge))
                    }
                    Err(PaymentError::Aborted { reason }) => {
                        self.rejected(route, ctx, ErrorReason::Aborted, &reason).await
                    }
                    Err(err) => Err(GateError::Internal(err.to_string())),
                }
            }
            PaymentPayloadEnum::V1(payload) => {
                // V1 match: scheme + network against the offer set.
                let Some(requirements) = accepts
                    .iter()
                    .find(|req| req.scheme == payload.scheme && req.network == payload.network)
                else {
                    return self
                        .rejected(
                            route,
                            ctx,
                            ErrorReason::RequirementsMismatch,
                            "payment does not match any offered requirements",
                        )
                        .await;
                };
                let requirements = v1_requirements(requirements, ctx, route);

                match self
                    .server
                    .verify_payment_v1(&payload, &requirements)
                    .await
                {
                    Ok(response) if response.is_valid => {
                        Ok(AdmitOutcome::Verified(VerifiedPayment(Verified::V1 {
                            payload,
                            requirements: Box::new(requirements),
                        })))
                    }
                    Ok(response) => {
                        let reason = response
                            .invalid_reason
                            .unwrap_or_else(|| ErrorReason::InvalidPayload.into());
                        let challenge = self.challenge(route, ctx, Some(reason)).await?;
                        Ok(AdmitOutcome::Rejected(challenge))
                    }
                    Err(PaymentError::Aborted { reason }) => {
                        self.rejected(route, ctx, ErrorReason::Aborted, &reason).await
                    }
                    Err(err) => Err(GateError::Internal(err.to_string())),
                }
            }
        }
    }

    /// Settles a verified payment; returns the `PAYMENT-RESPONSE`
    /// header value on success.
    ///
    /// # Errors
    ///
    /// [`SettleFailure`] carries the 402 error body when settlement
    /// fails after the handler already ran.
    pub async fn settle(&self, verified: VerifiedPayment) -> Result<String, SettleFailure> {
        let result = match &verified.0 {
            Verified::V2 {
                payload,
                requirements,
            } => self.server.settle_payment(payload, requirements).await,
            Verified::V1 {
                payload,
                requirements,
            } => self.server.settle_payment_v1(payload, requirements).await,
        };

        match result {
            Ok(response) if response.success => encode_payment_response(&response)
                .map_err(|e| settle_failure(ErrorReason::SubmissionFailed.as_str(), &e.to_string())),
            Ok(response) => {
                let reason = response
                    .error_reason
                    .unwrap_or_else(|| ErrorReason::SubmissionFailed.into());
                let message = response.error_message.unwrap_or_default();
                Err(settle_failure(&reason, &message))
            }
            Err(err) => Err(settle_failure(
                ErrorReason::SubmissionFailed.as_str(),
                &err.to_string(),
            )),
        }
    }

    async fn rejected(
        &self,
        route: &RouteConfig,
        ctx: &RequestContext,
        reason: ErrorReason,
        message: &str,
    ) -> Result<AdmitOutcome, GateError> {
        tracing::debug!(reason = reason.as_str(), message, "payment rejected");
        let challenge = self
            .challenge(route, ctx, Some(reason.as_str().to_owned()))
            .await?;
        Ok(AdmitOutcome::Rejected(challenge))
    }
}

fn settle_failure(reason: &str, message: &str) -> SettleFailure {
    let body = htmlsafe_json(&json!({
        "x402Version": 2,
        "error": message,
        "invalidReason": reason,
    }))
    .unwrap_or_else(|_| String::from("{\"error\":\"settlement failed\"}"));
    SettleFailure { body }
}

fn v1_requirements(
    requirements: &PaymentRequirements,
    ctx: &RequestContext,
    route: &RouteConfig,
) -> PaymentRequirementsV1 {
    PaymentRequirementsV1 {
        scheme: requirements.scheme.clone(),
        network: requirements.network.clone(),
        max_amount_required: requirements.amount.clone(),
        resource: ctx.url.clone(),
        description: route.description.clone().unwrap_or_default(),
        mime_type: route.mime_type.clone().unwrap_or_default(),
        output_schema: None,
        pay_to: requirements.pay_to.clone(),
        max_timeout_seconds: requirements.max_timeout_seconds,
        asset: requirements.asset.clone(),
        extra: requirements.extra.clone(),
    }
}

/// The sanitized JSON body of a 500 produced by a hook failure.
#[must_use]
pub fn sanitized_server_error_body() -> Value {
    json!({"error": "internal server error"})
}
