//! Mock "cash" scheme exercising the full role stack without a chain.
//!
//! The cash scheme signs with `~{payer}` and settles by describing the
//! transfer in prose, which makes end-to-end assertions trivial.

// Each integration test binary uses a different slice of this fixture.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Value, json};

use h402::proto::{
    PaymentPayload, PaymentRequirements, SettleResponse, SupportedKind, SupportedResponse,
    VerifyResponse,
};
use h402::scheme::{
    AssetAmount, BoxFuture, SchemeClient, SchemeError, SchemeFacilitator, SchemeServer,
};
use h402::server::FacilitatorClient;
use h402::X402Facilitator;

/// The cash network identifier.
pub const CASH_NETWORK: &str = "x402:cash";

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_millis()
}

/// Client side of the cash scheme.
pub struct CashSchemeClient {
    payer: String,
}

impl CashSchemeClient {
    /// Creates a cash client signing as `payer`.
    pub fn new(payer: impl Into<String>) -> Self {
        Self {
            payer: payer.into(),
        }
    }
}

impl SchemeClient for CashSchemeClient {
    fn scheme(&self) -> &str {
        "cash"
    }

    fn create_payment_payload<'a>(
        &'a self,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<Value, SchemeError>> {
        Box::pin(async move {
            let valid_until = now_millis() + u128::from(requirements.max_timeout_seconds) * 1000;
            Ok(json!({
                "signature": format!("~{}", self.payer),
                "validUntil": valid_until.to_string(),
                "name": self.payer,
            }))
        })
    }
}

/// Facilitator side of the cash scheme.
#[derive(Debug, Default)]
pub struct CashSchemeFacilitator;

impl CashSchemeFacilitator {
    fn check(payload: &PaymentPayload) -> VerifyResponse {
        let inner = &payload.payload;
        let name = inner.get("name").and_then(Value::as_str).unwrap_or_default();
        let signature = inner
            .get("signature")
            .and_then(Value::as_str)
            .unwrap_or_default();

        if signature != format!("~{name}") {
            return VerifyResponse::invalid("invalid_signature", "signature does not match payer");
        }

        let valid_until: u128 = inner
            .get("validUntil")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        if valid_until < now_millis() {
            return VerifyResponse::invalid("expired_signature", "cash note has expired");
        }

        VerifyResponse::valid(signature)
    }
}

impl SchemeFacilitator for CashSchemeFacilitator {
    fn scheme(&self) -> &str {
        "cash"
    }

    fn caip_family(&self) -> &str {
        "x402:*"
    }

    fn get_extra(&self, _network: &str) -> Option<Value> {
        Some(json!({}))
    }

    fn get_signers(&self, _network: &str) -> Vec<String> {
        Vec::new()
    }

    fn verify<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        _requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, VerifyResponse> {
        Box::pin(async move { Self::check(payload) })
    }

    fn settle<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, SettleResponse> {
        Box::pin(async move {
            let verified = Self::check(payload);
            if !verified.is_valid {
                return SettleResponse::error(
                    verified.invalid_reason.unwrap_or_default(),
                    verified.invalid_message.unwrap_or_default(),
                    &requirements.network,
                );
            }

            let name = payload
                .payload
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("Unknown");
            let transaction = format!(
                "{name} transferred {} {} to {}",
                requirements.amount, requirements.asset, requirements.pay_to
            );
            SettleResponse::success(
                transaction,
                &requirements.network,
                verified.payer.unwrap_or_default(),
            )
        })
    }
}

/// Server side of the cash scheme: parses `$N` / `N USD` prices.
#[derive(Debug, Default)]
pub struct CashSchemeServer;

impl SchemeServer for CashSchemeServer {
    fn scheme(&self) -> &str {
        "cash"
    }

    fn parse_price(&self, price: &Value, _network: &str) -> Result<AssetAmount, SchemeError> {
        if let Some(object) = price.as_object() {
            let amount = object
                .get("amount")
                .and_then(Value::as_str)
                .ok_or("asset amount object requires an amount")?;
            let asset = object
                .get("asset")
                .and_then(Value::as_str)
                .unwrap_or("USD");
            return Ok(AssetAmount {
                amount: amount.to_owned(),
                asset: asset.to_owned(),
                extra: None,
            });
        }

        if let Some(text) = price.as_str() {
            let clean = text
                .trim()
                .trim_start_matches('$')
                .trim_end_matches("USD")
                .trim_end_matches("usd")
                .trim();
            if clean.is_empty() || !clean.chars().all(|c| c.is_ascii_digit() || c == '.') {
                return Err(format!("invalid cash price: {text}").into());
            }
            return Ok(AssetAmount {
                amount: clean.to_owned(),
                asset: "USD".to_owned(),
                extra: None,
            });
        }

        if let Some(number) = price.as_f64() {
            return Ok(AssetAmount {
                amount: if number.fract() == 0.0 {
                    format!("{}", number as i64)
                } else {
                    number.to_string()
                },
                asset: "USD".to_owned(),
                extra: None,
            });
        }

        Err(format!("invalid cash price: {price}").into())
    }

    fn enhance_payment_requirements(
        &self,
        requirements: PaymentRequirements,
        _supported_kind: &SupportedKind,
        _extensions: &[String],
    ) -> PaymentRequirements {
        requirements
    }
}

/// In-process facilitator client wrapping an [`X402Facilitator`].
pub struct CashFacilitatorClient {
    facilitator: Arc<X402Facilitator>,
}

impl CashFacilitatorClient {
    /// Wraps the given facilitator.
    pub fn new(facilitator: Arc<X402Facilitator>) -> Self {
        Self { facilitator }
    }
}

impl FacilitatorClient for CashFacilitatorClient {
    fn verify<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<VerifyResponse, SchemeError>> {
        Box::pin(async move {
            self.facilitator
                .verify(payload, requirements)
                .await
                .map_err(|e| SchemeError::from(e.to_string()))
        })
    }

    fn settle<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<SettleResponse, SchemeError>> {
        Box::pin(async move {
            self.facilitator
                .settle(payload, requirements)
                .await
                .map_err(|e| SchemeError::from(e.to_string()))
        })
    }

    fn get_supported(&self) -> BoxFuture<'_, Result<SupportedResponse, SchemeError>> {
        Box::pin(async move { Ok(self.facilitator.get_supported()) })
    }
}

/// Builds cash-scheme payment requirements directly.
pub fn build_cash_payment_requirements(
    pay_to: &str,
    asset: &str,
    amount: &str,
) -> PaymentRequirements {
    PaymentRequirements {
        scheme: "cash".into(),
        network: CASH_NETWORK.into(),
        amount: amount.into(),
        pay_to: pay_to.into(),
        max_timeout_seconds: 1000,
        asset: asset.into(),
        extra: Some(json!({})),
    }
}
