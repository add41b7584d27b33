//! Client-side signing for the EVM `exact` scheme.

use alloy_primitives::{Address, B256, U256, hex};
use alloy_sol_types::{SolStruct, eip712_domain};
use rand::Rng;
use serde_json::Value;

use h402::scheme::{BoxFuture, SchemeClient, SchemeClientV1, SchemeError};
use h402_proto::{PaymentRequirements, PaymentRequirementsV1, UnixTimestamp};

use crate::networks::{caip2_by_alias, parse_eip155};
use crate::signer::EvmSigner;

use super::types::{
    CLOCK_SKEW_SECS, ExactEvmAuthorization, ExactEvmPayload, ExactRequirementsExtra, SCHEME_EXACT,
    TransferWithAuthorization,
};

/// Signs EIP-3009 authorizations for the `exact` scheme.
///
/// Register on an [`X402Client`](h402::X402Client) for `eip155:*` (V2)
/// or the individual network aliases (V1).
#[derive(Debug)]
pub struct ExactEvmClient<S> {
    signer: S,
}

impl<S> ExactEvmClient<S> {
    /// Creates a client around the given signer.
    pub const fn new(signer: S) -> Self {
        Self { signer }
    }
}

impl<S: EvmSigner> ExactEvmClient<S> {
    /// Builds and signs one authorization.
    ///
    /// `validAfter` is backdated by the clock-skew buffer so the payment
    /// is immediately valid even against a slow facilitator clock;
    /// `validBefore` extends `maxTimeoutSeconds` past that point.
    async fn sign_authorization(
        &self,
        chain_id: u64,
        asset: &str,
        pay_to: &str,
        amount: &str,
        max_timeout_seconds: u64,
        extra: Option<&Value>,
    ) -> Result<ExactEvmPayload, SchemeError> {
        let domain_params: ExactRequirementsExtra = extra
            .cloned()
            .and_then(|value| serde_json::from_value(value).ok())
            .ok_or("missing_eip712_domain: requirements extra must carry name and version")?;

        let asset_address: Address = asset
            .parse()
            .map_err(|_| format!("invalid asset address: {asset}"))?;
        let to: Address = pay_to
            .parse()
            .map_err(|_| format!("invalid payTo address: {pay_to}"))?;
        let value = U256::from_str_radix(amount, 10)
            .map_err(|_| format!("invalid amount: {amount}"))?;

        let valid_after = UnixTimestamp::now() - CLOCK_SKEW_SECS;
        let valid_before = valid_after + max_timeout_seconds;
        let nonce: [u8; 32] = rand::rng().random();
        let nonce = B256::from(nonce);

        let from = self.signer.address();
        let message = TransferWithAuthorization {
            from,
            to,
            value,
            validAfter: U256::from(valid_after.as_secs()),
            validBefore: U256::from(valid_before.as_secs()),
            nonce,
        };
        let domain = eip712_domain! {
            name: domain_params.name,
            version: domain_params.version,
            chain_id: chain_id,
            verifying_contract: asset_address,
        };

        let digest = message.eip712_signing_hash(&domain);
        let signature = self.signer.sign_hash(&digest).await?;

        Ok(ExactEvmPayload {
            signature: format!("0x{}", hex::encode(signature.as_bytes())),
            authorization: ExactEvmAuthorization {
                from: from.to_string(),
                to: to.to_string(),
                value: value.to_string(),
                valid_after: valid_after.to_string(),
                valid_before: valid_before.to_string(),
                nonce: format!("0x{}", hex::encode(nonce)),
            },
        })
    }
}

impl<S: EvmSigner + 'static> SchemeClient for ExactEvmClient<S> {
    fn scheme(&self) -> &str {
        SCHEME_EXACT
    }

    fn create_payment_payload<'a>(
        &'a self,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<Value, SchemeError>> {
        Box::pin(async move {
            let chain_id = parse_eip155(&requirements.network)
                .ok_or_else(|| format!("not an eip155 network: {}", requirements.network))?;
            let payload = self
                .sign_authorization(
                    chain_id,
                    &requirements.asset,
                    &requirements.pay_to,
                    &requirements.amount,
                    requirements.max_timeout_seconds,
                    requirements.extra.as_ref(),
                )
                .await?;
            Ok(serde_json::to_value(payload)?)
        })
    }
}

impl<S: EvmSigner + 'static> SchemeClientV1 for ExactEvmClient<S> {
    fn scheme(&self) -> &str {
        SCHEME_EXACT
    }

    fn create_payment_payload<'a>(
        &'a self,
        requirements: &'a PaymentRequirementsV1,
    ) -> BoxFuture<'a, Result<Value, SchemeError>> {
        Box::pin(async move {
            let caip2 = caip2_by_alias(&requirements.network)
                .map(ToOwned::to_owned)
                .unwrap_or_else(|| requirements.network.clone());
            let chain_id = parse_eip155(&caip2)
                .ok_or_else(|| format!("unknown V1 network: {}", requirements.network))?;
            let payload = self
                .sign_authorization(
                    chain_id,
                    &requirements.asset,
                    &requirements.pay_to,
                    &requirements.max_amount_required,
                    requirements.max_timeout_seconds,
                    requirements.extra.as_ref(),
                )
                .await?;
            Ok(serde_json::to_value(payload)?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_signer_local::PrivateKeySigner;
    use serde_json::json;

    fn requirements(amount: &str) -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".into(),
            network: "eip155:84532".into(),
            amount: amount.into(),
            pay_to: "0x0987654321098765432109876543210987654321".into(),
            max_timeout_seconds: 3600,
            asset: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".into(),
            extra: Some(json!({"name": "USDC", "version": "2"})),
        }
    }

    #[tokio::test]
    async fn authorization_carries_offer_fields() {
        let signer = PrivateKeySigner::random();
        let signer_address = EvmSigner::address(&signer).to_string();
        let client = ExactEvmClient::new(signer);
        let requirements = requirements("1000");

        let value = SchemeClient::create_payment_payload(&client, &requirements)
            .await
            .unwrap();
        let payload: ExactEvmPayload = serde_json::from_value(value).unwrap();

        assert_eq!(payload.authorization.value, "1000");
        assert_eq!(payload.authorization.from, signer_address);
        assert!(
            payload
                .authorization
                .to
                .eq_ignore_ascii_case(&requirements.pay_to)
        );
        // 0x + 32 bytes of hex.
        assert_eq!(payload.authorization.nonce.len(), 66);
        assert!(payload.authorization.nonce.starts_with("0x"));
        // 0x + 65 bytes of hex.
        assert_eq!(payload.signature.len(), 132);
    }

    #[tokio::test]
    async fn validity_window_spans_max_timeout() {
        let client = ExactEvmClient::new(PrivateKeySigner::random());
        let requirements = requirements("5");

        let value = SchemeClient::create_payment_payload(&client, &requirements)
            .await
            .unwrap();
        let payload: ExactEvmPayload = serde_json::from_value(value).unwrap();

        let valid_after: u64 = payload.authorization.valid_after.parse().unwrap();
        let valid_before: u64 = payload.authorization.valid_before.parse().unwrap();
        assert_eq!(valid_before - valid_after, requirements.max_timeout_seconds);

        let now = UnixTimestamp::now().as_secs();
        assert!(valid_after <= now);
        assert!(now - valid_after <= CLOCK_SKEW_SECS + 5);
    }

    #[tokio::test]
    async fn missing_domain_fails() {
        let client = ExactEvmClient::new(PrivateKeySigner::random());
        let mut requirements = requirements("1000");
        requirements.extra = None;

        let err = SchemeClient::create_payment_payload(&client, &requirements)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing_eip712_domain"));
    }

    #[tokio::test]
    async fn nonces_are_unique_per_payload() {
        let client = ExactEvmClient::new(PrivateKeySigner::random());
        let requirements = requirements("1");

        let a = SchemeClient::create_payment_payload(&client, &requirements)
            .await
            .unwrap();
        let b = SchemeClient::create_payment_payload(&client, &requirements)
            .await
            .unwrap();
        assert_ne!(a["authorization"]["nonce"], b["authorization"]["nonce"]);
    }

    #[tokio::test]
    async fn v1_alias_resolves_to_chain_id() {
        let client = ExactEvmClient::new(PrivateKeySigner::random());
        let requirements = PaymentRequirementsV1 {
            scheme: "exact".into(),
            network: "base-sepolia".into(),
            max_amount_required: "777".into(),
            resource: "https://example.com/api".into(),
            description: String::new(),
            mime_type: String::new(),
            output_schema: None,
            pay_to: "0x0987654321098765432109876543210987654321".into(),
            max_timeout_seconds: 300,
            asset: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".into(),
            extra: Some(json!({"name": "USDC", "version": "2"})),
        };

        let value = SchemeClientV1::create_payment_payload(&client, &requirements)
            .await
            .unwrap();
        assert_eq!(value["authorization"]["value"], "777");
    }
}
