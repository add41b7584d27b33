//! Facilitator-side verification and settlement for the EVM `exact`
//! scheme.
//!
//! Verification walks the precondition pipeline (scheme, network,
//! domain, recipient, value, window, nonce, balance, signature) and maps
//! every failure onto a stable reason code. Settlement re-verifies, then
//! submits `transferWithAuthorization` from the facilitator wallet,
//! optionally deploying an EIP-6492 counterfactual wallet first.

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{SolStruct, eip712_domain};
use serde_json::Value;

use h402::scheme::{BoxFuture, SchemeFacilitator, SchemeFacilitatorV1};
use h402_proto::reason::ErrorReason;
use h402_proto::{
    PaymentPayload, PaymentPayloadV1, PaymentRequirements, PaymentRequirementsV1, SettleResponse,
    UnixTimestamp, VerifyResponse,
};

use crate::networks::{caip2_by_alias, parse_eip155};
use crate::signer::{EvmFacilitatorSigner, TransferParams};

use super::types::{
    CLOCK_SKEW_SECS, ExactEvmPayload, ExactRequirementsExtra, SCHEME_EXACT,
    TransferWithAuthorization, parse_erc6492, parse_hex, parse_hex_b256,
};

/// Configuration for the EVM `exact` facilitator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactEvmConfig {
    /// Deploy undeployed smart wallets via their EIP-6492 factory call
    /// before settling. When `false`, settlements from counterfactual
    /// wallets are rejected.
    pub deploy_erc4337_with_eip6492: bool,
}

/// Facilitator side of the EVM `exact` scheme.
pub struct ExactEvmFacilitator<S> {
    signer: S,
    config: ExactEvmConfig,
}

impl<S> std::fmt::Debug for ExactEvmFacilitator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExactEvmFacilitator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// A verified authorization in typed form, ready for settlement.
struct TypedAuthorization {
    payer: Address,
    asset: Address,
    params: TransferParams,
    signature: Vec<u8>,
}

impl<S: EvmFacilitatorSigner> ExactEvmFacilitator<S> {
    /// Creates a facilitator with default configuration.
    pub fn new(signer: S) -> Self {
        Self {
            signer,
            config: ExactEvmConfig::default(),
        }
    }

    /// Creates a facilitator with explicit configuration.
    pub const fn with_config(signer: S, config: ExactEvmConfig) -> Self {
        Self { signer, config }
    }

    /// Runs the whole verification pipeline.
    ///
    /// Returns the typed authorization alongside the response so
    /// settlement does not re-parse.
    async fn verify_inner(
        &self,
        accepted: &PaymentRequirements,
        inner: &Value,
        requirements: &PaymentRequirements,
    ) -> Result<TypedAuthorization, VerifyResponse> {
        let payload: ExactEvmPayload = serde_json::from_value(inner.clone()).map_err(|e| {
            VerifyResponse::invalid(ErrorReason::InvalidPayload, format!("bad exact payload: {e}"))
        })?;
        let authorization = &payload.authorization;

        // payer is reported only on success: an invalid response
        // carries the reason code and message alone.
        let invalid =
            |reason: ErrorReason, message: &str| VerifyResponse::invalid(reason, message);

        if accepted.scheme != SCHEME_EXACT {
            return Err(invalid(ErrorReason::UnsupportedScheme, "expected the exact scheme"));
        }
        if accepted.network != requirements.network {
            return Err(invalid(
                ErrorReason::NetworkMismatch,
                "payload network does not match requirements",
            ));
        }
        let Some(chain_id) = parse_eip155(&requirements.network) else {
            return Err(invalid(
                ErrorReason::NetworkMismatch,
                "requirements network is not an eip155 chain",
            ));
        };

        let domain_params: ExactRequirementsExtra = requirements
            .extra
            .clone()
            .and_then(|value| serde_json::from_value(value).ok())
            .ok_or_else(|| {
                invalid(
                    ErrorReason::MissingEip712Domain,
                    "EIP-712 name and version missing from extra",
                )
            })?;

        let payer: Address = authorization
            .from
            .parse()
            .map_err(|_| invalid(ErrorReason::InvalidPayload, "bad payer address"))?;
        let to: Address = authorization
            .to
            .parse()
            .map_err(|_| invalid(ErrorReason::InvalidPayload, "bad recipient address"))?;
        let pay_to: Address = requirements
            .pay_to
            .parse()
            .map_err(|_| invalid(ErrorReason::InvalidPayload, "bad payTo address"))?;
        if to != pay_to {
            return Err(invalid(
                ErrorReason::RecipientMismatch,
                "authorization recipient does not match payTo",
            ));
        }

        let value = U256::from_str_radix(&authorization.value, 10)
            .map_err(|_| invalid(ErrorReason::InvalidPayload, "bad authorization value"))?;
        let required = U256::from_str_radix(&requirements.amount, 10)
            .map_err(|_| invalid(ErrorReason::InvalidPayload, "bad required amount"))?;
        if value < required {
            return Err(invalid(
                ErrorReason::AuthorizationValueInsufficient,
                "authorized value is below the required amount",
            ));
        }

        let valid_after: u64 = authorization
            .valid_after
            .parse()
            .map_err(|_| invalid(ErrorReason::InvalidPayload, "bad validAfter"))?;
        let valid_before: u64 = authorization
            .valid_before
            .parse()
            .map_err(|_| invalid(ErrorReason::InvalidPayload, "bad validBefore"))?;
        // Both window bounds are widened by the grace, never narrowed:
        // expiry only past validBefore + grace, early-arrival only
        // before validAfter - grace.
        let now = UnixTimestamp::now().as_secs();
        if valid_before + CLOCK_SKEW_SECS < now {
            return Err(invalid(
                ErrorReason::ExpiredAuthorization,
                "authorization has expired",
            ));
        }
        if valid_after > now + CLOCK_SKEW_SECS {
            return Err(invalid(
                ErrorReason::ExpiredAuthorization,
                "authorization is not yet valid",
            ));
        }

        let asset: Address = requirements
            .asset
            .parse()
            .map_err(|_| invalid(ErrorReason::InvalidPayload, "bad asset address"))?;
        let nonce: B256 = parse_hex_b256(&authorization.nonce)
            .ok_or_else(|| invalid(ErrorReason::InvalidPayload, "nonce must be 32 bytes"))?;

        // On-chain checks are best-effort: an RPC hiccup here must not
        // reject a payment the settlement simulation would accept.
        if let Ok(true) = self.signer.authorization_state(asset, payer, nonce).await {
            return Err(invalid(
                ErrorReason::NonceUsed,
                "authorization nonce was already consumed",
            ));
        }
        if let Ok(balance) = self.signer.get_balance(payer, asset).await {
            if balance < value {
                return Err(invalid(
                    ErrorReason::InsufficientFunds,
                    "payer balance is below the authorized value",
                ));
            }
        }

        let signature = parse_hex(&payload.signature)
            .map_err(|_| invalid(ErrorReason::InvalidSignature, "signature is not hex"))?;
        if signature.is_empty() {
            return Err(invalid(ErrorReason::InvalidSignature, "empty signature"));
        }

        let message = TransferWithAuthorization {
            from: payer,
            to,
            value,
            validAfter: U256::from(valid_after),
            validBefore: U256::from(valid_before),
            nonce,
        };
        let domain = eip712_domain! {
            name: domain_params.name,
            version: domain_params.version,
            chain_id: chain_id,
            verifying_contract: asset,
        };
        let digest = message.eip712_signing_hash(&domain);

        match self.signer.verify_typed_data(payer, digest, &signature).await {
            Ok(true) => Ok(TypedAuthorization {
                payer,
                asset,
                params: TransferParams {
                    from: payer,
                    to,
                    value,
                    valid_after: U256::from(valid_after),
                    valid_before: U256::from(valid_before),
                    nonce,
                },
                signature,
            }),
            Ok(false) => Err(invalid(
                ErrorReason::InvalidSignature,
                "signature does not verify against the payer",
            )),
            Err(e) => Err(invalid(ErrorReason::InvalidSignature, &e.to_string())),
        }
    }

    /// Settles a verified authorization, deploying an EIP-6492 wallet
    /// first when configured to.
    async fn settle_verified(&self, verified: TypedAuthorization, network: &str) -> SettleResponse {
        let payer = verified.payer.to_string();

        if let Some(wrapper) = parse_erc6492(&verified.signature) {
            let code = self
                .signer
                .get_code(verified.payer)
                .await
                .unwrap_or_default();
            if code.is_empty() {
                if !self.config.deploy_erc4337_with_eip6492 {
                    return SettleResponse::error(
                        "undeployed_smart_wallet",
                        "smart wallet deployment is disabled by configuration",
                        network,
                    );
                }
                match self
                    .signer
                    .send_transaction(wrapper.factory, wrapper.factory_calldata)
                    .await
                {
                    Ok(tx_hash) => match self.signer.wait_for_receipt(&tx_hash).await {
                        Ok(receipt) if receipt.status == 1 => {}
                        Ok(_) => {
                            return SettleResponse::error(
                                ErrorReason::SubmissionFailed,
                                "wallet factory call reverted",
                                network,
                            );
                        }
                        Err(e) => {
                            return SettleResponse::error(
                                ErrorReason::SubmissionFailed,
                                e.to_string(),
                                network,
                            );
                        }
                    },
                    Err(e) => {
                        return SettleResponse::error(
                            ErrorReason::SubmissionFailed,
                            e.to_string(),
                            network,
                        );
                    }
                }
            }
        }

        let tx_hash = match self
            .signer
            .transfer_with_authorization(verified.asset, &verified.params, &verified.signature)
            .await
        {
            Ok(hash) => hash,
            Err(e) => {
                return SettleResponse::error(ErrorReason::SubmissionFailed, e.to_string(), network);
            }
        };

        match self.signer.wait_for_receipt(&tx_hash).await {
            Ok(receipt) if receipt.status == 1 => {
                SettleResponse::success(receipt.tx_hash, network, payer)
            }
            Ok(receipt) => SettleResponse {
                success: false,
                error_reason: Some(ErrorReason::Reverted.into()),
                error_message: Some("transferWithAuthorization reverted on-chain".into()),
                payer: Some(payer),
                transaction: receipt.tx_hash,
                network: network.to_owned(),
            },
            Err(e) => SettleResponse::error(ErrorReason::SubmissionFailed, e.to_string(), network),
        }
    }

    /// Maps V1 requirements into the V2 shape the pipeline operates on.
    fn requirements_from_v1(requirements: &PaymentRequirementsV1) -> PaymentRequirements {
        let network = caip2_by_alias(&requirements.network)
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| requirements.network.clone());
        PaymentRequirements {
            scheme: requirements.scheme.clone(),
            network,
            amount: requirements.max_amount_required.clone(),
            pay_to: requirements.pay_to.clone(),
            max_timeout_seconds: requirements.max_timeout_seconds,
            asset: requirements.asset.clone(),
            extra: requirements.extra.clone(),
        }
    }
}

impl<S: EvmFacilitatorSigner + 'static> SchemeFacilitator for ExactEvmFacilitator<S> {
    fn scheme(&self) -> &str {
        SCHEME_EXACT
    }

    fn caip_family(&self) -> &str {
        "eip155:*"
    }

    fn get_extra(&self, _network: &str) -> Option<Value> {
        None
    }

    fn get_signers(&self, _network: &str) -> Vec<String> {
        self.signer.get_addresses()
    }

    fn verify<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, VerifyResponse> {
        Box::pin(async move {
            match self
                .verify_inner(&payload.accepted, &payload.payload, requirements)
                .await
            {
                Ok(verified) => VerifyResponse::valid(verified.payer.to_string()),
                Err(response) => response,
            }
        })
    }

    fn settle<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, SettleResponse> {
        Box::pin(async move {
            match self
                .verify_inner(&payload.accepted, &payload.payload, requirements)
                .await
            {
                Ok(verified) => self.settle_verified(verified, &requirements.network).await,
                Err(response) => SettleResponse::error(
                    response.invalid_reason.unwrap_or_default(),
                    response.invalid_message.unwrap_or_default(),
                    &requirements.network,
                ),
            }
        })
    }
}

impl<S: EvmFacilitatorSigner + 'static> SchemeFacilitatorV1 for ExactEvmFacilitator<S> {
    fn scheme(&self) -> &str {
        SCHEME_EXACT
    }

    fn caip_family(&self) -> &str {
        "eip155:*"
    }

    fn get_extra(&self, _network: &str) -> Option<Value> {
        None
    }

    fn get_signers(&self, _network: &str) -> Vec<String> {
        self.signer.get_addresses()
    }

    fn verify<'a>(
        &'a self,
        payload: &'a PaymentPayloadV1,
        requirements: &'a PaymentRequirementsV1,
    ) -> BoxFuture<'a, VerifyResponse> {
        Box::pin(async move {
            let mapped = Self::requirements_from_v1(requirements);
            let payload_network = caip2_by_alias(&payload.network)
                .map(ToOwned::to_owned)
                .unwrap_or_else(|| payload.network.clone());
            if payload.scheme != SCHEME_EXACT {
                return VerifyResponse::invalid(
                    ErrorReason::UnsupportedScheme,
                    "expected the exact scheme",
                );
            }
            if payload_network != mapped.network {
                return VerifyResponse::invalid(
                    ErrorReason::NetworkMismatch,
                    "payload network does not match requirements",
                );
            }
            // The V1 payload has no embedded offer; the mapped
            // requirements stand in for `accepted`.
            match self.verify_inner(&mapped, &payload.payload, &mapped).await {
                Ok(verified) => VerifyResponse::valid(verified.payer.to_string()),
                Err(response) => response,
            }
        })
    }

    fn settle<'a>(
        &'a self,
        payload: &'a PaymentPayloadV1,
        requirements: &'a PaymentRequirementsV1,
    ) -> BoxFuture<'a, SettleResponse> {
        Box::pin(async move {
            let mapped = Self::requirements_from_v1(requirements);
            match self.verify_inner(&mapped, &payload.payload, &mapped).await {
                // V1 settlement reports the caller's network alias back.
                Ok(verified) => self.settle_verified(verified, &requirements.network).await,
                Err(response) => SettleResponse::error(
                    response.invalid_reason.unwrap_or_default(),
                    response.invalid_message.unwrap_or_default(),
                    &requirements.network,
                ),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::{SignerError, TransactionReceipt};
    use alloy_primitives::Bytes;
    use serde_json::json;

    const NETWORK: &str = "eip155:8453";
    const USDC: &str = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913";
    const PAY_TO: &str = "0x0987654321098765432109876543210987654321";
    const PAYER: &str = "0x1234567890123456789012345678901234567890";

    /// Signer stub: nonce unused, ample balance, signatures valid,
    /// settlements land in block 1.
    struct StubSigner {
        balance: U256,
        nonce_used: bool,
        signature_valid: bool,
        receipt_status: u64,
    }

    impl Default for StubSigner {
        fn default() -> Self {
            Self {
                balance: U256::from(1_000_000_000u64),
                nonce_used: false,
                signature_valid: true,
                receipt_status: 1,
            }
        }
    }

    impl EvmFacilitatorSigner for StubSigner {
        fn get_addresses(&self) -> Vec<String> {
            vec!["0xFacilitator00000000000000000000000000000001".into()]
        }

        async fn get_chain_id(&self) -> Result<u64, SignerError> {
            Ok(8453)
        }

        async fn get_code(&self, _address: Address) -> Result<Bytes, SignerError> {
            Ok(Bytes::new())
        }

        async fn get_balance(&self, _account: Address, _token: Address) -> Result<U256, SignerError> {
            Ok(self.balance)
        }

        async fn authorization_state(
            &self,
            _token: Address,
            _authorizer: Address,
            _nonce: B256,
        ) -> Result<bool, SignerError> {
            Ok(self.nonce_used)
        }

        async fn verify_typed_data(
            &self,
            _signer: Address,
            _hash: B256,
            _signature: &[u8],
        ) -> Result<bool, SignerError> {
            Ok(self.signature_valid)
        }

        async fn transfer_with_authorization(
            &self,
            _token: Address,
            _params: &TransferParams,
            _signature: &[u8],
        ) -> Result<String, SignerError> {
            Ok(format!("0x{}", "11".repeat(32)))
        }

        async fn send_transaction(&self, _to: Address, _data: Bytes) -> Result<String, SignerError> {
            Ok(format!("0x{}", "22".repeat(32)))
        }

        async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TransactionReceipt, SignerError> {
            Ok(TransactionReceipt {
                status: self.receipt_status,
                block_number: 1,
                tx_hash: tx_hash.to_owned(),
            })
        }
    }

    fn requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".into(),
            network: NETWORK.into(),
            amount: "100000".into(),
            pay_to: PAY_TO.into(),
            max_timeout_seconds: 3600,
            asset: USDC.into(),
            extra: Some(json!({"name": "USD Coin", "version": "2"})),
        }
    }

    fn payload_with(accepted: PaymentRequirements, inner: Value) -> PaymentPayload {
        PaymentPayload {
            x402_version: 2,
            accepted,
            payload: inner,
            resource: None,
            extensions: None,
        }
    }

    fn fresh_inner(value: &str) -> Value {
        let now = UnixTimestamp::now().as_secs();
        json!({
            "signature": format!("0x{}", "ab".repeat(65)),
            "authorization": {
                "from": PAYER,
                "to": PAY_TO,
                "value": value,
                "validAfter": (now - 600).to_string(),
                "validBefore": (now + 3600).to_string(),
                "nonce": format!("0x{}", "00".repeat(32)),
            }
        })
    }

    #[tokio::test]
    async fn rejects_scheme_mismatch() {
        let facilitator = ExactEvmFacilitator::new(StubSigner::default());
        let mut accepted = requirements();
        accepted.scheme = "wrong".into();
        let payload = payload_with(accepted, fresh_inner("100000"));

        let result = SchemeFacilitator::verify(&facilitator, &payload, &requirements()).await;
        assert!(!result.is_valid);
        assert_eq!(result.invalid_reason.as_deref(), Some("unsupported_scheme"));
    }

    #[tokio::test]
    async fn rejects_network_mismatch() {
        let facilitator = ExactEvmFacilitator::new(StubSigner::default());
        let mut accepted = requirements();
        accepted.network = "eip155:1".into();
        let payload = payload_with(accepted, fresh_inner("100000"));

        let result = SchemeFacilitator::verify(&facilitator, &payload, &requirements()).await;
        assert!(!result.is_valid);
        assert_eq!(result.invalid_reason.as_deref(), Some("network_mismatch"));
    }

    #[tokio::test]
    async fn rejects_missing_eip712_domain() {
        let facilitator = ExactEvmFacilitator::new(StubSigner::default());
        let mut requirements = requirements();
        requirements.extra = Some(json!({}));
        let payload = payload_with(requirements.clone(), fresh_inner("100000"));

        let result = SchemeFacilitator::verify(&facilitator, &payload, &requirements).await;
        assert!(!result.is_valid);
        assert_eq!(
            result.invalid_reason.as_deref(),
            Some("missing_eip712_domain")
        );
    }

    #[tokio::test]
    async fn rejects_recipient_mismatch() {
        let facilitator = ExactEvmFacilitator::new(StubSigner::default());
        let mut inner = fresh_inner("100000");
        inner["authorization"]["to"] = json!("0x1111111111111111111111111111111111111111");
        let payload = payload_with(requirements(), inner);

        let result = SchemeFacilitator::verify(&facilitator, &payload, &requirements()).await;
        assert!(!result.is_valid);
        assert_eq!(result.invalid_reason.as_deref(), Some("recipient_mismatch"));
    }

    #[tokio::test]
    async fn rejects_insufficient_authorization_value() {
        let facilitator = ExactEvmFacilitator::new(StubSigner::default());
        let payload = payload_with(requirements(), fresh_inner("50000"));

        let result = SchemeFacilitator::verify(&facilitator, &payload, &requirements()).await;
        assert!(!result.is_valid);
        assert_eq!(
            result.invalid_reason.as_deref(),
            Some("authorization_value_insufficient")
        );
    }

    #[tokio::test]
    async fn value_above_required_is_accepted() {
        let facilitator = ExactEvmFacilitator::new(StubSigner::default());
        let payload = payload_with(requirements(), fresh_inner("150000"));

        let result = SchemeFacilitator::verify(&facilitator, &payload, &requirements()).await;
        assert!(result.is_valid);
        assert!(result.payer.unwrap().eq_ignore_ascii_case(PAYER));
    }

    #[tokio::test]
    async fn rejects_expired_window() {
        let facilitator = ExactEvmFacilitator::new(StubSigner::default());
        let mut inner = fresh_inner("100000");
        inner["authorization"]["validBefore"] = json!("1000003600");
        let payload = payload_with(requirements(), inner);

        let result = SchemeFacilitator::verify(&facilitator, &payload, &requirements()).await;
        assert!(!result.is_valid);
        assert_eq!(
            result.invalid_reason.as_deref(),
            Some("expired_authorization")
        );
    }

    #[tokio::test]
    async fn window_bounds_are_widened_by_the_grace() {
        let facilitator = ExactEvmFacilitator::new(StubSigner::default());
        let now = UnixTimestamp::now().as_secs();

        // validBefore inside the grace is still acceptable...
        let mut inner = fresh_inner("100000");
        inner["authorization"]["validBefore"] = json!((now + 30).to_string());
        let payload = payload_with(requirements(), inner);
        let result = SchemeFacilitator::verify(&facilitator, &payload, &requirements()).await;
        assert!(result.is_valid);

        // ...and so is a validAfter up to the grace in the future.
        let mut inner = fresh_inner("100000");
        inner["authorization"]["validAfter"] = json!((now + 30).to_string());
        let payload = payload_with(requirements(), inner);
        let result = SchemeFacilitator::verify(&facilitator, &payload, &requirements()).await;
        assert!(result.is_valid);
    }

    #[tokio::test]
    async fn rejects_used_nonce() {
        let facilitator = ExactEvmFacilitator::new(StubSigner {
            nonce_used: true,
            ..StubSigner::default()
        });
        let payload = payload_with(requirements(), fresh_inner("100000"));

        let result = SchemeFacilitator::verify(&facilitator, &payload, &requirements()).await;
        assert!(!result.is_valid);
        assert_eq!(result.invalid_reason.as_deref(), Some("nonce_used"));
    }

    #[tokio::test]
    async fn rejects_insufficient_balance() {
        let facilitator = ExactEvmFacilitator::new(StubSigner {
            balance: U256::from(10u64),
            ..StubSigner::default()
        });
        let payload = payload_with(requirements(), fresh_inner("100000"));

        let result = SchemeFacilitator::verify(&facilitator, &payload, &requirements()).await;
        assert!(!result.is_valid);
        assert_eq!(result.invalid_reason.as_deref(), Some("insufficient_funds"));
    }

    #[tokio::test]
    async fn rejects_bad_signature() {
        let facilitator = ExactEvmFacilitator::new(StubSigner {
            signature_valid: false,
            ..StubSigner::default()
        });
        let payload = payload_with(requirements(), fresh_inner("100000"));

        let result = SchemeFacilitator::verify(&facilitator, &payload, &requirements()).await;
        assert!(!result.is_valid);
        assert_eq!(result.invalid_reason.as_deref(), Some("invalid_signature"));
        // payer accompanies valid responses only.
        assert!(result.payer.is_none());
    }

    #[tokio::test]
    async fn settle_fails_when_verification_fails() {
        let facilitator = ExactEvmFacilitator::new(StubSigner::default());
        let mut accepted = requirements();
        accepted.scheme = "wrong".into();
        let payload = payload_with(accepted, fresh_inner("100000"));

        let result = SchemeFacilitator::settle(&facilitator, &payload, &requirements()).await;
        assert!(!result.success);
        assert_eq!(result.error_reason.as_deref(), Some("unsupported_scheme"));
        assert_eq!(result.network, NETWORK);
    }

    #[tokio::test]
    async fn settle_succeeds_with_receipt_status_one() {
        let facilitator = ExactEvmFacilitator::new(StubSigner::default());
        let payload = payload_with(requirements(), fresh_inner("100000"));

        let result = SchemeFacilitator::settle(&facilitator, &payload, &requirements()).await;
        assert!(result.success);
        assert_eq!(result.transaction, format!("0x{}", "11".repeat(32)));
        assert!(result.payer.unwrap().eq_ignore_ascii_case(PAYER));
    }

    #[tokio::test]
    async fn settle_reports_revert_with_transaction_hash() {
        let facilitator = ExactEvmFacilitator::new(StubSigner {
            receipt_status: 0,
            ..StubSigner::default()
        });
        let payload = payload_with(requirements(), fresh_inner("100000"));

        let result = SchemeFacilitator::settle(&facilitator, &payload, &requirements()).await;
        assert!(!result.success);
        assert_eq!(result.error_reason.as_deref(), Some("reverted"));
        assert_eq!(result.transaction, format!("0x{}", "11".repeat(32)));
    }

    #[tokio::test]
    async fn scheme_attributes() {
        let facilitator = ExactEvmFacilitator::new(StubSigner::default());
        assert_eq!(SchemeFacilitator::scheme(&facilitator), "exact");
        assert_eq!(SchemeFacilitator::caip_family(&facilitator), "eip155:*");
        assert!(SchemeFacilitator::get_extra(&facilitator, NETWORK).is_none());
        assert_eq!(
            SchemeFacilitator::get_signers(&facilitator, NETWORK),
            vec!["0xFacilitator00000000000000000000000000000001".to_owned()]
        );
    }
}
