//! Facilitator-side verification and settlement for the Solana `exact`
//! scheme.
//!
//! Verification enforces the fee-payer policy (the named fee payer must
//! be facilitator-managed and must not be the transfer authority),
//! decodes the wire transaction, checks the single `TransferChecked`
//! against the requirements, and simulates. Settlement re-verifies,
//! attaches the fee-payer signature, sends, and confirms.

use serde_json::Value;
use solana_pubkey::Pubkey;

use h402::scheme::{BoxFuture, SchemeFacilitator, SchemeFacilitatorV1};
use h402_proto::reason::ErrorReason;
use h402_proto::{
    PaymentPayload, PaymentPayloadV1, PaymentRequirements, PaymentRequirementsV1, SettleResponse,
    VerifyResponse,
};

use crate::networks::{caip2_by_alias, cluster_config, is_solana_network};
use crate::signer::{SvmFacilitatorSigner, decode_transaction};

use super::types::{ExactSvmExtra, ExactSvmPayload, SCHEME_EXACT, derive_ata,
    extract_single_transfer_checked};

/// Facilitator side of the Solana `exact` scheme.
pub struct ExactSvmFacilitator<S> {
    signer: S,
}

impl<S> std::fmt::Debug for ExactSvmFacilitator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExactSvmFacilitator").finish_non_exhaustive()
    }
}

/// A verified transfer, ready for settlement.
struct VerifiedTransfer {
    payer: String,
    fee_payer: String,
    transaction_b64: String,
}

impl<S: SvmFacilitatorSigner> ExactSvmFacilitator<S> {
    /// Creates a facilitator around the fee-payer signer.
    pub const fn new(signer: S) -> Self {
        Self { signer }
    }

    async fn verify_inner(
        &self,
        accepted: &PaymentRequirements,
        inner: &Value,
        requirements: &PaymentRequirements,
    ) -> Result<VerifiedTransfer, VerifyResponse> {
        if accepted.scheme != SCHEME_EXACT {
            return Err(VerifyResponse::invalid(
                ErrorReason::UnsupportedScheme,
                "expected the exact scheme",
            ));
        }
        if accepted.network != requirements.network {
            return Err(VerifyResponse::invalid(
                ErrorReason::NetworkMismatch,
                "payload network does not match requirements",
            ));
        }
        if !is_solana_network(&requirements.network) {
            return Err(VerifyResponse::invalid(
                ErrorReason::NetworkMismatch,
                "requirements network is not a Solana cluster",
            ));
        }

        let fee_payer = requirements
            .extra
            .clone()
            .and_then(|value| serde_json::from_value::<ExactSvmExtra>(value).ok())
            .map(|extra| extra.fee_payer)
            .ok_or_else(|| {
                VerifyResponse::invalid(
                    ErrorReason::InvalidExactSvmPayloadMissingFeePayer,
                    "requirements extra must carry feePayer",
                )
            })?;
        let managed = self.signer.get_addresses();
        if !managed.contains(&fee_payer) {
            return Err(VerifyResponse::invalid(
                ErrorReason::FeePayerNotManagedByFacilitator,
                "named fee payer is not managed by this facilitator",
            ));
        }

        let payload: ExactSvmPayload = serde_json::from_value(inner.clone()).map_err(|e| {
            VerifyResponse::invalid(
                ErrorReason::InvalidExactSvmPayload,
                format!("bad exact payload: {e}"),
            )
        })?;
        let transaction = decode_transaction(&payload.transaction).map_err(|e| {
            VerifyResponse::invalid(ErrorReason::InvalidExactSvmPayload, e.to_string())
        })?;

        let transfer = extract_single_transfer_checked(&transaction).map_err(|e| {
            VerifyResponse::invalid(ErrorReason::InvalidExactSvmPayload, e)
        })?;
        let payer = transfer.authority.to_string();
        // payer is reported only on success: an invalid response
        // carries the reason code and message alone.
        let invalid =
            |reason: ErrorReason, message: &str| VerifyResponse::invalid(reason, message);

        // The message fee payer is the first static account key.
        let message_fee_payer = transaction
            .message
            .static_account_keys()
            .first()
            .map(Pubkey::to_string)
            .ok_or_else(|| invalid(ErrorReason::InvalidExactSvmPayload, "empty account keys"))?;
        if !managed.contains(&message_fee_payer) {
            return Err(invalid(
                ErrorReason::FeePayerNotManagedByFacilitator,
                "transaction fee payer is not managed by this facilitator",
            ));
        }
        if payer == message_fee_payer {
            return Err(invalid(
                ErrorReason::InvalidExactSvmPayload,
                "fee payer must not be the transfer authority",
            ));
        }

        let mint: Pubkey = requirements.asset.parse().map_err(|_| {
            invalid(ErrorReason::InvalidExactSvmPayload, "bad asset mint address")
        })?;
        if transfer.mint != mint {
            return Err(invalid(
                ErrorReason::InvalidExactSvmPayload,
                "transfer mint does not match the required asset",
            ));
        }
        if let Some(cluster) = cluster_config(&requirements.network) {
            if cluster.default_asset.address == requirements.asset
                && transfer.decimals != cluster.default_asset.decimals
            {
                return Err(invalid(
                    ErrorReason::InvalidExactSvmPayload,
                    "transfer decimals do not match the mint",
                ));
            }
        }

        let pay_to: Pubkey = requirements.pay_to.parse().map_err(|_| {
            invalid(ErrorReason::InvalidExactSvmPayload, "bad payTo address")
        })?;
        let expected_destination = derive_ata(&pay_to, &transfer.token_program, &mint);
        if transfer.destination != expected_destination {
            return Err(invalid(
                ErrorReason::RecipientMismatch,
                "destination is not the recipient's token account",
            ));
        }

        let required: u64 = requirements.amount.parse().map_err(|_| {
            invalid(ErrorReason::InvalidExactSvmPayload, "bad required amount")
        })?;
        if transfer.amount < required {
            return Err(invalid(
                ErrorReason::AuthorizationValueInsufficient,
                "transfer amount is below the required amount",
            ));
        }

        if let Err(e) = self
            .signer
            .simulate_transaction(&payload.transaction, &requirements.network)
            .await
        {
            return Err(invalid(ErrorReason::SimulationFailed, &e.to_string()));
        }

        Ok(VerifiedTransfer {
            payer,
            fee_payer,
            transaction_b64: payload.transaction,
        })
    }

    async fn settle_verified(&self, verified: VerifiedTransfer, network: &str) -> SettleResponse {
        let signed = match self
            .signer
            .sign_transaction(&verified.transaction_b64, &verified.fee_payer, network)
            .await
        {
            Ok(signed) => signed,
            Err(e) => {
                return SettleResponse::error(ErrorReason::SubmissionFailed, e.to_string(), network);
            }
        };

        let signature = match self.signer.send_transaction(&signed, network).await {
            Ok(signature) => signature,
            Err(e) => {
                return SettleResponse::error(ErrorReason::SubmissionFailed, e.to_string(), network);
            }
        };

        match self.signer.confirm_transaction(&signature, network).await {
            Ok(()) => SettleResponse::success(signature, network, verified.payer),
            Err(e) => SettleResponse {
                success: false,
                error_reason: Some(ErrorReason::SubmissionFailed.into()),
                error_message: Some(e.to_string()),
                payer: Some(verified.payer),
                transaction: signature,
                network: network.to_owned(),
            },
        }
    }

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

impl<S: SvmFacilitatorSigner + 'static> SchemeFacilitator for ExactSvmFacilitator<S> {
    fn scheme(&self) -> &str {
        SCHEME_EXACT
    }

    fn caip_family(&self) -> &str {
        "solana:*"
    }

    fn get_extra(&self, _network: &str) -> Option<Value> {
        self.signer
            .get_addresses()
            .first()
            .map(|fee_payer| serde_json::json!({"feePayer": fee_payer}))
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
                Ok(verified) => VerifyResponse::valid(verified.payer),
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

impl<S: SvmFacilitatorSigner + 'static> SchemeFacilitatorV1 for ExactSvmFacilitator<S> {
    fn scheme(&self) -> &str {
        SCHEME_EXACT
    }

    fn caip_family(&self) -> &str {
        "solana:*"
    }

    fn get_extra(&self, network: &str) -> Option<Value> {
        SchemeFacilitator::get_extra(self, network)
    }

    fn get_signers(&self, network: &str) -> Vec<String> {
        SchemeFacilitator::get_signers(self, network)
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
            match self.verify_inner(&mapped, &payload.payload, &mapped).await {
                Ok(verified) => VerifyResponse::valid(verified.payer),
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
