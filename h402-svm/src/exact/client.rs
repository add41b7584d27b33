//! Client-side transaction building for the Solana `exact` scheme.

use serde_json::Value;
use solana_message::{VersionedMessage, v0::Message as MessageV0};
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use solana_transaction::versioned::VersionedTransaction;
use spl_token::solana_program::program_pack::Pack;

use h402::scheme::{BoxFuture, SchemeClient, SchemeClientV1, SchemeError};
use h402_proto::{PaymentRequirements, PaymentRequirementsV1};

use crate::networks::caip2_by_alias;
use crate::signer::{SvmRpc, SvmSigner, encode_transaction};

use super::types::{ExactSvmExtra, ExactSvmPayload, SCHEME_EXACT, derive_ata};

/// Builds and partially signs SPL `TransferChecked` payments.
///
/// The buyer signs as transfer authority only; the facilitator-managed
/// fee payer named in the requirements signs later, at settlement.
pub struct ExactSvmClient<S, R> {
    signer: S,
    rpc: R,
}

impl<S, R> std::fmt::Debug for ExactSvmClient<S, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExactSvmClient").finish_non_exhaustive()
    }
}

impl<S, R> ExactSvmClient<S, R> {
    /// Creates a client from a signer and an RPC view.
    pub const fn new(signer: S, rpc: R) -> Self {
        Self { signer, rpc }
    }
}

struct MintDetails {
    decimals: u8,
    token_program: Pubkey,
}

impl<S: SvmSigner, R: SvmRpc> ExactSvmClient<S, R> {
    async fn fetch_mint(&self, mint: &Pubkey) -> Result<MintDetails, SchemeError> {
        let account = self
            .rpc
            .get_account(mint)
            .await
            .map_err(|e| format!("failed to fetch mint {mint}: {e}"))?;
        if account.owner == spl_token::id() {
            let state = spl_token::state::Mint::unpack(&account.data)
                .map_err(|e| format!("failed to unpack mint {mint}: {e}"))?;
            Ok(MintDetails {
                decimals: state.decimals,
                token_program: spl_token::id(),
            })
        } else if account.owner == spl_token_2022::id() {
            let state = spl_token_2022::state::Mint::unpack(&account.data)
                .map_err(|e| format!("failed to unpack mint {mint}: {e}"))?;
            Ok(MintDetails {
                decimals: state.decimals,
                token_program: spl_token_2022::id(),
            })
        } else {
            Err(format!("account {mint} is not an SPL token mint").into())
        }
    }

    /// Builds the single-instruction transfer and signs as authority.
    async fn build_transfer(
        &self,
        fee_payer: &str,
        pay_to: &str,
        asset: &str,
        amount: &str,
    ) -> Result<ExactSvmPayload, SchemeError> {
        let fee_payer: Pubkey = fee_payer
            .parse()
            .map_err(|_| format!("invalid fee payer address: {fee_payer}"))?;
        let pay_to: Pubkey = pay_to
            .parse()
            .map_err(|_| format!("invalid payTo address: {pay_to}"))?;
        let mint: Pubkey = asset
            .parse()
            .map_err(|_| format!("invalid asset mint: {asset}"))?;
        let amount: u64 = amount
            .parse()
            .map_err(|_| format!("invalid amount: {amount}"))?;

        let details = self.fetch_mint(&mint).await?;
        let authority = self.signer.pubkey();
        let source = derive_ata(&authority, &details.token_program, &mint);
        let destination = derive_ata(&pay_to, &details.token_program, &mint);

        let instruction = if details.token_program == spl_token::id() {
            spl_token::instruction::transfer_checked(
                &details.token_program,
                &source,
                &mint,
                &destination,
                &authority,
                &[],
                amount,
                details.decimals,
            )
        } else {
            spl_token_2022::instruction::transfer_checked(
                &details.token_program,
                &source,
                &mint,
                &destination,
                &authority,
                &[],
                amount,
                details.decimals,
            )
        }
        .map_err(|e| format!("failed to build TransferChecked: {e}"))?;

        let blockhash = self.rpc.get_latest_blockhash().await?;
        let message = MessageV0::try_compile(&fee_payer, &[instruction], &[], blockhash)
            .map_err(|e| format!("failed to compile message: {e}"))?;
        let message = VersionedMessage::V0(message);

        let required = usize::from(message.header().num_required_signatures);
        let mut transaction = VersionedTransaction {
            signatures: vec![Signature::default(); required],
            message,
        };

        // Partial sign: only the authority's slot is filled; the fee
        // payer signs at settlement.
        let serialized = transaction.message.serialize();
        let signature = self.signer.sign_message(&serialized)?;
        crate::signer::place_signature(&mut transaction, &authority, signature)?;

        Ok(ExactSvmPayload {
            transaction: encode_transaction(&transaction)?,
        })
    }

    fn fee_payer_from_extra(extra: Option<&Value>) -> Result<String, SchemeError> {
        extra
            .cloned()
            .and_then(|value| serde_json::from_value::<ExactSvmExtra>(value).ok())
            .map(|extra| extra.fee_payer)
            .ok_or_else(|| {
                SchemeError::from("invalid_exact_svm_payload_missing_fee_payer: requirements extra must carry feePayer")
            })
    }
}

impl<S, R> SchemeClient for ExactSvmClient<S, R>
where
    S: SvmSigner + 'static,
    R: SvmRpc + 'static,
{
    fn scheme(&self) -> &str {
        SCHEME_EXACT
    }

    fn create_payment_payload<'a>(
        &'a self,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<Value, SchemeError>> {
        Box::pin(async move {
            let fee_payer = Self::fee_payer_from_extra(requirements.extra.as_ref())?;
            let payload = self
                .build_transfer(
                    &fee_payer,
                    &requirements.pay_to,
                    &requirements.asset,
                    &requirements.amount,
                )
                .await?;
            Ok(serde_json::to_value(payload)?)
        })
    }
}

impl<S, R> SchemeClientV1 for ExactSvmClient<S, R>
where
    S: SvmSigner + 'static,
    R: SvmRpc + 'static,
{
    fn scheme(&self) -> &str {
        SCHEME_EXACT
    }

    fn create_payment_payload<'a>(
        &'a self,
        requirements: &'a PaymentRequirementsV1,
    ) -> BoxFuture<'a, Result<Value, SchemeError>> {
        Box::pin(async move {
            // V1 aliases resolve for validation only; the transaction
            // itself is cluster-agnostic.
            if caip2_by_alias(&requirements.network).is_none()
                && !crate::networks::is_solana_network(&requirements.network)
            {
                return Err(format!("unknown V1 network: {}", requirements.network).into());
            }
            let fee_payer = Self::fee_payer_from_extra(requirements.extra.as_ref())?;
            let payload = self
                .build_transfer(
                    &fee_payer,
                    &requirements.pay_to,
                    &requirements.asset,
                    &requirements.max_amount_required,
                )
                .await?;
            Ok(serde_json::to_value(payload)?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_account::Account;
    use solana_keypair::Keypair;
    use solana_message::Hash;

    use crate::signer::{SvmSignerError, decode_transaction};

    use super::super::types::extract_single_transfer_checked;

    /// RPC stub serving a 6-decimal SPL mint and a fixed blockhash.
    struct StubRpc;

    impl SvmRpc for StubRpc {
        async fn get_latest_blockhash(&self) -> Result<Hash, SvmSignerError> {
            Ok(Hash::new_unique())
        }

        async fn get_account(&self, _pubkey: &Pubkey) -> Result<Account, SvmSignerError> {
            let mut data = vec![0u8; spl_token::state::Mint::LEN];
            let mint = spl_token::state::Mint {
                decimals: 6,
                is_initialized: true,
                ..spl_token::state::Mint::default()
            };
            spl_token::state::Mint::pack(mint, &mut data).expect("pack mint");
            Ok(Account {
                lamports: 1,
                data,
                owner: spl_token::id(),
                executable: false,
                rent_epoch: 0,
            })
        }
    }

    fn requirements(fee_payer: &str, amount: &str) -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".into(),
            network: crate::networks::SOLANA_DEVNET.into(),
            amount: amount.into(),
            pay_to: Pubkey::new_unique().to_string(),
            max_timeout_seconds: 60,
            asset: Pubkey::new_unique().to_string(),
            extra: Some(serde_json::json!({"feePayer": fee_payer})),
        }
    }

    #[tokio::test]
    async fn builds_single_transfer_checked_with_fee_payer() {
        let keypair = Keypair::new();
        let authority = SvmSigner::pubkey(&keypair);
        let fee_payer = Pubkey::new_unique();
        let client = ExactSvmClient::new(keypair, StubRpc);
        let requirements = requirements(&fee_payer.to_string(), "100000");

        let value = SchemeClient::create_payment_payload(&client, &requirements)
            .await
            .unwrap();
        let payload: ExactSvmPayload = serde_json::from_value(value).unwrap();
        let transaction = decode_transaction(&payload.transaction).unwrap();

        // Fee payer leads the account keys; only the authority signed.
        assert_eq!(transaction.message.static_account_keys()[0], fee_payer);
        let transfer = extract_single_transfer_checked(&transaction).unwrap();
        assert_eq!(transfer.amount, 100_000);
        assert_eq!(transfer.decimals, 6);
        assert_eq!(transfer.authority, authority);

        let signed: Vec<_> = transaction
            .signatures
            .iter()
            .filter(|s| **s != Signature::default())
            .collect();
        assert_eq!(signed.len(), 1);
    }

    #[tokio::test]
    async fn missing_fee_payer_is_rejected() {
        let client = ExactSvmClient::new(Keypair::new(), StubRpc);
        let mut requirements = requirements(&Pubkey::new_unique().to_string(), "1");
        requirements.extra = Some(serde_json::json!({}));

        let err = SchemeClient::create_payment_payload(&client, &requirements)
            .await
            .unwrap_err();
        assert!(
            err.to_string()
                .contains("invalid_exact_svm_payload_missing_fee_payer")
        );
    }

    #[tokio::test]
    async fn destination_is_pay_to_ata() {
        let keypair = Keypair::new();
        let client = ExactSvmClient::new(keypair, StubRpc);
        let requirements = requirements(&Pubkey::new_unique().to_string(), "42");

        let value = SchemeClient::create_payment_payload(&client, &requirements)
            .await
            .unwrap();
        let payload: ExactSvmPayload = serde_json::from_value(value).unwrap();
        let transaction = decode_transaction(&payload.transaction).unwrap();
        let transfer = extract_single_transfer_checked(&transaction).unwrap();

        let pay_to: Pubkey = requirements.pay_to.parse().unwrap();
        let mint: Pubkey = requirements.asset.parse().unwrap();
        assert_eq!(
            transfer.destination,
            derive_ata(&pay_to, &spl_token::id(), &mint)
        );
        assert_eq!(transfer.mint, mint);
    }
}
