//! Narrow signer seams for the EVM mechanism.
//!
//! The mechanism never talks JSON-RPC directly: the client side needs an
//! address and a hash signer, the facilitator side a handful of reads
//! and two writes. [`ProviderFacilitatorSigner`] backs the facilitator
//! seam with an alloy [`Provider`]; tests substitute in-memory fakes.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, B256, Bytes, FixedBytes, Signature, U256};
use alloy_provider::Provider;
use alloy_rpc_types_eth::TransactionRequest;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{SolCall, SolValue};

use crate::exact::types::{
    authorizationStateCall, balanceOfCall, isValidSigCall, isValidSignatureCall, parse_erc6492,
    transferWithAuthorizationCall, transferWithAuthorizationVRSCall,
};

/// Universal EIP-6492 / EIP-1271 / EOA signature validator, deployed at
/// the same address on the supported EVM chains. Verification of
/// contract-account signatures fails on chains where it is absent.
pub const VALIDATOR_ADDRESS: Address =
    alloy_primitives::address!("dAcD51A54883eb67D95FAEb2BBfdC4a9a6BD2a3B");

/// The ERC-1271 magic return value for a valid signature.
const ERC1271_MAGIC: [u8; 4] = [0x16, 0x26, 0xba, 0x7e];

/// Errors crossing the signer seams.
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    /// A JSON-RPC request failed.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// Local signing failed.
    #[error("signing error: {0}")]
    Signing(String),

    /// The chain returned a response this client cannot interpret.
    #[error("invalid response: {0}")]
    Response(String),
}

/// Client-side signer: an address and a typed-data hash signer.
///
/// Abstracting over [`PrivateKeySigner`] keeps `Arc`-shared signers and
/// hardware wallets usable behind one seam.
pub trait EvmSigner: Send + Sync {
    /// The signer's address (`authorization.from`).
    fn address(&self) -> Address;

    /// Signs a 32-byte EIP-712 digest.
    fn sign_hash(
        &self,
        hash: &FixedBytes<32>,
    ) -> impl Future<Output = Result<Signature, SignerError>> + Send;
}

impl EvmSigner for PrivateKeySigner {
    fn address(&self) -> Address {
        Self::address(self)
    }

    async fn sign_hash(&self, hash: &FixedBytes<32>) -> Result<Signature, SignerError> {
        alloy_signer::Signer::sign_hash(self, hash)
            .await
            .map_err(|e| SignerError::Signing(e.to_string()))
    }
}

impl<T: EvmSigner> EvmSigner for Arc<T> {
    fn address(&self) -> Address {
        (**self).address()
    }

    async fn sign_hash(&self, hash: &FixedBytes<32>) -> Result<Signature, SignerError> {
        (**self).sign_hash(hash).await
    }
}

/// Mined-transaction receipt, reduced to what settlement needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    /// 1 on success, 0 on revert.
    pub status: u64,

    /// Block the transaction landed in.
    pub block_number: u64,

    /// The transaction hash.
    pub tx_hash: String,
}

/// Parameters of one `transferWithAuthorization` submission.
#[derive(Debug, Clone, Copy)]
pub struct TransferParams {
    /// Token owner.
    pub from: Address,
    /// Recipient.
    pub to: Address,
    /// Value in token units.
    pub value: U256,
    /// Window start.
    pub valid_after: U256,
    /// Window end.
    pub valid_before: U256,
    /// EIP-3009 nonce.
    pub nonce: B256,
}

/// Facilitator-side signer: chain reads plus settlement writes.
pub trait EvmFacilitatorSigner: Send + Sync {
    /// Addresses this facilitator settles from.
    fn get_addresses(&self) -> Vec<String>;

    /// The connected chain's EIP-155 id.
    fn get_chain_id(&self) -> impl Future<Output = Result<u64, SignerError>> + Send;

    /// Deployed bytecode at an address; empty for EOAs.
    fn get_code(&self, address: Address)
    -> impl Future<Output = Result<Bytes, SignerError>> + Send;

    /// ERC-20 balance of `account` on `token`.
    fn get_balance(
        &self,
        account: Address,
        token: Address,
    ) -> impl Future<Output = Result<U256, SignerError>> + Send;

    /// ERC-3009 `authorizationState(authorizer, nonce)` on `token`.
    fn authorization_state(
        &self,
        token: Address,
        authorizer: Address,
        nonce: B256,
    ) -> impl Future<Output = Result<bool, SignerError>> + Send;

    /// Verifies a typed-data signature for `signer` over `hash`,
    /// covering EOA, EIP-1271, and EIP-6492 forms.
    fn verify_typed_data(
        &self,
        signer: Address,
        hash: B256,
        signature: &[u8],
    ) -> impl Future<Output = Result<bool, SignerError>> + Send;

    /// Submits `transferWithAuthorization` to `token` and returns the
    /// transaction hash.
    fn transfer_with_authorization(
        &self,
        token: Address,
        params: &TransferParams,
        signature: &[u8],
    ) -> impl Future<Output = Result<String, SignerError>> + Send;

    /// Submits an arbitrary call (EIP-6492 factory deployment) and
    /// returns the transaction hash.
    fn send_transaction(
        &self,
        to: Address,
        data: Bytes,
    ) -> impl Future<Output = Result<String, SignerError>> + Send;

    /// Waits for the receipt of a previously submitted transaction.
    fn wait_for_receipt(
        &self,
        tx_hash: &str,
    ) -> impl Future<Output = Result<TransactionReceipt, SignerError>> + Send;
}

/// Decodes a 64- or 65-byte ECDSA signature.
#[must_use]
pub fn decode_ecdsa_signature(signature: &[u8]) -> Option<Signature> {
    match signature.len() {
        65 => Signature::from_raw(signature).ok().map(Signature::normalized_s),
        64 => {
            let mut compact = [0u8; 64];
            compact.copy_from_slice(signature);
            Some(Signature::from_erc2098(&compact).normalized_s())
        }
        _ => None,
    }
}

/// [`EvmFacilitatorSigner`] backed by an alloy [`Provider`].
///
/// The provider must carry a wallet for `signer_address` so settlement
/// transactions can be signed and sent.
#[derive(Debug, Clone)]
pub struct ProviderFacilitatorSigner<P> {
    provider: P,
    signer_address: Address,
}

impl<P> ProviderFacilitatorSigner<P> {
    /// Creates a signer around a wallet-enabled provider.
    pub const fn new(provider: P, signer_address: Address) -> Self {
        Self {
            provider,
            signer_address,
        }
    }

    /// The address settlement transactions are sent from.
    #[must_use]
    pub const fn signer_address(&self) -> Address {
        self.signer_address
    }
}

impl<P> ProviderFacilitatorSigner<P>
where
    P: Provider + Send + Sync,
{
    async fn eth_call(&self, to: Address, data: Vec<u8>) -> Result<Bytes, SignerError> {
        let tx = TransactionRequest::default().to(to).input(data.into());
        self.provider
            .call(tx)
            .await
            .map_err(|e| SignerError::Rpc(e.to_string()))
    }
}

impl<P> EvmFacilitatorSigner for ProviderFacilitatorSigner<P>
where
    P: Provider + Send + Sync,
{
    fn get_addresses(&self) -> Vec<String> {
        vec![self.signer_address.to_string()]
    }

    async fn get_chain_id(&self) -> Result<u64, SignerError> {
        self.provider
            .get_chain_id()
            .await
            .map_err(|e| SignerError::Rpc(e.to_string()))
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, SignerError> {
        self.provider
            .get_code_at(address)
            .await
            .map_err(|e| SignerError::Rpc(e.to_string()))
    }

    async fn get_balance(&self, account: Address, token: Address) -> Result<U256, SignerError> {
        let call = balanceOfCall { account };
        let result = self.eth_call(token, call.abi_encode()).await?;
        if result.len() < 32 {
            return Err(SignerError::Response("short balanceOf response".into()));
        }
        Ok(U256::from_be_slice(&result[..32]))
    }

    async fn authorization_state(
        &self,
        token: Address,
        authorizer: Address,
        nonce: B256,
    ) -> Result<bool, SignerError> {
        let call = authorizationStateCall { authorizer, nonce };
        let result = self.eth_call(token, call.abi_encode()).await?;
        Ok(result.len() >= 32 && result[31] != 0)
    }

    async fn verify_typed_data(
        &self,
        signer: Address,
        hash: B256,
        signature: &[u8],
    ) -> Result<bool, SignerError> {
        // EOA fast path: recover locally when the account has no code.
        if let Some(ecdsa) = decode_ecdsa_signature(signature) {
            let code = self.get_code(signer).await?;
            if code.is_empty() {
                return Ok(ecdsa
                    .recover_address_from_prehash(&hash)
                    .is_ok_and(|recovered| recovered == signer));
            }
            // Deployed contract account: ERC-1271.
            let call = isValidSignatureCall {
                hash,
                signature: signature.to_vec().into(),
            };
            let result = self.eth_call(signer, call.abi_encode()).await?;
            return Ok(result.len() >= 4 && result[..4] == ERC1271_MAGIC);
        }

        // EIP-6492 wrappers and other contract signatures go through the
        // universal validator, which simulates deployment when needed.
        let call = isValidSigCall {
            signer,
            hash,
            signature: signature.to_vec().into(),
        };
        let result = self.eth_call(VALIDATOR_ADDRESS, call.abi_encode()).await?;
        bool::abi_decode(&result).map_err(|e| SignerError::Response(e.to_string()))
    }

    async fn transfer_with_authorization(
        &self,
        token: Address,
        params: &TransferParams,
        signature: &[u8],
    ) -> Result<String, SignerError> {
        // Strip an EIP-6492 wrapper; the wallet itself validates the
        // inner signature once deployed.
        let inner = parse_erc6492(signature).map(|s| s.inner.to_vec());
        let signature = inner.as_deref().unwrap_or(signature);

        // EOAs get the v/r/s overload for maximum contract
        // compatibility, contract wallets the bytes overload.
        let calldata = if let Some(ecdsa) = decode_ecdsa_signature(signature) {
            transferWithAuthorizationVRSCall {
                from: params.from,
                to: params.to,
                value: params.value,
                validAfter: params.valid_after,
                validBefore: params.valid_before,
                nonce: params.nonce,
                v: if ecdsa.v() { 28 } else { 27 },
                r: params_word(ecdsa.r()),
                s: params_word(ecdsa.s()),
            }
            .abi_encode()
        } else {
            transferWithAuthorizationCall {
                from: params.from,
                to: params.to,
                value: params.value,
                validAfter: params.valid_after,
                validBefore: params.valid_before,
                nonce: params.nonce,
                signature: signature.to_vec().into(),
            }
            .abi_encode()
        };

        let tx = TransactionRequest::default()
            .from(self.signer_address)
            .to(token)
            .input(calldata.into());
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| SignerError::Rpc(e.to_string()))?;
        Ok(pending.tx_hash().to_string())
    }

    async fn send_transaction(&self, to: Address, data: Bytes) -> Result<String, SignerError> {
        let tx = TransactionRequest::default()
            .from(self.signer_address)
            .to(to)
            .input(data.into());
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| SignerError::Rpc(e.to_string()))?;
        Ok(pending.tx_hash().to_string())
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TransactionReceipt, SignerError> {
        let hash: B256 = tx_hash
            .parse()
            .map_err(|_| SignerError::Response(format!("invalid tx hash: {tx_hash}")))?;

        // Poll with a bounded budget; settlement is not cancellable once
        // broadcast, but waiting must not hang the worker forever.
        for _ in 0..60 {
            let receipt = self
                .provider
                .get_transaction_receipt(hash)
                .await
                .map_err(|e| SignerError::Rpc(e.to_string()))?;
            if let Some(receipt) = receipt {
                return Ok(TransactionReceipt {
                    status: u64::from(receipt.status()),
                    block_number: receipt.block_number.unwrap_or_default(),
                    tx_hash: tx_hash.to_owned(),
                });
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        Err(SignerError::Rpc(format!(
            "timed out waiting for receipt of {tx_hash}"
        )))
    }
}

fn params_word(value: U256) -> B256 {
    B256::from(value.to_be_bytes::<32>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ecdsa_decoding_by_length() {
        assert!(decode_ecdsa_signature(&[0u8; 63]).is_none());
        assert!(decode_ecdsa_signature(&[0u8; 66]).is_none());
        // A well-formed compact signature decodes.
        let mut compact = [0u8; 64];
        compact[31] = 1;
        compact[63] = 1;
        assert!(decode_ecdsa_signature(&compact).is_some());
    }
}
