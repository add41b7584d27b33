//! Narrow signer seams for the Solana mechanism.
//!
//! The client needs a keypair that can partially sign a message and an
//! RPC view for blockhash/mint lookups; the facilitator needs the five
//! operations of the fee-payer wallet: sign, simulate, send, confirm,
//! and its address list. [`KeypairRpcSigner`] backs the facilitator seam
//! with a keypair plus a `solana-client` RPC connection.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use solana_account::Account;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSimulateTransactionConfig;
use solana_commitment_config::CommitmentConfig;
use solana_keypair::Keypair;
use solana_message::Hash;
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use solana_signer::Signer;
use solana_transaction::versioned::VersionedTransaction;

use h402_proto::Base64Bytes;

/// Errors crossing the Solana signer seams.
#[derive(Debug, thiserror::Error)]
pub enum SvmSignerError {
    /// An RPC request failed.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// Local signing failed, or the signer does not control the
    /// requested fee payer.
    #[error("signing error: {0}")]
    Signing(String),

    /// The transaction bytes could not be decoded.
    #[error("invalid transaction: {0}")]
    Decode(String),

    /// Simulation reported an execution error.
    #[error("simulation failed: {0}")]
    Simulation(String),
}

/// Client-side signer: a public key plus message signing.
pub trait SvmSigner: Send + Sync {
    /// The signer's public key (transfer authority).
    fn pubkey(&self) -> Pubkey;

    /// The signer's base58 address.
    fn address(&self) -> String {
        self.pubkey().to_string()
    }

    /// Signs serialized message bytes.
    fn sign_message(&self, message: &[u8]) -> Result<Signature, SvmSignerError>;
}

impl SvmSigner for Keypair {
    fn pubkey(&self) -> Pubkey {
        Signer::pubkey(self)
    }

    fn sign_message(&self, message: &[u8]) -> Result<Signature, SvmSignerError> {
        self.try_sign_message(message)
            .map_err(|e| SvmSignerError::Signing(e.to_string()))
    }
}

impl<T: SvmSigner> SvmSigner for Arc<T> {
    fn pubkey(&self) -> Pubkey {
        (**self).pubkey()
    }

    fn sign_message(&self, message: &[u8]) -> Result<Signature, SvmSignerError> {
        (**self).sign_message(message)
    }
}

/// The RPC view the client side needs: recent blockhash and accounts.
pub trait SvmRpc: Send + Sync {
    /// Fetches a recent blockhash.
    fn get_latest_blockhash(&self) -> impl Future<Output = Result<Hash, SvmSignerError>> + Send;

    /// Fetches an account (mint lookups).
    fn get_account(
        &self,
        pubkey: &Pubkey,
    ) -> impl Future<Output = Result<Account, SvmSignerError>> + Send;
}

impl SvmRpc for RpcClient {
    async fn get_latest_blockhash(&self) -> Result<Hash, SvmSignerError> {
        Self::get_latest_blockhash(self)
            .await
            .map_err(|e| SvmSignerError::Rpc(e.to_string()))
    }

    async fn get_account(&self, pubkey: &Pubkey) -> Result<Account, SvmSignerError> {
        Self::get_account(self, pubkey)
            .await
            .map_err(|e| SvmSignerError::Rpc(e.to_string()))
    }
}

impl<T: SvmRpc> SvmRpc for Arc<T> {
    async fn get_latest_blockhash(&self) -> Result<Hash, SvmSignerError> {
        (**self).get_latest_blockhash().await
    }

    async fn get_account(&self, pubkey: &Pubkey) -> Result<Account, SvmSignerError> {
        (**self).get_account(pubkey).await
    }
}

/// Facilitator-side signer: the fee-payer wallet operations.
///
/// Transactions cross this seam as base64 strings, matching the wire
/// format, so implementations stay transport-shaped.
pub trait SvmFacilitatorSigner: Send + Sync {
    /// Fee-payer addresses this facilitator manages.
    fn get_addresses(&self) -> Vec<String>;

    /// Attaches the fee payer's signature and returns the re-encoded
    /// transaction.
    fn sign_transaction(
        &self,
        tx_base64: &str,
        fee_payer: &str,
        network: &str,
    ) -> impl Future<Output = Result<String, SvmSignerError>> + Send;

    /// Simulates the transaction; `Ok(())` when execution would succeed.
    fn simulate_transaction(
        &self,
        tx_base64: &str,
        network: &str,
    ) -> impl Future<Output = Result<(), SvmSignerError>> + Send;

    /// Sends the transaction and returns its signature.
    fn send_transaction(
        &self,
        tx_base64: &str,
        network: &str,
    ) -> impl Future<Output = Result<String, SvmSignerError>> + Send;

    /// Waits for the signature to reach the configured commitment.
    fn confirm_transaction(
        &self,
        signature: &str,
        network: &str,
    ) -> impl Future<Output = Result<(), SvmSignerError>> + Send;
}

/// Decodes a base64 wire transaction.
pub fn decode_transaction(tx_base64: &str) -> Result<VersionedTransaction, SvmSignerError> {
    let bytes = Base64Bytes::from(tx_base64)
        .decode()
        .map_err(|e| SvmSignerError::Decode(e.to_string()))?;
    bincode::deserialize(&bytes).map_err(|e| SvmSignerError::Decode(e.to_string()))
}

/// Encodes a transaction into the base64 wire form.
pub fn encode_transaction(transaction: &VersionedTransaction) -> Result<String, SvmSignerError> {
    let bytes =
        bincode::serialize(transaction).map_err(|e| SvmSignerError::Decode(e.to_string()))?;
    Ok(Base64Bytes::encode(bytes).to_string())
}

/// Places `signature` for `signer` into the transaction's signature
/// slots. Fails when the signer is not among the required signers.
pub fn place_signature(
    transaction: &mut VersionedTransaction,
    signer: &Pubkey,
    signature: Signature,
) -> Result<(), SvmSignerError> {
    let required = usize::from(transaction.message.header().num_required_signatures);
    let keys = transaction.message.static_account_keys();
    let index = keys[..required.min(keys.len())]
        .iter()
        .position(|key| key == signer)
        .ok_or_else(|| {
            SvmSignerError::Signing(format!("{signer} is not a required signer"))
        })?;
    if transaction.signatures.len() < required {
        transaction
            .signatures
            .resize(required, Signature::default());
    }
    transaction.signatures[index] = signature;
    Ok(())
}

/// [`SvmFacilitatorSigner`] backed by a keypair and an RPC client.
pub struct KeypairRpcSigner {
    keypair: Keypair,
    rpc: Arc<RpcClient>,
    commitment: CommitmentConfig,
}

impl std::fmt::Debug for KeypairRpcSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeypairRpcSigner")
            .field("pubkey", &Signer::pubkey(&self.keypair))
            .field("commitment", &self.commitment)
            .finish_non_exhaustive()
    }
}

impl KeypairRpcSigner {
    /// Creates a signer confirming to `confirmed` commitment.
    #[must_use]
    pub fn new(keypair: Keypair, rpc: Arc<RpcClient>) -> Self {
        Self {
            keypair,
            rpc,
            commitment: CommitmentConfig::confirmed(),
        }
    }

    /// Overrides the confirmation commitment.
    #[must_use]
    pub const fn with_commitment(mut self, commitment: CommitmentConfig) -> Self {
        self.commitment = commitment;
        self
    }
}

impl SvmFacilitatorSigner for KeypairRpcSigner {
    fn get_addresses(&self) -> Vec<String> {
        vec![Signer::pubkey(&self.keypair).to_string()]
    }

    async fn sign_transaction(
        &self,
        tx_base64: &str,
        fee_payer: &str,
        _network: &str,
    ) -> Result<String, SvmSignerError> {
        let own = Signer::pubkey(&self.keypair);
        if fee_payer != own.to_string() {
            return Err(SvmSignerError::Signing(format!(
                "no signer for fee payer {fee_payer}"
            )));
        }
        let mut transaction = decode_transaction(tx_base64)?;
        let message = transaction.message.serialize();
        let signature = self
            .keypair
            .try_sign_message(&message)
            .map_err(|e| SvmSignerError::Signing(e.to_string()))?;
        place_signature(&mut transaction, &own, signature)?;
        encode_transaction(&transaction)
    }

    async fn simulate_transaction(
        &self,
        tx_base64: &str,
        _network: &str,
    ) -> Result<(), SvmSignerError> {
        let transaction = decode_transaction(tx_base64)?;
        let config = RpcSimulateTransactionConfig {
            sig_verify: false,
            replace_recent_blockhash: true,
            commitment: Some(self.commitment),
            ..RpcSimulateTransactionConfig::default()
        };
        let result = self
            .rpc
            .simulate_transaction_with_config(&transaction, config)
            .await
            .map_err(|e| SvmSignerError::Rpc(e.to_string()))?;
        match result.value.err {
            Some(err) => Err(SvmSignerError::Simulation(format!("{err:?}"))),
            None => Ok(()),
        }
    }

    async fn send_transaction(
        &self,
        tx_base64: &str,
        _network: &str,
    ) -> Result<String, SvmSignerError> {
        let transaction = decode_transaction(tx_base64)?;
        let signature = self
            .rpc
            .send_transaction(&transaction)
            .await
            .map_err(|e| SvmSignerError::Rpc(e.to_string()))?;
        Ok(signature.to_string())
    }

    async fn confirm_transaction(
        &self,
        signature: &str,
        _network: &str,
    ) -> Result<(), SvmSignerError> {
        let signature: Signature = signature
            .parse()
            .map_err(|_| SvmSignerError::Decode(format!("invalid signature: {signature}")))?;

        for _ in 0..60 {
            let confirmed = self
                .rpc
                .confirm_transaction_with_commitment(&signature, self.commitment)
                .await
                .map_err(|e| SvmSignerError::Rpc(e.to_string()))?;
            if confirmed.value {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        Err(SvmSignerError::Rpc(format!(
            "timed out confirming {signature}"
        )))
    }
}
