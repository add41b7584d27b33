//! Solana `exact` payment mechanism for the x402 protocol.
//!
//! Implements the `exact` scheme over `solana:*` clusters with a single
//! SPL Token `TransferChecked` instruction: the buyer builds and
//! partially signs the transaction, the facilitator verifies it,
//! attaches its fee-payer signature, and sends it to the cluster.
//!
//! # Modules
//!
//! - [`exact`] — client, server, and facilitator sides of the scheme
//! - [`signer`] — the narrow signer seams, with keypair/RPC-backed
//!   implementations
//! - [`networks`] — known Solana clusters with their USDC mints

pub mod exact;
pub mod networks;
pub mod signer;

pub use exact::{ExactSvmClient, ExactSvmFacilitator, ExactSvmServer};
pub use signer::{KeypairRpcSigner, SvmFacilitatorSigner, SvmRpc, SvmSigner, SvmSignerError};
