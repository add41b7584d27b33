//! EVM `exact` payment mechanism for the x402 protocol.
//!
//! Implements the `exact` scheme over `eip155:*` networks using EIP-3009
//! `transferWithAuthorization`: the buyer signs an EIP-712 typed
//! authorization, the facilitator verifies it (signature, nonce,
//! balance, window) and submits the transfer from its own wallet.
//!
//! # Modules
//!
//! - [`exact`] — client, server, and facilitator sides of the scheme
//! - [`signer`] — the narrow signer seams the mechanism depends on,
//!   with alloy-backed implementations
//! - [`networks`] — known EVM networks with their USDC deployments

pub mod exact;
pub mod networks;
pub mod signer;

pub use exact::{ExactEvmClient, ExactEvmConfig, ExactEvmFacilitator, ExactEvmServer};
pub use signer::{EvmFacilitatorSigner, EvmSigner, ProviderFacilitatorSigner, SignerError};
