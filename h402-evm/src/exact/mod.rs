//! The `exact` scheme on EVM networks.
//!
//! One fixed amount, authorized off-chain with EIP-3009
//! `transferWithAuthorization` and settled by the facilitator.

mod client;
mod facilitator;
mod server;
pub mod types;

pub use client::ExactEvmClient;
pub use facilitator::{ExactEvmConfig, ExactEvmFacilitator};
pub use server::{ExactEvmServer, MoneyParser};
pub use types::{
    CLOCK_SKEW_SECS, ExactEvmAuthorization, ExactEvmPayload, ExactRequirementsExtra, SCHEME_EXACT,
};
