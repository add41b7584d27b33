//! The `exact` scheme on Solana clusters.
//!
//! One fixed amount, carried as a single SPL `TransferChecked` in a
//! buyer-signed transaction; the facilitator pays the fees.

mod client;
mod facilitator;
mod server;
pub mod types;

pub use client::ExactSvmClient;
pub use facilitator::ExactSvmFacilitator;
pub use server::ExactSvmServer;
pub use types::{ExactSvmExtra, ExactSvmPayload, SCHEME_EXACT};
