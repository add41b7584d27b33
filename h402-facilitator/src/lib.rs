//! x402 facilitator HTTP service.
//!
//! Exposes the facilitator API over axum:
//!
//! - `POST /verify` — verify a payment (V1 or V2, auto-detected)
//! - `POST /settle` — settle a payment on-chain
//! - `GET /supported` — supported kinds, signers, and extensions
//! - `GET /discovery/resources` — bazaar discovery catalog
//! - `GET /health` — liveness probe
//!
//! The binary in `main.rs` wires EVM and Solana `exact` mechanisms from
//! environment configuration and feeds verified bazaar declarations
//! into an in-memory catalog.

pub mod catalog;
pub mod config;
pub mod handlers;

pub use catalog::BazaarCatalog;
pub use config::FacilitatorConfig;
pub use handlers::{AppState, SharedState, facilitator_router};
