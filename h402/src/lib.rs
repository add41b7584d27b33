//! Core roles for the x402 payment protocol.
//!
//! The x402 protocol turns HTTP 402 Payment Required into a negotiation:
//! a resource server advertises payment requirements, a buyer signs a
//! payment and retries, and a facilitator verifies the payment and
//! settles it on-chain. This crate implements the three roles and the
//! pluggable scheme system that connects them; chain-specific mechanisms
//! live in `h402-evm` and `h402-svm`, the HTTP transport in `h402-http`.
//!
//! # Modules
//!
//! - [`client`] — [`X402Client`]: selects an offer and produces a signed payload
//! - [`server`] — [`X402ResourceServer`]: builds requirements, delegates verify/settle
//! - [`facilitator`] — [`X402Facilitator`]: dispatches verify/settle to mechanisms
//! - [`registry`] — `(version, scheme, network-pattern)` handler registry
//! - [`scheme`] — traits a payment mechanism implements per role
//! - [`hooks`] — lifecycle hook contexts and results
//! - [`bazaar`] — the discovery extension
//! - [`blocking`] — sync façades over the async roles

pub mod bazaar;
pub mod blocking;
pub mod client;
pub mod config;
pub mod error;
pub mod facilitator;
pub mod hooks;
pub mod registry;
pub mod scheme;
pub mod server;

pub use client::X402Client;
pub use config::{ClientConfig, ResourceConfig, SchemeRegistration};
pub use error::PaymentError;
pub use facilitator::X402Facilitator;
pub use registry::{NetworkPattern, SchemeRegistry};
pub use scheme::{AssetAmount, BoxFuture, SchemeError};
pub use server::X402ResourceServer;

pub use h402_proto as proto;
