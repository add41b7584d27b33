//! HTTP transport for the x402 payment protocol.
//!
//! Implements the 402 → retry → 200 dance on both sides of the wire:
//!
//! - [`server`] — a framework-neutral [`PaymentGate`](server::PaymentGate)
//!   plus an axum/tower [`PaymentLayer`](server::PaymentLayer) for
//!   protected routes, with deferred per-request pricing
//! - [`client`] — a `reqwest` middleware that answers one 402 per
//!   logical request and never loops
//! - [`facilitator_client`] — the HTTP client resource servers use to
//!   reach a remote facilitator
//! - [`headers`] — the protocol headers and their base64 codecs

pub mod client;
pub mod error;
pub mod facilitator_client;
pub mod headers;
pub mod request;
pub mod server;

pub use client::PaymentMiddleware;
pub use error::HttpPaymentError;
pub use facilitator_client::HttpFacilitatorClient;
pub use request::{HttpRequest, RequestContext};
pub use server::{PaymentGate, PaymentLayer, PaymentOption, RouteConfig, ValueSource};
