//! Server side of the 402 dance.

mod gate;
mod layer;
mod route;

pub use gate::{
    AdmitOutcome, Challenge, GateError, PaymentGate, SettleFailure, VerifiedPayment,
    sanitized_server_error_body,
};
pub use layer::{PaymentLayer, PaymentService};
pub use route::{DEFAULT_HOOK_TIMEOUT, PaymentOption, RouteConfig, ValueSource};
