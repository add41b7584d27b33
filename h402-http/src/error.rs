//! Error types for the HTTP transport.

/// Errors raised by the HTTP payment layers.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum HttpPaymentError {
    /// A wire-format problem (bad base64, bad JSON, version mismatch).
    #[error(transparent)]
    Protocol(#[from] h402_proto::ProtocolError),

    /// An error from the core roles.
    #[error(transparent)]
    Payment(#[from] h402::PaymentError),

    /// A deferred price / payTo hook failed or timed out.
    #[error("hook failure: {0}")]
    Hook(String),

    /// A transport-level failure talking to the facilitator.
    #[error("transport error: {0}")]
    Transport(String),
}
