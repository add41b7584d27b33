//! Error types shared by the protocol roles.

use crate::scheme::SchemeError;

/// Errors surfaced by the client, server, and facilitator roles.
///
/// Mechanism-level *payment* failures are not errors: they travel inside
/// [`VerifyResponse`](h402_proto::VerifyResponse) /
/// [`SettleResponse`](h402_proto::SettleResponse) with stable reason
/// codes. `PaymentError` covers dispatch and lifecycle problems.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PaymentError {
    /// No handler is registered for the scheme/network combination.
    #[error("no scheme '{scheme}' registered for network '{network}'")]
    SchemeNotFound {
        /// The requested scheme.
        scheme: String,
        /// The requested network.
        network: String,
    },

    /// None of the offered payment options is supported by the client.
    #[error("no supported payment option: {0}")]
    NoSupportedPaymentOption(String),

    /// A `before` hook aborted the operation.
    #[error("payment aborted: {reason}")]
    Aborted {
        /// Abort reason supplied by the hook.
        reason: String,
    },

    /// The resource server was used before `initialize()`.
    #[error("resource server not initialized; call initialize() first")]
    Uninitialized,

    /// A wire-format problem.
    #[error(transparent)]
    Protocol(#[from] h402_proto::ProtocolError),

    /// An error escaping a mechanism or facilitator client.
    #[error("{0}")]
    Scheme(SchemeError),
}

impl PaymentError {
    /// Convenience constructor for the missing-handler case.
    #[must_use]
    pub fn scheme_not_found(scheme: impl Into<String>, network: impl Into<String>) -> Self {
        Self::SchemeNotFound {
            scheme: scheme.into(),
            network: network.into(),
        }
    }
}

impl From<SchemeError> for PaymentError {
    fn from(err: SchemeError) -> Self {
        Self::Scheme(err)
    }
}

impl From<String> for PaymentError {
    fn from(message: String) -> Self {
        Self::Scheme(message.into())
    }
}

impl From<&str> for PaymentError {
    fn from(message: &str) -> Self {
        Self::Scheme(message.into())
    }
}
