//! Configuration values for the roles.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::{PaymentPolicy, RequirementsSelector};
use crate::scheme::{SchemeClient, SchemeClientV1};

/// What a resource server charges for one protected resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceConfig {
    /// Payment scheme identifier (e.g., `"exact"`).
    pub scheme: String,

    /// Recipient address.
    pub pay_to: String,

    /// Price: a money string (`"$1.50"`), a number, or a pre-parsed
    /// [`AssetAmount`](crate::scheme::AssetAmount) object.
    pub price: Value,

    /// CAIP-2 network identifier.
    pub network: String,

    /// Maximum validity window in seconds (default 300).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_timeout_seconds: Option<u64>,
}

/// One scheme client registration inside a [`ClientConfig`].
pub enum SchemeRegistration {
    /// A V2 registration: `network` is a CAIP-2 identifier or a family
    /// pattern like `eip155:*`.
    V2 {
        /// Network or family pattern.
        network: String,
        /// The scheme client to register.
        client: Box<dyn SchemeClient>,
    },
    /// A V1 registration: `network` is a legacy alias like
    /// `base-sepolia`.
    V1 {
        /// Network alias.
        network: String,
        /// The V1 scheme client to register.
        client: Box<dyn SchemeClientV1>,
    },
}

impl SchemeRegistration {
    /// Creates a V2 registration.
    #[must_use]
    pub fn v2(network: impl Into<String>, client: Box<dyn SchemeClient>) -> Self {
        Self::V2 {
            network: network.into(),
            client,
        }
    }

    /// Creates a V1 registration.
    #[must_use]
    pub fn v1(network: impl Into<String>, client: Box<dyn SchemeClientV1>) -> Self {
        Self::V1 {
            network: network.into(),
            client,
        }
    }

    /// Returns the protocol version of this registration.
    #[must_use]
    pub const fn x402_version(&self) -> u32 {
        match self {
            Self::V2 { .. } => 2,
            Self::V1 { .. } => 1,
        }
    }
}

impl std::fmt::Debug for SchemeRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V2 { network, .. } => f.debug_struct("V2").field("network", network).finish(),
            Self::V1 { network, .. } => f.debug_struct("V1").field("network", network).finish(),
        }
    }
}

/// Declarative configuration for [`X402Client`](crate::X402Client).
///
/// The builder-style mutators on the client remain available; this value
/// form exists for callers that assemble configuration up front.
#[derive(Default)]
pub struct ClientConfig {
    /// Scheme registrations, applied in order.
    pub schemes: Vec<SchemeRegistration>,

    /// Payment policies, applied in order.
    pub policies: Vec<PaymentPolicy>,

    /// Optional offer selector; first-offer when absent.
    pub selector: Option<RequirementsSelector>,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("schemes", &self.schemes)
            .field("policies", &self.policies.len())
            .field("selector", &self.selector.is_some())
            .finish()
    }
}

impl ClientConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a scheme registration.
    #[must_use]
    pub fn with_scheme(mut self, registration: SchemeRegistration) -> Self {
        self.schemes.push(registration);
        self
    }

    /// Appends a payment policy.
    #[must_use]
    pub fn with_policy(mut self, policy: PaymentPolicy) -> Self {
        self.policies.push(policy);
        self
    }

    /// Sets the offer selector.
    #[must_use]
    pub fn with_selector(mut self, selector: RequirementsSelector) -> Self {
        self.selector = Some(selector);
        self
    }
}
