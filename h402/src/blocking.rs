//! Sync façades over the async roles.
//!
//! One protocol engine exists, and it is async. These wrappers own a
//! private current-thread tokio runtime and block on the inner role's
//! futures, for callers without an async context (CLI tools, sync test
//! harnesses). Do not use them from inside a tokio runtime.

use h402_proto::helpers::{PaymentPayloadEnum, PaymentRequiredEnum};
use h402_proto::{
    PaymentPayload, PaymentPayloadV1, PaymentRequirements, PaymentRequirementsV1, SettleResponse,
    SupportedResponse, VerifyResponse,
};

use crate::client::X402Client;
use crate::config::ResourceConfig;
use crate::error::PaymentError;
use crate::facilitator::X402Facilitator;
use crate::server::X402ResourceServer;

fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}

/// Blocking façade over [`X402Client`].
#[derive(Debug)]
pub struct BlockingClient {
    inner: X402Client,
    runtime: tokio::runtime::Runtime,
}

impl BlockingClient {
    /// Wraps an async client.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be created.
    pub fn new(inner: X402Client) -> std::io::Result<Self> {
        Ok(Self {
            inner,
            runtime: runtime()?,
        })
    }

    /// Returns the wrapped async client.
    #[must_use]
    pub fn into_inner(self) -> X402Client {
        self.inner
    }

    /// Blocking version of [`X402Client::create_payment_payload`].
    ///
    /// # Errors
    ///
    /// As the async counterpart.
    pub fn create_payment_payload(
        &self,
        payment_required: &PaymentRequiredEnum,
    ) -> Result<PaymentPayloadEnum, PaymentError> {
        self.runtime
            .block_on(self.inner.create_payment_payload(payment_required))
    }
}

/// Blocking façade over [`X402Facilitator`].
#[derive(Debug)]
pub struct BlockingFacilitator {
    inner: X402Facilitator,
    runtime: tokio::runtime::Runtime,
}

impl BlockingFacilitator {
    /// Wraps an async facilitator.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be created.
    pub fn new(inner: X402Facilitator) -> std::io::Result<Self> {
        Ok(Self {
            inner,
            runtime: runtime()?,
        })
    }

    /// Blocking version of [`X402Facilitator::verify`].
    ///
    /// # Errors
    ///
    /// As the async counterpart.
    pub fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, PaymentError> {
        self.runtime
            .block_on(self.inner.verify(payload, requirements))
    }

    /// Blocking version of [`X402Facilitator::settle`].
    ///
    /// # Errors
    ///
    /// As the async counterpart.
    pub fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, PaymentError> {
        self.runtime
            .block_on(self.inner.settle(payload, requirements))
    }

    /// Blocking version of [`X402Facilitator::verify_v1`].
    ///
    /// # Errors
    ///
    /// As the async counterpart.
    pub fn verify_v1(
        &self,
        payload: &PaymentPayloadV1,
        requirements: &PaymentRequirementsV1,
    ) -> Result<VerifyResponse, PaymentError> {
        self.runtime
            .block_on(self.inner.verify_v1(payload, requirements))
    }

    /// Blocking version of [`X402Facilitator::settle_v1`].
    ///
    /// # Errors
    ///
    /// As the async counterpart.
    pub fn settle_v1(
        &self,
        payload: &PaymentPayloadV1,
        requirements: &PaymentRequirementsV1,
    ) -> Result<SettleResponse, PaymentError> {
        self.runtime
            .block_on(self.inner.settle_v1(payload, requirements))
    }

    /// Enumerates supported kinds (no blocking involved).
    #[must_use]
    pub fn get_supported(&self) -> SupportedResponse {
        self.inner.get_supported()
    }
}

/// Blocking façade over [`X402ResourceServer`].
#[derive(Debug)]
pub struct BlockingResourceServer {
    inner: X402ResourceServer,
    runtime: tokio::runtime::Runtime,
}

impl BlockingResourceServer {
    /// Wraps an async resource server.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be created.
    pub fn new(inner: X402ResourceServer) -> std::io::Result<Self> {
        Ok(Self {
            inner,
            runtime: runtime()?,
        })
    }

    /// Blocking version of [`X402ResourceServer::initialize`].
    ///
    /// # Errors
    ///
    /// As the async counterpart.
    pub fn initialize(&mut self) -> Result<(), PaymentError> {
        self.runtime.block_on(self.inner.initialize())
    }

    /// Builds payment requirements (no blocking involved).
    ///
    /// # Errors
    ///
    /// As [`X402ResourceServer::build_payment_requirements`].
    pub fn build_payment_requirements(
        &self,
        config: &ResourceConfig,
    ) -> Result<Vec<PaymentRequirements>, PaymentError> {
        self.inner.build_payment_requirements(config)
    }

    /// Blocking version of [`X402ResourceServer::verify_payment`].
    ///
    /// # Errors
    ///
    /// As the async counterpart.
    pub fn verify_payment(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, PaymentError> {
        self.runtime
            .block_on(self.inner.verify_payment(payload, requirements))
    }

    /// Blocking version of [`X402ResourceServer::settle_payment`].
    ///
    /// # Errors
    ///
    /// As the async counterpart.
    pub fn settle_payment(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, PaymentError> {
        self.runtime
            .block_on(self.inner.settle_payment(payload, requirements))
    }

    /// Returns the wrapped async server.
    #[must_use]
    pub fn inner(&self) -> &X402ResourceServer {
        &self.inner
    }
}
