//! Client-side `reqwest` middleware.
//!
//! [`PaymentMiddleware`] watches for 402 responses, asks the wrapped
//! [`X402Client`] for a signed payload, and retries the request once
//! with the payment header attached. A retry marker in the request
//! extensions caps the chain at one payment attempt per logical
//! request: a second 402 surfaces to the caller untouched.

use std::sync::Arc;

use http::Extensions;
use reqwest::{Request, Response, StatusCode};
use reqwest_middleware as rqm;

use h402::X402Client;
use h402_proto::helpers::{PaymentPayloadEnum, PaymentRequiredEnum, parse_payment_required_bytes};

use crate::error::HttpPaymentError;
use crate::headers::{
    PAYMENT_REQUIRED, PAYMENT_SIGNATURE, X_PAYMENT, decode_payment_required,
    encode_payment_signature, encode_x_payment,
};

/// Marker recorded on a logical request after its single payment retry.
#[derive(Debug, Clone, Copy)]
struct PaymentRetried;

/// `reqwest` middleware that answers 402 challenges automatically.
pub struct PaymentMiddleware {
    client: Arc<X402Client>,
}

impl std::fmt::Debug for PaymentMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentMiddleware").finish_non_exhaustive()
    }
}

impl PaymentMiddleware {
    /// Wraps an [`X402Client`].
    #[must_use]
    pub fn new(client: X402Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Wraps a shared [`X402Client`].
    #[must_use]
    pub fn from_shared(client: Arc<X402Client>) -> Self {
        Self { client }
    }

    /// Parses a 402 response into a `PaymentRequired`, trying the V2
    /// header first and the V1 body second. Consumes the response.
    async fn parse_payment_required(response: Response) -> Option<PaymentRequiredEnum> {
        if let Some(header) = response
            .headers()
            .get(PAYMENT_REQUIRED)
            .and_then(|v| v.to_str().ok())
        {
            if let Ok(required) = decode_payment_required(header) {
                return Some(required);
            }
        }
        let body = response.bytes().await.ok()?;
        parse_payment_required_bytes(&body).ok()
    }
}

#[async_trait::async_trait]
impl rqm::Middleware for PaymentMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: rqm::Next<'_>,
    ) -> rqm::Result<Response> {
        let retry_req = req.try_clone();
        let response = next.clone().run(req, extensions).await?;

        if response.status() != StatusCode::PAYMENT_REQUIRED {
            return Ok(response);
        }
        // One payment attempt per logical request; the second 402
        // belongs to the caller.
        if extensions.get::<PaymentRetried>().is_some() {
            return Ok(response);
        }

        let Some(mut retry) = retry_req else {
            tracing::debug!("402 received but request body is not cloneable; passing through");
            return Ok(response);
        };

        let url = response.url().clone();
        let Some(payment_required) = Self::parse_payment_required(response).await else {
            return Err(middleware_error(h402_proto::ProtocolError::MissingPaymentRequired.into()));
        };

        tracing::debug!(%url, version = payment_required.version(), "answering 402 challenge");

        let payload = self
            .client
            .create_payment_payload(&payment_required)
            .await
            .map_err(|e| middleware_error(e.into()))?;

        let (header_name, header_value) = match &payload {
            PaymentPayloadEnum::V2(payload) => (
                PAYMENT_SIGNATURE,
                encode_payment_signature(payload).map_err(|e| middleware_error(e.into()))?,
            ),
            PaymentPayloadEnum::V1(payload) => (
                X_PAYMENT,
                encode_x_payment(payload).map_err(|e| middleware_error(e.into()))?,
            ),
        };

        retry.headers_mut().insert(
            header_name,
            header_value.parse().map_err(|_| {
                middleware_error(HttpPaymentError::Transport(
                    "payment header is not a valid header value".into(),
                ))
            })?,
        );
        extensions.insert(PaymentRetried);

        next.run(retry, extensions).await
    }
}

fn middleware_error(err: HttpPaymentError) -> rqm::Error {
    rqm::Error::Middleware(err.into())
}
