//! HTTP client for a remote facilitator service.
//!
//! Speaks the facilitator API: `POST /verify`, `POST /settle`,
//! `GET /supported`. The supported response is cached for a short TTL so
//! the resource server does not round-trip per challenge.

use std::time::{Duration, Instant};

use serde_json::json;
use tokio::sync::Mutex;
use url::Url;

use h402::scheme::{BoxFuture, SchemeError};
use h402::server::FacilitatorClient;
use h402_proto::{
    PaymentPayload, PaymentPayloadV1, PaymentRequirements, PaymentRequirementsV1, SettleResponse,
    SupportedResponse, VerifyRequest, VerifyResponse,
};

/// Default TTL for the cached `GET /supported` response.
pub const DEFAULT_SUPPORTED_CACHE_TTL: Duration = Duration::from_secs(600);

/// HTTP-backed [`FacilitatorClient`].
pub struct HttpFacilitatorClient {
    base_url: Url,
    http: reqwest::Client,
    supported_cache: Mutex<Option<(Instant, SupportedResponse)>>,
    supported_cache_ttl: Option<Duration>,
}

impl std::fmt::Debug for HttpFacilitatorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFacilitatorClient")
            .field("base_url", &self.base_url.as_str())
            .field("supported_cache_ttl", &self.supported_cache_ttl)
            .finish_non_exhaustive()
    }
}

impl HttpFacilitatorClient {
    /// Creates a client for the facilitator at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error when the URL does not parse.
    pub fn try_new(base_url: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            http: reqwest::Client::new(),
            supported_cache: Mutex::new(None),
            supported_cache_ttl: Some(DEFAULT_SUPPORTED_CACHE_TTL),
        })
    }

    /// Overrides the supported-response cache TTL.
    #[must_use]
    pub fn with_supported_cache_ttl(mut self, ttl: Duration) -> Self {
        self.supported_cache_ttl = Some(ttl);
        self
    }

    /// Disables supported-response caching.
    #[must_use]
    pub fn without_supported_cache(mut self) -> Self {
        self.supported_cache_ttl = None;
        self
    }

    /// The facilitator base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, SchemeError> {
        self.base_url
            .join(path)
            .map_err(|e| SchemeError::from(e.to_string()))
    }

    async fn post<B: serde::Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, SchemeError> {
        let url = self.endpoint(path)?;
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| SchemeError::from(format!("facilitator request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(format!("facilitator returned {status}: {detail}").into());
        }
        response
            .json()
            .await
            .map_err(|e| SchemeError::from(format!("facilitator response did not parse: {e}")))
    }
}

impl FacilitatorClient for HttpFacilitatorClient {
    fn verify<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<VerifyResponse, SchemeError>> {
        Box::pin(async move {
            let body = VerifyRequest {
                payment_payload: payload.clone(),
                payment_requirements: requirements.clone(),
            };
            self.post("verify", &body).await
        })
    }

    fn settle<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<SettleResponse, SchemeError>> {
        Box::pin(async move {
            let body = VerifyRequest {
                payment_payload: payload.clone(),
                payment_requirements: requirements.clone(),
            };
            self.post("settle", &body).await
        })
    }

    fn verify_v1<'a>(
        &'a self,
        payload: &'a PaymentPayloadV1,
        requirements: &'a PaymentRequirementsV1,
    ) -> BoxFuture<'a, Result<VerifyResponse, SchemeError>> {
        Box::pin(async move {
            let body = json!({
                "paymentPayload": payload,
                "paymentRequirements": requirements,
            });
            self.post("verify", &body).await
        })
    }

    fn settle_v1<'a>(
        &'a self,
        payload: &'a PaymentPayloadV1,
        requirements: &'a PaymentRequirementsV1,
    ) -> BoxFuture<'a, Result<SettleResponse, SchemeError>> {
        Box::pin(async move {
            let body = json!({
                "paymentPayload": payload,
                "paymentRequirements": requirements,
            });
            self.post("settle", &body).await
        })
    }

    fn get_supported(&self) -> BoxFuture<'_, Result<SupportedResponse, SchemeError>> {
        Box::pin(async move {
            if let Some(ttl) = self.supported_cache_ttl {
                let cache = self.supported_cache.lock().await;
                if let Some((fetched_at, cached)) = cache.as_ref() {
                    if fetched_at.elapsed() < ttl {
                        return Ok(cached.clone());
                    }
                }
            }

            let url = self.endpoint("supported")?;
            let response = self
                .http
                .get(url)
                .send()
                .await
                .map_err(|e| SchemeError::from(format!("facilitator request failed: {e}")))?;
            let status = response.status();
            if !status.is_success() {
                return Err(format!("facilitator returned {status} for /supported").into());
            }
            let supported: SupportedResponse = response
                .json()
                .await
                .map_err(|e| SchemeError::from(format!("supported response did not parse: {e}")))?;

            if self.supported_cache_ttl.is_some() {
                *self.supported_cache.lock().await = Some((Instant::now(), supported.clone()));
            }
            Ok(supported)
        })
    }
}
