//! Axum/tower layer enforcing payment on a protected route.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum_core::body::Body;
use axum_core::extract::Request;
use axum_core::response::Response;
use http::{HeaderValue, StatusCode, header};
use tower::util::BoxCloneSyncService;
use tower::{Layer, Service};

use crate::headers::{PAYMENT_REQUIRED, PAYMENT_RESPONSE, payment_header};
use crate::request::RequestContext;

use super::gate::{AdmitOutcome, Challenge, GateError, PaymentGate, sanitized_server_error_body};
use super::route::RouteConfig;

/// Tower layer wrapping one route with the payment gate.
///
/// ```ignore
/// let app = Router::new()
///     .route("/api/data", get(handler))
///     .layer(PaymentLayer::new(gate, route_config));
/// ```
#[derive(Debug, Clone)]
pub struct PaymentLayer {
    gate: Arc<PaymentGate>,
    route: Arc<RouteConfig>,
}

impl PaymentLayer {
    /// Creates a layer from a gate and a route configuration.
    #[must_use]
    pub fn new(gate: PaymentGate, route: RouteConfig) -> Self {
        Self {
            gate: Arc::new(gate),
            route: Arc::new(route),
        }
    }
}

impl<S> Layer<S> for PaymentLayer
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
{
    type Service = PaymentService;

    fn layer(&self, inner: S) -> Self::Service {
        PaymentService {
            gate: Arc::clone(&self.gate),
            route: Arc::clone(&self.route),
            inner: BoxCloneSyncService::new(inner),
        }
    }
}

/// The service produced by [`PaymentLayer`].
#[derive(Clone)]
pub struct PaymentService {
    gate: Arc<PaymentGate>,
    route: Arc<RouteConfig>,
    inner: BoxCloneSyncService<Request, Response, Infallible>,
}

impl std::fmt::Debug for PaymentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentService")
            .field("route", &self.route)
            .finish_non_exhaustive()
    }
}

impl Service<Request> for PaymentService {
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let gate = Arc::clone(&self.gate);
        let route = Arc::clone(&self.route);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let ctx = RequestContext::from_parts(req.method(), req.uri(), req.headers());
            let header = payment_header(req.headers()).map(ToOwned::to_owned);

            let Some(header_value) = header else {
                return Ok(match gate.challenge(&route, &ctx, None).await {
                    Ok(challenge) => challenge_response(&challenge),
                    Err(err) => server_error_response(&err),
                });
            };

            let verified = match gate.admit(&route, &ctx, &header_value).await {
                Ok(AdmitOutcome::Verified(verified)) => verified,
                Ok(AdmitOutcome::Rejected(challenge)) => {
                    return Ok(challenge_response(&challenge));
                }
                Err(err) => return Ok(server_error_response(&err)),
            };

            let response = inner.call(req).await?;

            // Settle only for a delivered resource.
            if !response.status().is_success() {
                return Ok(response);
            }

            match gate.settle(verified).await {
                Ok(header_value) => {
                    let mut response = response;
                    if let Ok(value) = HeaderValue::from_str(&header_value) {
                        response.headers_mut().insert(PAYMENT_RESPONSE, value);
                    }
                    Ok(response)
                }
                // The handler already ran, but without proof of
                // settlement the resource must not be returned as paid.
                Err(failure) => Ok(Response::builder()
                    .status(StatusCode::PAYMENT_REQUIRED)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(failure.body))
                    .unwrap_or_default()),
            }
        })
    }
}

fn challenge_response(challenge: &Challenge) -> Response {
    let mut builder = Response::builder()
        .status(StatusCode::PAYMENT_REQUIRED)
        .header(header::CONTENT_TYPE, "application/json");
    if let Ok(value) = HeaderValue::from_str(&challenge.header_value) {
        builder = builder.header(PAYMENT_REQUIRED, value);
    }
    builder
        .body(Body::from(challenge.body.clone()))
        .unwrap_or_default()
}

fn server_error_response(err: &GateError) -> Response {
    tracing::error!(error = %err, "payment gate failure");
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(sanitized_server_error_body().to_string()))
        .unwrap_or_default()
}
