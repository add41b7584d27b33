//! Axum handlers for the facilitator API.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use serde::Deserialize;
use serde_json::{Value, json};

use h402::X402Facilitator;
use h402_proto::helpers::{PaymentPayloadEnum, parse_payment_payload, parse_payment_requirements,
    PaymentRequirementsEnum};
use h402_proto::{SettleResponse, SupportedResponse, VerifyResponse};

use crate::catalog::BazaarCatalog;

/// Shared service state.
#[derive(Debug)]
pub struct AppState {
    /// The facilitator role with its registered mechanisms.
    pub facilitator: X402Facilitator,

    /// The bazaar discovery catalog.
    pub catalog: Arc<BazaarCatalog>,
}

/// Handle to the shared service state.
pub type SharedState = Arc<AppState>;

/// API error: a status code plus a sanitized message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({"error": self.message}))).into_response()
    }
}

/// Parsed verify/settle request body.
struct WireRequest {
    payload: PaymentPayloadEnum,
    requirements: PaymentRequirementsEnum,
}

fn parse_wire_request(body: &Value) -> Result<WireRequest, ApiError> {
    let payload_value = body
        .get("paymentPayload")
        .ok_or_else(|| ApiError::bad_request("missing paymentPayload"))?;
    let requirements_value = body
        .get("paymentRequirements")
        .ok_or_else(|| ApiError::bad_request("missing paymentRequirements"))?;

    let payload = parse_payment_payload(payload_value)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let requirements = parse_payment_requirements(payload.version(), requirements_value)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    Ok(WireRequest {
        payload,
        requirements,
    })
}

/// `POST /verify` — verifies a payment, auto-detecting V1/V2.
pub async fn post_verify(
    State(state): State<SharedState>,
    Json(body): Json<Value>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let request = parse_wire_request(&body)?;
    let response = match (&request.payload, &request.requirements) {
        (PaymentPayloadEnum::V2(payload), PaymentRequirementsEnum::V2(requirements)) => {
            state.facilitator.verify(payload, requirements).await
        }
        (PaymentPayloadEnum::V1(payload), PaymentRequirementsEnum::V1(requirements)) => {
            state.facilitator.verify_v1(payload, requirements).await
        }
        _ => return Err(ApiError::bad_request("payload/requirements version mismatch")),
    };
    response.map(Json).map_err(|e| ApiError::internal(e.to_string()))
}

/// `POST /settle` — settles a payment on-chain, auto-detecting V1/V2.
pub async fn post_settle(
    State(state): State<SharedState>,
    Json(body): Json<Value>,
) -> Result<Json<SettleResponse>, ApiError> {
    let request = parse_wire_request(&body)?;
    let response = match (&request.payload, &request.requirements) {
        (PaymentPayloadEnum::V2(payload), PaymentRequirementsEnum::V2(requirements)) => {
            state.facilitator.settle(payload, requirements).await
        }
        (PaymentPayloadEnum::V1(payload), PaymentRequirementsEnum::V1(requirements)) => {
            state.facilitator.settle_v1(payload, requirements).await
        }
        _ => return Err(ApiError::bad_request("payload/requirements version mismatch")),
    };
    response.map(Json).map_err(|e| ApiError::internal(e.to_string()))
}

/// `GET /supported` — supported kinds, signers, and extensions.
pub async fn get_supported(State(state): State<SharedState>) -> Json<SupportedResponse> {
    Json(state.facilitator.get_supported())
}

/// Query parameters of `GET /discovery/resources`.
#[derive(Debug, Deserialize)]
pub struct Pagination {
    /// Maximum number of items to return (default 100).
    #[serde(default = "default_limit")]
    limit: usize,

    /// Number of items to skip.
    #[serde(default)]
    offset: usize,
}

const fn default_limit() -> usize {
    100
}

/// `GET /discovery/resources` — paginated bazaar catalog.
pub async fn get_discovery_resources(
    State(state): State<SharedState>,
    Query(pagination): Query<Pagination>,
) -> Json<Value> {
    Json(state.catalog.page(pagination.limit, pagination.offset))
}

/// `GET /health` — liveness probe.
pub async fn get_health(State(state): State<SharedState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "discoveredResources": state.catalog.count(),
    }))
}

/// Builds the facilitator API router.
pub fn facilitator_router(state: SharedState) -> Router {
    Router::new()
        .route("/verify", routing::post(post_verify))
        .route("/settle", routing::post(post_settle))
        .route("/supported", routing::get(get_supported))
        .route("/discovery/resources", routing::get(get_discovery_resources))
        .route("/health", routing::get(get_health))
        .with_state(state)
}
