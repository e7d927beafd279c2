//! JSON error bodies shared by the handlers.

use axum::{http::StatusCode, Json};
use serde_json::{json, Value};

use harbor_core::{MaskError, RouteError, SessionError};

pub type ApiError = (StatusCode, Json<Value>);

pub fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": message.into(), "code": "bad_request" })),
    )
}

pub fn not_found(message: impl Into<String>) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": message.into(), "code": "not_found" })),
    )
}

pub fn internal(err: anyhow::Error) -> ApiError {
    tracing::error!("Request failed: {:#}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "internal error", "code": "internal" })),
    )
}

/// No-route outcomes are 422, a failing road service is 502, and a request
/// that cannot be answered as asked is 400.
pub fn route_error(err: &RouteError) -> ApiError {
    let status = match err {
        RouteError::EndpointUnreachable(_)
        | RouteError::NoPathFound(_)
        | RouteError::NoHandoffAvailable { .. }
        | RouteError::RecalculationExhausted { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        RouteError::RoadRouteUnavailable(_) => StatusCode::BAD_GATEWAY,
        RouteError::InvalidPrecondition(_) => StatusCode::BAD_REQUEST,
        RouteError::PlannerUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    (
        status,
        Json(json!({ "error": err.to_string(), "code": err.code() })),
    )
}

pub fn session_error(err: &SessionError) -> ApiError {
    let status = match err {
        SessionError::AlreadyActive | SessionError::InvalidState(..) => StatusCode::CONFLICT,
        SessionError::NoSession => StatusCode::NOT_FOUND,
        SessionError::ActorStopped => StatusCode::SERVICE_UNAVAILABLE,
    };
    (
        status,
        Json(json!({ "error": err.to_string(), "detail": err })),
    )
}

pub fn mask_error(err: &MaskError) -> ApiError {
    match err {
        MaskError::Io(_) | MaskError::Metadata(_) => internal(anyhow::anyhow!(err.to_string())),
        _ => bad_request(err.to_string()),
    }
}
