use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use tradeflow_core::{DomainError, ErrorKind};
use tradeflow_infra::{ServiceError, StoreError};

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Domain(e) => domain_error_to_response(&e),
        ServiceError::Store(StoreError::Concurrency(msg)) => {
            json_error(StatusCode::CONFLICT, "conflict", msg)
        }
        ServiceError::Store(e) => {
            tracing::error!(error = %e, "ledger store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
    }
}

pub fn domain_error_to_response(err: &DomainError) -> axum::response::Response {
    let (status, code) = match err.kind() {
        ErrorKind::Validation => (StatusCode::BAD_REQUEST, "validation_error"),
        ErrorKind::NotFound => (StatusCode::NOT_FOUND, "not_found"),
        ErrorKind::InsufficientQuantity => (StatusCode::BAD_REQUEST, "insufficient_quantity"),
        ErrorKind::StateConflict => (StatusCode::CONFLICT, "state_conflict"),
        ErrorKind::Concurrency => (StatusCode::CONFLICT, "conflict"),
    };

    (
        status,
        axum::Json(json!({
            "error": code,
            "message": err.to_string(),
            "line": err.line(),
        })),
    )
        .into_response()
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
