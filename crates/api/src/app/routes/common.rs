use std::str::FromStr;

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use tradeflow_core::DomainError;
use tradeflow_infra::ServiceResult;

use crate::app::errors;

/// Parse a path identifier, answering 400 on malformed input.
pub fn parse_id<T>(raw: &str) -> Result<T, axum::response::Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse().map_err(|e: DomainError| errors::domain_error_to_response(&e))
}

/// Serialize a service result, mapping failures through the error taxonomy.
pub fn respond<T: Serialize>(status: StatusCode, result: ServiceResult<T>) -> axum::response::Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
