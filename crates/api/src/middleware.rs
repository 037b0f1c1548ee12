use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use tradeflow_infra::OrganizationResolver;

use crate::app::errors;
use crate::context::OrganizationContext;

/// Header carrying the caller's external organization key.
pub const ORGANIZATION_HEADER: &str = "x-organization";

#[derive(Clone)]
pub struct OrganizationState {
    pub resolver: Arc<dyn OrganizationResolver>,
}

pub async fn organization_middleware(
    State(state): State<OrganizationState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let key = match extract_organization_key(req.headers()) {
        Ok(key) => key,
        Err(resp) => return resp,
    };

    let Some(organization_id) = state.resolver.resolve(key) else {
        tracing::debug!(organization = key, "unknown organization key");
        return errors::json_error(
            StatusCode::UNAUTHORIZED,
            "unknown_organization",
            "organization is not recognized",
        );
    };

    req.extensions_mut()
        .insert(OrganizationContext::new(organization_id));

    next.run(req).await.into_response()
}

fn extract_organization_key(headers: &HeaderMap) -> Result<&str, Response> {
    let missing = || {
        errors::json_error(
            StatusCode::UNAUTHORIZED,
            "missing_organization",
            format!("the {ORGANIZATION_HEADER} header is required"),
        )
    };

    let key = headers
        .get(ORGANIZATION_HEADER)
        .ok_or_else(missing)?
        .to_str()
        .map_err(|_| missing())?
        .trim();

    if key.is_empty() {
        return Err(missing());
    }
    Ok(key)
}
