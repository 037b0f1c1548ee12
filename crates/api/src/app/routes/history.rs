use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Query},
    http::StatusCode,
    routing::get,
};

use tradeflow_ledger::HistoryQuery;

use crate::app::routes::common::respond;
use crate::app::services::AppServices;
use crate::context::OrganizationContext;

pub fn router() -> Router {
    Router::new().route("/", get(list_history))
}

/// `?item=..&bucket=available|committed|billed&pickup=rack|depot|plant`, newest first.
pub async fn list_history(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<OrganizationContext>,
    Query(query): Query<HistoryQuery>,
) -> axum::response::Response {
    respond(
        StatusCode::OK,
        services.ledger.list_history(org.organization_id(), &query).await,
    )
}
