use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;

use tradeflow_infra::WarehouseFilter;
use tradeflow_ledger::{CreateWarehouse, WarehouseId};

use crate::app::dto;
use crate::app::routes::common::{parse_id, respond};
use crate::app::services::AppServices;
use crate::context::OrganizationContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_warehouse).get(list_warehouses))
        .route("/:id", get(get_warehouse))
}

pub async fn create_warehouse(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<OrganizationContext>,
    Json(body): Json<dto::CreateWarehouseRequest>,
) -> axum::response::Response {
    let cmd = CreateWarehouse {
        organization: org.organization_id(),
        warehouse_id: WarehouseId::generate(),
        name: body.name,
        location: body.location,
        occurred_at: Utc::now(),
    };
    respond(StatusCode::CREATED, services.ledger.create_warehouse(cmd).await)
}

/// `?state=..&city=..`, both optional and case-insensitive.
pub async fn list_warehouses(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<OrganizationContext>,
    Query(filter): Query<WarehouseFilter>,
) -> axum::response::Response {
    respond(
        StatusCode::OK,
        services.ledger.list_warehouses(org.organization_id(), &filter).await,
    )
}

pub async fn get_warehouse(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<OrganizationContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: WarehouseId = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.ledger.get_warehouse(org.organization_id(), id).await)
}
