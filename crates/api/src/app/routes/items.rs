use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;

use tradeflow_catalog::{CreateItem, ItemId};

use crate::app::dto;
use crate::app::routes::common::{parse_id, respond};
use crate::app::services::AppServices;
use crate::context::OrganizationContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_item).get(list_items))
        .route("/:id", get(get_item))
        .route("/:id/deactivate", post(deactivate_item))
}

pub async fn create_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<OrganizationContext>,
    Json(body): Json<dto::CreateItemRequest>,
) -> axum::response::Response {
    let cmd = CreateItem {
        organization: org.organization_id(),
        item_id: ItemId::generate(),
        name: body.name,
        material_description: body.material_description,
        packaging: body.packaging,
        pack_size: body.pack_size,
        net_weight_grams: body.net_weight_grams,
        gross_weight_grams: body.gross_weight_grams,
        gst_percent: body.gst_percent,
        static_price: body.static_price,
        occurred_at: Utc::now(),
    };
    respond(StatusCode::CREATED, services.ledger.create_item(cmd).await)
}

pub async fn list_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<OrganizationContext>,
) -> axum::response::Response {
    respond(StatusCode::OK, services.ledger.list_items(org.organization_id()).await)
}

pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<OrganizationContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ItemId = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.ledger.get_item(org.organization_id(), id).await)
}

pub async fn deactivate_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<OrganizationContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ItemId = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(
        StatusCode::OK,
        services.ledger.deactivate_item(org.organization_id(), id).await,
    )
}
