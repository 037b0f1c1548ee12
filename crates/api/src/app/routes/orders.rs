use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;

use tradeflow_infra::OrderFilter;
use tradeflow_orders::{OrderId, PlaceOrder, UpdateOrderDetails};

use crate::app::dto;
use crate::app::routes::common::{parse_id, respond};
use crate::app::services::AppServices;
use crate::context::OrganizationContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(place_order).get(list_orders))
        .route(
            "/:id",
            get(get_order).patch(update_order_details).delete(delete_order),
        )
}

pub async fn place_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<OrganizationContext>,
    Json(body): Json<dto::PlaceOrderRequest>,
) -> axum::response::Response {
    let cmd = PlaceOrder {
        organization: org.organization_id(),
        order_id: OrderId::generate(),
        warehouse_id: body.warehouse_id,
        manufacturer_id: body.manufacturer_id,
        lines: body.lines,
        details: body.details,
        occurred_at: Utc::now(),
    };
    respond(StatusCode::CREATED, services.ledger.place_order(cmd).await)
}

/// `?warehouse_id=..&status=..` (status as rendered, e.g. `partially paid`).
pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<OrganizationContext>,
    Query(filter): Query<OrderFilter>,
) -> axum::response::Response {
    respond(
        StatusCode::OK,
        services.ledger.list_orders(org.organization_id(), &filter).await,
    )
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<OrganizationContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: OrderId = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.ledger.get_order(org.organization_id(), id).await)
}

pub async fn update_order_details(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<OrganizationContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateOrderDetailsRequest>,
) -> axum::response::Response {
    let id: OrderId = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let cmd = UpdateOrderDetails {
        organization: org.organization_id(),
        order_id: id,
        details: body.details,
        occurred_at: Utc::now(),
    };
    respond(StatusCode::OK, services.ledger.update_order_details(cmd).await)
}

pub async fn delete_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<OrganizationContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: OrderId = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(
        StatusCode::OK,
        services.ledger.delete_order(org.organization_id(), id, Utc::now()).await,
    )
}
