use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;

use tradeflow_credit_notes::{RegisterSale, SaleId};

use crate::app::dto;
use crate::app::routes::common::{parse_id, respond};
use crate::app::services::AppServices;
use crate::context::OrganizationContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_sale).get(list_sales))
        .route("/:id", get(get_sale))
}

pub async fn register_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<OrganizationContext>,
    Json(body): Json<dto::RegisterSaleRequest>,
) -> axum::response::Response {
    let cmd = RegisterSale {
        organization: org.organization_id(),
        sale_id: SaleId::generate(),
        warehouse_id: body.warehouse_id,
        buyer_id: body.buyer_id,
        invoices: body.invoices,
        occurred_at: Utc::now(),
    };
    respond(StatusCode::CREATED, services.ledger.register_sale(cmd).await)
}

pub async fn list_sales(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<OrganizationContext>,
) -> axum::response::Response {
    respond(StatusCode::OK, services.ledger.list_sales(org.organization_id()).await)
}

pub async fn get_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<OrganizationContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: SaleId = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.ledger.get_sale(org.organization_id(), id).await)
}
