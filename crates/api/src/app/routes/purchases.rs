use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;

use tradeflow_infra::PurchaseFilter;
use tradeflow_purchases::{PurchaseId, RecordPurchase};

use crate::app::dto;
use crate::app::routes::common::{parse_id, respond};
use crate::app::services::AppServices;
use crate::context::OrganizationContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(record_purchase).get(list_purchases))
        .route("/:id", get(get_purchase).delete(delete_purchase))
}

pub async fn record_purchase(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<OrganizationContext>,
    Json(body): Json<dto::RecordPurchaseRequest>,
) -> axum::response::Response {
    let cmd = RecordPurchase {
        organization: org.organization_id(),
        purchase_id: PurchaseId::generate(),
        warehouse_id: body.warehouse_id,
        order_id: body.order_id,
        transporter_id: body.transporter_id,
        invoice_no: body.invoice_no,
        invoice_date: body.invoice_date,
        lines: body.lines,
        occurred_at: Utc::now(),
    };
    respond(StatusCode::CREATED, services.ledger.record_purchase(cmd).await)
}

/// `?order_id=..&invoice_from=YYYY-MM-DD&invoice_to=YYYY-MM-DD`
pub async fn list_purchases(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<OrganizationContext>,
    Query(filter): Query<PurchaseFilter>,
) -> axum::response::Response {
    respond(
        StatusCode::OK,
        services.ledger.list_purchases(org.organization_id(), &filter).await,
    )
}

pub async fn get_purchase(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<OrganizationContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: PurchaseId = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.ledger.get_purchase(org.organization_id(), id).await)
}

pub async fn delete_purchase(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<OrganizationContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: PurchaseId = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(
        StatusCode::OK,
        services.ledger.delete_purchase(org.organization_id(), id, Utc::now()).await,
    )
}
