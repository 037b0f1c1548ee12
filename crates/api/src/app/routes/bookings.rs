use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;

use tradeflow_bookings::{ApproveDiscount, BookingId, CreateBooking};

use crate::app::dto;
use crate::app::routes::common::{parse_id, respond};
use crate::app::services::AppServices;
use crate::context::OrganizationContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_booking).get(list_bookings))
        .route("/:id", get(get_booking).delete(delete_booking))
        .route("/:id/approve-discount", post(approve_discount))
}

pub async fn create_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<OrganizationContext>,
    Json(body): Json<dto::CreateBookingRequest>,
) -> axum::response::Response {
    let cmd = CreateBooking {
        organization: org.organization_id(),
        booking_id: BookingId::generate(),
        warehouse_id: body.warehouse_id,
        buyer_id: body.buyer_id,
        lines: body.lines,
        details: body.details,
        occurred_at: Utc::now(),
    };
    respond(StatusCode::CREATED, services.ledger.create_booking(cmd).await)
}

pub async fn list_bookings(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<OrganizationContext>,
    Query(query): Query<dto::BookingListQuery>,
) -> axum::response::Response {
    respond(
        StatusCode::OK,
        services
            .ledger
            .list_bookings(org.organization_id(), query.buyer_id)
            .await,
    )
}

pub async fn get_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<OrganizationContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: BookingId = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.ledger.get_booking(org.organization_id(), id).await)
}

pub async fn approve_discount(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<OrganizationContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ApproveDiscountRequest>,
) -> axum::response::Response {
    let id: BookingId = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let cmd = ApproveDiscount {
        organization: org.organization_id(),
        booking_id: id,
        lines: body.lines,
        occurred_at: Utc::now(),
    };
    respond(StatusCode::OK, services.ledger.approve_discount(cmd).await)
}

pub async fn delete_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<OrganizationContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: BookingId = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(
        StatusCode::OK,
        services.ledger.delete_booking(org.organization_id(), id, Utc::now()).await,
    )
}
