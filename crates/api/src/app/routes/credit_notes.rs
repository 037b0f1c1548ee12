use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;

use tradeflow_credit_notes::{CreditNoteId, IssueCreditNote};

use crate::app::dto;
use crate::app::routes::common::{parse_id, respond};
use crate::app::services::AppServices;
use crate::context::OrganizationContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(issue_credit_note).get(list_credit_notes))
        .route("/:id", get(get_credit_note))
        .route("/:id/settle", post(settle_credit_note))
}

pub async fn issue_credit_note(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<OrganizationContext>,
    Json(body): Json<dto::IssueCreditNoteRequest>,
) -> axum::response::Response {
    let cmd = IssueCreditNote {
        organization: org.organization_id(),
        credit_note_id: CreditNoteId::generate(),
        sale_id: body.sale_id,
        transporter_id: body.transporter_id,
        invoice_date: body.invoice_date,
        lines: body.lines,
        occurred_at: Utc::now(),
    };
    respond(StatusCode::CREATED, services.ledger.issue_credit_note(cmd).await)
}

pub async fn list_credit_notes(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<OrganizationContext>,
) -> axum::response::Response {
    respond(
        StatusCode::OK,
        services.ledger.list_credit_notes(org.organization_id()).await,
    )
}

pub async fn get_credit_note(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<OrganizationContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: CreditNoteId = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(
        StatusCode::OK,
        services.ledger.get_credit_note(org.organization_id(), id).await,
    )
}

pub async fn settle_credit_note(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(org): Extension<OrganizationContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: CreditNoteId = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(
        StatusCode::OK,
        services
            .ledger
            .settle_credit_note(org.organization_id(), id, Utc::now())
            .await,
    )
}
