use axum::Router;

pub mod bookings;
pub mod common;
pub mod credit_notes;
pub mod history;
pub mod items;
pub mod orders;
pub mod purchases;
pub mod sales;
pub mod system;
pub mod warehouses;

/// Router for all organization-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/items", items::router())
        .nest("/warehouses", warehouses::router())
        .nest("/orders", orders::router())
        .nest("/bookings", bookings::router())
        .nest("/purchases", purchases::router())
        .nest("/sales", sales::router())
        .nest("/credit-notes", credit_notes::router())
        .nest("/history", history::router())
}
