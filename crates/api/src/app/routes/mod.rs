use axum::{routing::{get, post}, Router};

pub mod bills;
pub mod system;

/// Router for the bill endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/api/bill", post(bills::create_bill))
        .route("/api/bill/add", post(bills::add_line_item))
        .route("/api/bill/close", post(bills::close_bill))
        .route("/api/bill/:id", get(bills::get_bill))
        .route("/api/bill/:id/events", get(bills::get_bill_events))
        .route("/api/bills", get(bills::list_bills))
}
