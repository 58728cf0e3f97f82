use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use tally_infra::BillStatusFilter;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, axum::response::Response> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_argument", e.body_text()))
}

pub async fn create_bill(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::CreateBillRequest>, JsonRejection>,
) -> axum::response::Response {
    let req = match body(payload) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.bills.create_bill(&req.currency) {
        Ok(id) => (
            StatusCode::CREATED,
            Json(dto::CreateBillResponse { id: id.to_string() }),
        )
            .into_response(),
        Err(e) => errors::billing_error_to_response(e),
    }
}

pub async fn add_line_item(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::AddLineItemRequest>, JsonRejection>,
) -> axum::response::Response {
    let req = match body(payload) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let id = match dto::parse_bill_id(&req.bill_id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.bills.add_line_item(id, req.description, req.amount).await {
        Ok(bill) => Json(dto::AddLineItemResponse {
            current_total: bill.total_amount(),
            number_of_items: bill.line_items().len(),
        })
        .into_response(),
        Err(e) => errors::billing_error_to_response(e),
    }
}

pub async fn close_bill(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::CloseBillRequest>, JsonRejection>,
) -> axum::response::Response {
    let req = match body(payload) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let id = match dto::parse_bill_id(&req.id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.bills.close_bill(id).await {
        Ok(bill) => Json(dto::close_to_json(&bill)).into_response(),
        Err(e) => errors::billing_error_to_response(e),
    }
}

pub async fn get_bill(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_bill_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.bills.snapshot(id) {
        Ok(bill) => Json(dto::bill_to_json(&bill)).into_response(),
        Err(e) => errors::billing_error_to_response(e),
    }
}

pub async fn get_bill_events(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_bill_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.bills.history(id) {
        Ok(events) => Json(serde_json::json!({
            "events": events.iter().map(dto::event_to_json).collect::<Vec<_>>(),
        }))
        .into_response(),
        Err(e) => errors::billing_error_to_response(e),
    }
}

pub async fn list_bills(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<dto::ListBillsParams>,
) -> axum::response::Response {
    let filter: BillStatusFilter = match params.status.as_deref().unwrap_or("").parse() {
        Ok(f) => f,
        Err(e) => return errors::billing_error_to_response(e),
    };

    match services.bills.list_bills(filter) {
        Ok(bills) => Json(serde_json::json!({
            "bills": bills.iter().map(dto::bill_to_json).collect::<Vec<_>>(),
        }))
        .into_response(),
        Err(e) => errors::billing_error_to_response(e),
    }
}
