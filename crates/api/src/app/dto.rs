use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use tally_bills::{Bill, BillEvent, BillId};
use tally_events::{Event, EventEnvelope};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateBillRequest {
    pub currency: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLineItemRequest {
    pub bill_id: String,
    #[serde(default)]
    pub description: String,
    pub amount: f64,
}

#[derive(Debug, Deserialize)]
pub struct CloseBillRequest {
    pub id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListBillsParams {
    pub status: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct CreateBillResponse {
    pub id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLineItemResponse {
    pub current_total: f64,
    pub number_of_items: usize,
}

// -------------------------
// Mapping helpers
// -------------------------

pub fn parse_bill_id(raw: &str) -> Result<BillId, axum::response::Response> {
    raw.trim()
        .parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid bill id"))
}

pub fn bill_to_json(bill: &Bill) -> serde_json::Value {
    serde_json::json!({
        "id": bill.id_typed().to_string(),
        "currency": bill.currency(),
        "status": bill.status(),
        "lineItems": bill.line_items(),
        "totalAmount": bill.total_amount(),
        "createdAt": bill.created_at(),
        "closedOn": bill.closed_on(),
    })
}

pub fn event_to_json(envelope: &EventEnvelope<BillEvent>) -> serde_json::Value {
    let event = envelope.payload();
    serde_json::json!({
        "eventId": envelope.event_id().to_string(),
        "billId": envelope.aggregate_id().to_string(),
        "aggregateType": envelope.aggregate_type(),
        "sequence": envelope.sequence_number(),
        "eventType": event.event_type(),
        "occurredAt": event.occurred_at(),
        "payload": event,
    })
}

/// Close responses carry the closing date as a calendar date.
pub fn close_to_json(bill: &Bill) -> serde_json::Value {
    serde_json::json!({
        "id": bill.id_typed().to_string(),
        "closedOn": bill.closed_on().map(|at| at.format("%Y-%m-%d").to_string()),
        "bill": bill_to_json(bill),
    })
}
