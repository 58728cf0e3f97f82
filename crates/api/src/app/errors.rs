use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use tally_infra::BillingError;

pub fn billing_error_to_response(err: BillingError) -> axum::response::Response {
    match err {
        BillingError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_argument", msg),
        BillingError::NotFound(id) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("bill {id} not found"))
        }
        BillingError::Unavailable(msg) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "unavailable", msg)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
