//! Maps `AppError` into the unified JSON error body.

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde_json::json;

use crate::error::AppError;

pub fn into_response(err: AppError) -> HttpResponse {
    let status = StatusCode::from_u16(err.status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    HttpResponse::build(status).json(json!({
        "error": err.error_code(),
        "message": err.to_string(),
        "status": status.as_u16(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
