use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Structured API error that serializes to JSON.
#[derive(Debug)]
pub enum ApiError {
    RoomNotFound(String),
    OriginNotAllowed(String),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::RoomNotFound(name) => (
                StatusCode::NOT_FOUND,
                "ROOM_NOT_FOUND",
                format!("Room has no members: {name}"),
            ),
            ApiError::OriginNotAllowed(origin) => (
                StatusCode::FORBIDDEN,
                "ORIGIN_NOT_ALLOWED",
                format!("Origin not allowed: {origin}"),
            ),
        };

        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}
