use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dashforge_common::Error;
use serde_json::json;

/// Adapts the library-crate error kinds to an HTTP status at the handler
/// boundary, per the two-tier error handling convention: `NotFound` → 404,
/// `Conflict` → 409, `UnsupportedProtocol` → 400, everything else → 500.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::UnsupportedProtocol(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}
