//! HTTP error mapping.

use axum::Json;
use axum::extract::FromRequest;
use axum::extract::FromRequestParts;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tokenwheel_core::WheelError;

/// Error returned by every handler.
#[derive(Debug)]
pub enum ApiError {
    Wheel(WheelError),
    /// Body or query string could not be decoded.
    BadRequest(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Wheel(err) => match err {
                WheelError::NotFound { .. } => StatusCode::NOT_FOUND,
                WheelError::InvalidArgument(_)
                | WheelError::PromptNotSet(_)
                | WheelError::NothingToUndo
                | WheelError::NoTokensInCategory(_) => StatusCode::BAD_REQUEST,
                WheelError::Conflict(_) => StatusCode::CONFLICT,
                WheelError::OracleUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                WheelError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Wheel(err) => err.code(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Wheel(err) => write!(f, "{err}"),
            ApiError::BadRequest(message) => write!(f, "Malformed request: {message}"),
        }
    }
}

impl From<WheelError> for ApiError {
    fn from(err: WheelError) -> Self {
        ApiError::Wheel(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = %status, error = %self, "Request failed");
        } else {
            tracing::debug!(status = %status, error = %self, "Request rejected");
        }

        let body = ErrorBody {
            error: self.code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// `Json` extractor whose rejections use the API error body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `Query` extractor whose rejections use the API error body.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);
