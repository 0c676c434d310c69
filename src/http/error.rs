//! JSON error envelope `{success: false, error, code}`.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mcpanel_core::AddonError;
use serde::Serialize;

#[derive(Debug)]
pub struct ApiError(pub AddonError);

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self(AddonError::Validation(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        match &self.0 {
            AddonError::Validation(_) | AddonError::Image(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AddonError::NotFound(_) => StatusCode::NOT_FOUND,
            AddonError::Conflict(_) => StatusCode::CONFLICT,
            AddonError::DownloadResolution { .. }
            | AddonError::Gateway(_)
            | AddonError::Api(_)
            | AddonError::Http(_)
            | AddonError::Timeout(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AddonError> for ApiError {
    fn from(err: AddonError) -> Self {
        Self(err)
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self(err.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let info = self.0.to_error_info();
        if status.is_server_error() {
            log::error!("Request failed with {}: {}", status, self.0);
        } else {
            log::warn!("Request rejected with {}: {}", status, self.0);
        }

        let body = ErrorBody {
            success: false,
            error: info.message,
            code: info.code,
            hint: info.recovery_hint,
            details: info.details,
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
