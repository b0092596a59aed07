use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

use leaveflow_core::errors::{ApplicationError, ErrorKind, InterfaceError};

use crate::middleware::RequestId;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub correlation_id: String,
}

/// Transport error carried out of a handler.
#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl ApiError {
    pub fn from_application(error: ApplicationError, request_id: &RequestId) -> Self {
        if error.kind() == ErrorKind::Internal {
            error!(
                event_name = "system.http.internal_error",
                correlation_id = %request_id,
                error = %error,
                "request failed with an internal error"
            );
        }
        Self(error.into_interface(request_id.as_str()))
    }

    pub fn bad_request(message: impl Into<String>, request_id: &RequestId) -> Self {
        Self(InterfaceError::BadRequest {
            message: message.into(),
            correlation_id: request_id.to_string(),
        })
    }
}

pub fn error_response(status: StatusCode, message: &str, correlation_id: &str) -> Response {
    let body = ErrorBody { error: message.to_string(), correlation_id: correlation_id.to_string() };
    (status, Json(body)).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status != StatusCode::INTERNAL_SERVER_ERROR {
            warn!(
                event_name = "system.http.rejected",
                correlation_id = %self.0.correlation_id(),
                status = status.as_u16(),
                error = %self.0.message(),
                "request rejected"
            );
        }
        error_response(status, self.0.message(), self.0.correlation_id())
    }
}
