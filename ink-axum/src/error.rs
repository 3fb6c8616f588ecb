use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ink_core::errors::InkError;

/// Any error leaving a handler: structured ones keep their status and
/// shape, everything else becomes a 500 `GeneralError`.
#[derive(Debug)]
pub struct InkAxumError(pub anyhow::Error);

impl From<anyhow::Error> for InkAxumError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl From<InkError> for InkAxumError {
    fn from(e: InkError) -> Self {
        Self(e.into_anyhow())
    }
}

impl InkAxumError {
    /// The client-safe error this will be rendered as.
    pub fn to_client_error(&self) -> InkError {
        match InkError::from_anyhow(&self.0) {
            Some(ink) => ink.sanitize_for_client(),
            None => InkError::general_error(self.0.to_string()),
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.to_client_error().code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for InkAxumError {
    fn into_response(self) -> Response {
        let safe = self.to_client_error();
        let status = StatusCode::from_u16(safe.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = ?self.0, "request failed");
        }
        (status, Json(safe.to_json())).into_response()
    }
}
