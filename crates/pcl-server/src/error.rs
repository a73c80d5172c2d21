use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pcl_ledger::LedgerError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Caller mistakes are 4xx; a storage outage is a service fault, never
    /// "chain invalid".
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            Self::Ledger(LedgerError::Encoding(_)) => StatusCode::BAD_REQUEST,
            Self::Ledger(LedgerError::Storage(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Ledger(LedgerError::ChainMismatch { .. })
            | Self::Config(_)
            | Self::Io(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (
            status,
            Json(json!({"success": false, "error": self.to_string()})),
        )
            .into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
