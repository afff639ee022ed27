//! HTTP error mapping
//!
//! Every failure leaves the gateway as `{"err": message, "kind": kind}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use globalbank_auth::AuthError;
use globalbank_ledger::{Error as LedgerError, ErrorKind};
use thiserror::Error;

/// Gateway errors
#[derive(Error, Debug)]
pub enum ApiError {
    /// Malformed request (body, query or header)
    #[error("{0}")]
    BadRequest(String),

    /// Missing or rejected credentials
    #[error("{0}")]
    Unauthenticated(String),

    /// Ledger failure
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Authenticator failure
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Anything unexpected
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Status code and stable kind name
    pub fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "validation"),
            ApiError::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            ApiError::Ledger(e) => ledger_status(e.kind()),
            ApiError::Auth(e) => match e.ledger_kind() {
                Some(kind) => ledger_status(kind),
                None => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            },
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

fn ledger_status(kind: ErrorKind) -> (StatusCode, &'static str) {
    let status = match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::InsufficientBalance => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Transient => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, kind.as_str())
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();

        if status.is_server_error() {
            tracing::error!(kind, error = %self, "Request failed");
        } else {
            tracing::debug!(kind, error = %self, "Request rejected");
        }

        (
            status,
            Json(serde_json::json!({
                "err": self.to_string(),
                "kind": kind,
            })),
        )
            .into_response()
    }
}
