use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use thiserror::Error;
use tracing::{error, warn};
use wrgl_protocol::ErrorResponse;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Sync(#[from] wrgl_sync::SyncError),

    #[error(transparent)]
    Protocol(#[from] wrgl_protocol::ProtocolError),

    #[error("ref error: {0}")]
    Refs(#[from] wrgl_refs::RefError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Sync(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            Self::Protocol(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();
        if status.is_server_error() {
            error!(%status, %message, "request failed");
        } else {
            warn!(%status, %message, "request rejected");
        }
        (status, Json(ErrorResponse { message })).into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
