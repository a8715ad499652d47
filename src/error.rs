use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Failures a core operation can surface to the HTTP boundary.
///
/// Provider failures during prompt answering never appear here: the worker
/// captures them into the stored answer text, so polling clients always get a
/// terminal, displayable response.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("Daily prompt limit reached")]
    QuotaExceeded,

    #[error("{0}")]
    Validation(String),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{} Not Found", what))
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::QuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Internal detail is logged server-side only; the client gets the
        // uniform {status, message, data} envelope with a generic message.
        if let ApiError::Internal(source) = self {
            error!("internal error: {:?}", source);
        }

        let message = self.to_string();
        HttpResponse::build(self.status_code()).json(json!({
            "status": false,
            "message": message,
            "data": message,
        }))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
