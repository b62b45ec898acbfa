use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("{0}")]
    BadRequest(String),

    #[error("You must be logged in to access this resource")]
    Unauthorized,

    #[error("You don't have permission to access this resource")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("GitHub API Error: {message}")]
    Upstream { status: StatusCode, message: String },

    #[error("You have exceeded the API rate limit. Please try again later.")]
    RateLimited { retry_after: u64 },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] surrealdb::Error),

    #[error("Database pool error: {0}")]
    PoolError(String),

    #[error("Session error: {0}")]
    SessionError(#[from] tower_sessions::session::Error),

    #[error("OAuth error: {0}")]
    OAuthError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    /// HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
            GatewayError::Forbidden => StatusCode::FORBIDDEN,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Upstream { status, .. } => *status,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl<E> From<deadpool::managed::PoolError<E>> for GatewayError
where
    E: std::fmt::Display,
{
    fn from(e: deadpool::managed::PoolError<E>) -> Self {
        GatewayError::PoolError(e.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            GatewayError::Unauthorized => json!({
                "error": "Unauthorized",
                "message": self.to_string(),
            }),
            GatewayError::Forbidden => json!({
                "error": "Forbidden",
                "message": self.to_string(),
            }),
            GatewayError::RateLimited { retry_after } => json!({
                "error": "Too Many Requests",
                "message": self.to_string(),
                "retryAfter": retry_after,
            }),
            GatewayError::BadRequest(_)
            | GatewayError::NotFound(_)
            | GatewayError::Upstream { .. } => json!({ "error": self.to_string() }),
            _ => {
                error!(error = %self, "Request failed with internal error");
                json!({ "error": self.to_string() })
            }
        };

        (status, Json(body)).into_response()
    }
}
