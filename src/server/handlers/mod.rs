// src/server/handlers/mod.rs
//! HTTP request handlers for the SatisPress server

pub mod index;
pub mod packages;

use crate::auth::User;
use crate::server::ServerState;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::{debug, error};

/// Realm announced on 401 responses
const AUTH_REALM: &str = "Basic realm=\"SatisPress\"";

/// Failure returned to clients
///
/// Bodies are generic; details stay in the logs.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    Forbidden,
    NotFound,
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, AUTH_REALM)],
                "Unauthorized",
            )
                .into_response(),
            Self::Forbidden => (StatusCode::FORBIDDEN, "Forbidden").into_response(),
            Self::NotFound => (StatusCode::NOT_FOUND, "Not Found").into_response(),
            Self::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response(),
        }
    }
}

impl From<crate::Error> for ApiError {
    fn from(e: crate::Error) -> Self {
        if e.is_not_found() {
            debug!("Not found: {}", e);
            Self::NotFound
        } else {
            error!("Request failed: {}", e);
            Self::Internal
        }
    }
}

/// Resolve the Basic auth API key to a user
pub fn authenticate(state: &ServerState, headers: &HeaderMap) -> Result<User, ApiError> {
    let header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    state
        .api_keys
        .authenticate_header(header)
        .cloned()
        .ok_or(ApiError::Unauthorized)
}

/// Run synchronous core work on the blocking pool
pub async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        error!("Blocking task failed: {}", e);
        ApiError::Internal
    })?
}
