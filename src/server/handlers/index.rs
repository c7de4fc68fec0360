// src/server/handlers/index.rs
//! Repository index endpoint

use super::{ApiError, authenticate, run_blocking};
use crate::server::ServerState;
use axum::{
    extract::State,
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// GET /satispress/packages.json
///
/// Composer repository index for the authenticated user.
pub async fn packages_json(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Result<Response, ApiError> {
    let user = authenticate(&state, &headers)?;
    let body = run_blocking(move || Ok(state.render_index(&user)?)).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CACHE_CONTROL, "private, no-cache"),
        ],
        String::clone(&body),
    )
        .into_response())
}
