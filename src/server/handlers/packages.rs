// src/server/handlers/packages.rs
//! Release download endpoint

use super::{ApiError, authenticate, run_blocking};
use crate::auth::User;
use crate::package::PackageType;
use crate::server::ServerState;
use crate::storage::{FileSender, SEND_CHUNK_SIZE, SendHeaders};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::Response,
};
use std::fs::File;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::{error, info};

/// Version segment resolving to the newest release
pub const LATEST: &str = "latest";

/// Holds the opened artifact until the response streams it
#[derive(Default)]
struct PendingFile {
    file: Option<(File, SendHeaders)>,
}

impl FileSender for PendingFile {
    fn send_file(&mut self, file: File, headers: SendHeaders) -> crate::Result<()> {
        self.file = Some((file, headers));
        Ok(())
    }
}

/// GET /satispress/:type/:slug/:version
///
/// Streams the release artifact, archiving it first when needed.
pub async fn download_release(
    State(state): State<Arc<ServerState>>,
    Path((package_type, slug, version)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let user = authenticate(&state, &headers)?;
    let package_type = PackageType::from_str(&package_type).map_err(|_| ApiError::NotFound)?;

    let (file, send) = run_blocking(move || prepare_download(&state, &user, package_type, &slug, &version)).await?;

    let stream = ReaderStream::with_capacity(tokio::fs::File::from_std(file), SEND_CHUNK_SIZE);
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, send.content_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", send.file_name),
        )
        .header(header::CONTENT_LENGTH, send.content_length)
        .body(Body::from_stream(stream))
        .map_err(|e| {
            error!("Failed to build download response: {}", e);
            ApiError::Internal
        })
}

/// Resolve, authorize, archive and open a release
fn prepare_download(
    state: &ServerState,
    user: &User,
    package_type: PackageType,
    slug: &str,
    version: &str,
) -> Result<(File, SendHeaders), ApiError> {
    let package = state
        .app
        .find_package(package_type, slug)?
        .ok_or(ApiError::NotFound)?;

    let release = if version == LATEST {
        package.get_latest_release()?
    } else {
        package.get_release(version)?
    };

    if !state.app.authorizer.can_download(user, &package, &release) {
        return Err(ApiError::Forbidden);
    }

    let release = state.app.manager.archive(&release)?;

    let mut pending = PendingFile::default();
    state.app.manager.send(&release, &mut pending)?;
    let (file, send) = pending.file.ok_or(ApiError::Internal)?;

    info!(
        user = %user.name,
        slug = release.slug(),
        version = release.version(),
        bytes = send.content_length,
        "Sending release"
    );
    Ok((file, send))
}
