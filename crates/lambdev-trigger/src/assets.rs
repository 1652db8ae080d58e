//! Static file hosting under `/static`.
//!
//! Files are served verbatim from a local folder. Directory requests get the
//! directory's `index.html`; anything missing or outside the folder is a 404.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::extract::{self, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use bytes::Bytes;
use tracing::debug;

pub const STATIC_MOUNT: &str = "/static";

/// Router serving `folder` at [`STATIC_MOUNT`].
pub fn static_router(folder: PathBuf) -> Router {
    let root = Arc::new(folder);
    Router::new()
        .route(STATIC_MOUNT, get(serve_root))
        .route(&format!("{STATIC_MOUNT}/"), get(serve_root))
        .route(&format!("{STATIC_MOUNT}/{{*file}}"), get(serve_file))
        .with_state(root)
}

async fn serve_root(State(root): State<Arc<PathBuf>>) -> Response {
    respond(&root, "").await
}

async fn serve_file(
    State(root): State<Arc<PathBuf>>,
    extract::Path(file): extract::Path<String>,
) -> Response {
    respond(&root, &file).await
}

async fn respond(root: &Path, file: &str) -> Response {
    match read_asset(root, file).await {
        Some((body, mime)) => ([(CONTENT_TYPE, mime)], body).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Join a request path onto `root`, refusing anything but plain names.
fn resolve(root: &Path, file: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for component in Path::new(file).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(path)
}

async fn read_asset(root: &Path, file: &str) -> Option<(Bytes, String)> {
    let Some(mut path) = resolve(root, file) else {
        debug!(file, "rejecting static path outside the folder");
        return None;
    };
    if tokio::fs::metadata(&path).await.ok()?.is_dir() {
        path.push("index.html");
    }

    // Symlinks inside the folder must not lead out of it.
    let canonical = tokio::fs::canonicalize(&path).await.ok()?;
    let root = tokio::fs::canonicalize(root).await.ok()?;
    if !canonical.starts_with(&root) {
        debug!(path = %path.display(), "rejecting static path outside the folder");
        return None;
    }

    match tokio::fs::read(&canonical).await {
        Ok(contents) => {
            let mime = mime_guess::from_path(&canonical).first_or_octet_stream();
            Some((Bytes::from(contents), mime.to_string()))
        }
        Err(e) => {
            debug!(path = %path.display(), error = %e, "static file unavailable");
            None
        }
    }
}
