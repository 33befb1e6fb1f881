use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use compressor::{CompressionMode, Compressor, CompressorError};
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

const FILE_FIELD: &str = "file";
const LEVEL_FIELD: &str = "level";

pub struct AppState {
    pub compressor: Compressor,
    pub upload_dir: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct CompressResponse {
    pub before: u64,
    pub after: u64,
}

/// Every failure is reported as `500 {"data": "<message>"}`
#[derive(Debug)]
pub struct ApiError {
    message: String,
}

impl ApiError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "data": self.message }));
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

impl From<CompressorError> for ApiError {
    fn from(err: CompressorError) -> Self {
        tracing::warn!(error = %err, "compression failed");
        Self::new(err.to_string())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        tracing::warn!(error = %err, "malformed upload");
        Self::new(err.body_text())
    }
}

#[must_use]
pub fn router(state: AppState, max_upload_size: usize) -> Router {
    Router::new()
        .route("/compress", post(compress))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_upload_size))
        .with_state(Arc::new(state))
}

#[allow(clippy::unused_async)]
async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "compression_count": state.compressor.compression_count(),
    }))
}

struct Upload {
    file_name: String,
    data: axum::body::Bytes,
    level: Option<String>,
}

async fn read_upload(multipart: &mut Multipart) -> Result<Upload, ApiError> {
    let mut file = None;
    let mut level = None;
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(ToOwned::to_owned);
        match name.as_deref() {
            Some(FILE_FIELD) => {
                let file_name = field.file_name().unwrap_or_default().to_owned();
                file = Some((file_name, field.bytes().await?));
            }
            Some(LEVEL_FIELD) => level = Some(field.text().await?),
            _ => {}
        }
    }
    let (file_name, data) = file.ok_or_else(|| ApiError::new("No file uploaded"))?;
    Ok(Upload {
        file_name,
        data,
        level,
    })
}

/// Keep only the last path component of a client-supplied name
fn sanitize_file_name(name: &str) -> Option<&str> {
    let base = name.rsplit(['/', '\\']).next()?.trim();
    (!base.is_empty() && base != "." && base != "..").then_some(base)
}

/// Write an upload into its own directory under `upload_dir`.
///
/// Each upload gets a fresh uuid directory so concurrent uploads with the
/// same file name never share a path.
async fn store_upload(upload_dir: &Path, name: &str, data: &[u8]) -> std::io::Result<PathBuf> {
    let dir = upload_dir.join(Uuid::new_v4().to_string());
    tokio::fs::create_dir(&dir).await?;
    let path = dir.join(name);
    tokio::fs::write(&path, data).await?;
    Ok(path)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

#[tracing::instrument(name = "api.compress", skip_all)]
async fn compress(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<CompressResponse>, ApiError> {
    let upload = read_upload(&mut multipart).await?;
    let name = sanitize_file_name(&upload.file_name)
        .ok_or_else(|| ApiError::new("Invalid file name"))?;
    let path = store_upload(&state.upload_dir, name, &upload.data)
        .await
        .map_err(|e| {
            tracing::warn!(
                error = %e,
                dir = %state.upload_dir.display(),
                "failed to store upload"
            );
            ApiError::new("Upload file not moved")
        })?;
    let before = upload.data.len() as u64;

    if is_pdf(&path) {
        let level = upload.level.as_deref().unwrap_or_default();
        state.compressor.compress_pdf(&path, level).await?;
    } else {
        let file = path
            .to_str()
            .ok_or_else(|| ApiError::new("Invalid file name"))?;
        state
            .compressor
            .compress_image(file, None, CompressionMode::File)
            .await?;
    }

    let after = tokio::fs::metadata(&path)
        .await
        .map_err(|e| ApiError::new(e.to_string()))?
        .len();
    tracing::info!(file = %name, before, after, "upload compressed");
    Ok(Json(CompressResponse { before, after }))
}
