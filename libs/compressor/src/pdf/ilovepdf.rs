use super::{CompressionLevel, MultipartForm, PdfService};
use crate::error::CompressorError;
use crate::secret::ApiKey;
use async_trait::async_trait;
use bytes::Bytes;
use compressor_http::{Credentials, Method, RequestBody, RequestOptions, Transport};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;

const TOKEN_TTL_SECS: u64 = 3600;
const TOOL: &str = "compress";

/// Project key pair for the ILovePDF REST API
#[derive(Debug, Clone)]
pub struct PdfCredentials {
    public_key: String,
    secret_key: ApiKey,
}

impl PdfCredentials {
    #[must_use]
    pub fn new(public_key: impl Into<String>, secret_key: ApiKey) -> Self {
        Self {
            public_key: public_key.into(),
            secret_key,
        }
    }

    /// Parse `"<project_id>:<project_key>"`.
    ///
    /// Returns `None` when either half is missing, which means PDF
    /// compression is not configured.
    #[must_use]
    pub fn parse(pair: &str) -> Option<Self> {
        let (public, secret) = pair.split_once(':')?;
        let (public, secret) = (public.trim(), secret.trim());
        if public.is_empty() || secret.is_empty() {
            return None;
        }
        Some(Self::new(public, ApiKey::new(secret)))
    }

    #[must_use]
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Self-signed HS256 token, valid for one hour from now
    fn token(&self) -> Result<String, CompressorError> {
        let now = jsonwebtoken::get_current_timestamp();
        let claims = Claims {
            iat: now,
            nbf: now,
            exp: now + TOKEN_TTL_SECS,
            jti: &self.public_key,
        };
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret_key.expose().as_bytes()),
        )
        .map_err(|e| CompressorError::Pdf(format!("failed to sign token: {e}")))
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iat: u64,
    nbf: u64,
    exp: u64,
    jti: &'a str,
}

#[derive(Deserialize)]
struct StartTask {
    server: String,
    task: String,
}

#[derive(Deserialize)]
struct UploadedFile {
    server_filename: String,
}

/// [`PdfService`] backed by the ILovePDF task API.
///
/// One compression is a start, upload, process, download sequence against the
/// worker server assigned by the start call.
pub struct ILovePdfService {
    transport: Transport,
    endpoint: String,
    credentials: PdfCredentials,
}

impl ILovePdfService {
    #[must_use]
    pub fn new(transport: Transport, endpoint: impl Into<String>, credentials: PdfCredentials) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
            credentials,
        }
    }
}

/// Worker servers are announced as bare host names
fn server_base(server: &str) -> String {
    let server = server.trim_end_matches('/');
    if server.contains("://") {
        server.to_owned()
    } else {
        format!("https://{server}")
    }
}

#[async_trait]
impl PdfService for ILovePdfService {
    #[tracing::instrument(name = "pdf.compress", skip_all, fields(file = %file_name, level = %level))]
    async fn compress(
        &self,
        file_name: &str,
        data: Bytes,
        level: CompressionLevel,
    ) -> Result<Bytes, CompressorError> {
        let token = self.credentials.token()?;

        let start_options =
            RequestOptions::new(&self.endpoint).credentials(Credentials::bearer(token.clone()));
        let start: StartTask = self
            .transport
            .request(Method::GET, "/v1/start/compress", RequestBody::Empty, &start_options)
            .await?
            .json()?;
        if start.server.is_empty() || start.task.is_empty() {
            return Err(CompressorError::Pdf(
                "start response is missing server or task".to_owned(),
            ));
        }
        tracing::debug!(task = %start.task, server = %start.server, "pdf task started");

        let options =
            RequestOptions::new(server_base(&start.server)).credentials(Credentials::bearer(token));

        let form = MultipartForm::new()
            .text("task", start.task.clone())
            .file("file", file_name, "application/pdf", data);
        let uploaded: UploadedFile = self
            .transport
            .request(Method::POST, "/v1/upload", form.into_body(), &options)
            .await?
            .json()?;

        let process = RequestBody::json(&json!({
            "task": start.task,
            "tool": TOOL,
            "compression_level": level,
            "files": [{
                "server_filename": uploaded.server_filename,
                "filename": file_name,
            }],
        }))?;
        self.transport
            .request(Method::POST, "/v1/process", process, &options)
            .await?;

        let download = self
            .transport
            .request(
                Method::GET,
                &format!("/v1/download/{}", start.task),
                RequestBody::Empty,
                &options,
            )
            .await?;
        if download.body.is_empty() {
            return Err(CompressorError::Pdf("download returned no data".to_owned()));
        }
        Ok(download.body)
    }
}
