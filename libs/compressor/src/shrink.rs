use crate::config::ShrinkConfig;
use crate::error::CompressorError;
use crate::fs::write_atomic;
use bytes::Bytes;
use compressor_http::{
    ApiResponse, CompressionCounter, Credentials, Method, RequestBody, RequestOptions,
    TlsProfile, Transport,
};
use serde_json::json;
use std::path::Path;

/// Payloads at or above this size must go through the authenticated API
pub const API_THRESHOLD: usize = 5_242_880;

const SHRINK_PATH: &str = "/shrink";

/// What to compress: uploaded bytes or a remote image the service fetches itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShrinkSource {
    Bytes(Bytes),
    Url(String),
}

impl ShrinkSource {
    fn into_body(self) -> Result<RequestBody, CompressorError> {
        match self {
            Self::Bytes(data) => Ok(RequestBody::Raw(data)),
            Self::Url(url) => Ok(RequestBody::json(&json!({ "source": { "url": url } }))?),
        }
    }
}

struct Pending {
    response: ApiResponse,
    options: RequestOptions,
}

/// Client for the image "shrink" service.
///
/// Holds the response of the last successful [`compress`](Self::compress) so
/// the result can be fetched with [`to_buffer`](Self::to_buffer) or
/// [`to_file`](Self::to_file).
pub struct ShrinkClient {
    transport: Transport,
    config: ShrinkConfig,
    pending: Option<Pending>,
}

impl ShrinkClient {
    #[must_use]
    pub fn new(transport: Transport, config: ShrinkConfig) -> Self {
        Self {
            transport,
            config,
            pending: None,
        }
    }

    #[must_use]
    pub fn counter(&self) -> &CompressionCounter {
        self.transport.counter()
    }

    /// Response of the last successful upload, if any
    #[must_use]
    pub fn response(&self) -> Option<&ApiResponse> {
        self.pending.as_ref().map(|pending| &pending.response)
    }

    /// Pick endpoint, credentials and trust profile for a body of `len` bytes
    fn options_for(&self, len: usize) -> Result<RequestOptions, CompressorError> {
        if len < API_THRESHOLD {
            return Ok(RequestOptions::new(&self.config.web_endpoint));
        }
        if self.config.api_key.is_unusable() {
            return Err(CompressorError::EmptyKey { service: "TinyPng" });
        }
        Ok(RequestOptions::new(&self.config.api_endpoint)
            .credentials(Credentials::basic("api", self.config.api_key.expose()))
            .tls(TlsProfile::Pinned))
    }

    /// Upload `source` to the shrink endpoint.
    ///
    /// # Errors
    /// - [`CompressorError::EmptyKey`] for a large payload without a usable key,
    ///   raised before any network call
    /// - [`CompressorError::Http`] if the transport or the service fails
    #[tracing::instrument(name = "shrink.compress", skip_all)]
    pub async fn compress(&mut self, source: ShrinkSource) -> Result<&mut Self, CompressorError> {
        self.pending = None;

        let body = source.into_body()?;
        let options = self.options_for(body.len())?;
        tracing::debug!(
            size = body.len(),
            authenticated = options.credentials.is_some(),
            "uploading to shrink endpoint"
        );

        let response = self
            .transport
            .request(Method::POST, SHRINK_PATH, body, &options)
            .await?;
        self.pending = Some(Pending { response, options });
        Ok(self)
    }

    /// Download the compressed result.
    ///
    /// # Errors
    /// - [`CompressorError::ResponseNotFound`] if nothing was compressed yet or
    ///   the stored response carries no `location`
    /// - [`CompressorError::Http`] if the download fails
    pub async fn to_buffer(&self) -> Result<Bytes, CompressorError> {
        let pending = self
            .pending
            .as_ref()
            .ok_or(CompressorError::ResponseNotFound)?;
        let location = pending
            .response
            .location()
            .ok_or(CompressorError::ResponseNotFound)?;

        let result = self
            .transport
            .request(Method::GET, location, RequestBody::Empty, &pending.options)
            .await?;
        Ok(result.body)
    }

    /// Download the compressed result into `path`, replacing it atomically.
    ///
    /// # Errors
    /// Everything [`to_buffer`](Self::to_buffer) can fail with, plus
    /// [`CompressorError::Io`] if the file cannot be written.
    pub async fn to_file(&self, path: &Path) -> Result<u64, CompressorError> {
        let data = self.to_buffer().await?;
        Ok(write_atomic(path, data).await?)
    }
}
