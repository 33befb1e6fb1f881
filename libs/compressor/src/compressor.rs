use crate::config::{CompressorConfig, ShrinkConfig};
use crate::error::CompressorError;
use crate::fs::write_atomic;
use crate::pdf::{CompressionLevel, ILovePdfService, PdfCredentials, PdfService};
use crate::shrink::{ShrinkClient, ShrinkSource};
use bytes::Bytes;
use compressor_http::{CompressionCounter, Transport};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Where the image to compress comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompressionMode {
    /// A local file, compressed in place unless a destination is given
    #[default]
    File,
    /// A remote URL fetched by the service; a destination is required
    Url,
}

impl FromStr for CompressionMode {
    type Err = CompressorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(Self::File),
            "url" => Ok(Self::Url),
            other => Err(CompressorError::ModeNotSupported(other.to_owned())),
        }
    }
}

impl fmt::Display for CompressionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::File => "file",
            Self::Url => "url",
        })
    }
}

/// Entry point for image and PDF compression.
///
/// Cheap to share: every image compression runs on its own [`ShrinkClient`]
/// over a common transport, so concurrent calls never see each other's
/// pending results.
#[derive(Clone)]
pub struct Compressor {
    transport: Transport,
    shrink: ShrinkConfig,
    pdf: Option<Arc<dyn PdfService>>,
}

impl Compressor {
    #[must_use]
    pub fn new(transport: Transport, shrink: ShrinkConfig) -> Self {
        Self {
            transport,
            shrink,
            pdf: None,
        }
    }

    /// Build a compressor, its transport and (if credentials are present) the
    /// ILovePDF service from configuration.
    ///
    /// # Errors
    /// Returns [`CompressorError::Http`] if the transport cannot be built.
    pub fn from_config(
        config: &CompressorConfig,
        counter: CompressionCounter,
    ) -> Result<Self, CompressorError> {
        let transport = config.transport.build_transport(counter)?;
        let mut compressor = Self::new(transport.clone(), config.tinypng.clone());
        if let Some(credentials) = PdfCredentials::parse(config.ilovepdf.credentials.expose()) {
            compressor = compressor.with_pdf_service(Arc::new(ILovePdfService::new(
                transport,
                &config.ilovepdf.api_endpoint,
                credentials,
            )));
        } else {
            tracing::debug!("PDF credentials not configured");
        }
        Ok(compressor)
    }

    #[must_use]
    pub fn with_pdf_service(mut self, service: Arc<dyn PdfService>) -> Self {
        self.pdf = Some(service);
        self
    }

    /// Last `compression-count` reported by the image service
    #[must_use]
    pub fn compression_count(&self) -> u64 {
        self.transport.counter().get()
    }

    #[must_use]
    pub fn counter(&self) -> &CompressionCounter {
        self.transport.counter()
    }

    /// A fresh client for the image service
    #[must_use]
    pub fn shrink_client(&self) -> ShrinkClient {
        ShrinkClient::new(self.transport.clone(), self.shrink.clone())
    }

    /// Compress an image and write the result.
    ///
    /// In [`CompressionMode::File`] `file` is a local path and the result
    /// overwrites it unless `new_file` is given. In [`CompressionMode::Url`]
    /// `file` is a URL and `new_file` is mandatory. Returns the destination.
    ///
    /// # Errors
    /// - [`CompressorError::FileNotFound`] if the local file does not exist
    /// - [`CompressorError::EmptyNewFile`] for URL mode without a destination
    /// - anything [`ShrinkClient::compress`] or [`ShrinkClient::to_file`] fails with
    #[tracing::instrument(skip(self, new_file, mode), fields(mode = %mode))]
    pub async fn compress_image(
        &self,
        file: &str,
        new_file: Option<&Path>,
        mode: CompressionMode,
    ) -> Result<PathBuf, CompressorError> {
        let (source, destination) = match mode {
            CompressionMode::File => {
                let path = Path::new(file);
                let data = read_existing(path).await?;
                let destination = new_file.unwrap_or(path).to_path_buf();
                (ShrinkSource::Bytes(data), destination)
            }
            CompressionMode::Url => {
                let destination = new_file.ok_or(CompressorError::EmptyNewFile)?;
                (ShrinkSource::Url(file.to_owned()), destination.to_path_buf())
            }
        };

        let mut client = self.shrink_client();
        let written = client.compress(source).await?.to_file(&destination).await?;
        tracing::info!(
            destination = %destination.display(),
            bytes = written,
            count = self.compression_count(),
            "image compressed"
        );
        Ok(destination)
    }

    /// Compress a PDF in place.
    ///
    /// `level` is one of `low`, `recommended` or `extreme`; anything else
    /// means `recommended`.
    ///
    /// # Errors
    /// - [`CompressorError::EmptyKey`] if no PDF service is configured
    /// - [`CompressorError::FileNotFound`] if `file` does not exist
    /// - anything the [`PdfService`] fails with, or [`CompressorError::Io`]
    #[tracing::instrument(skip(self, file), fields(file = %file.display()))]
    pub async fn compress_pdf(&self, file: &Path, level: &str) -> Result<PathBuf, CompressorError> {
        let service = self
            .pdf
            .as_ref()
            .ok_or(CompressorError::EmptyKey { service: "ILovePDF" })?;
        let data = read_existing(file).await?;
        let level = CompressionLevel::parse_lenient(level);
        let name = file
            .file_name()
            .map_or_else(|| "document.pdf".to_owned(), |n| n.to_string_lossy().into_owned());

        let compressed = service.compress(&name, data, level).await?;
        let written = write_atomic(file, compressed).await?;
        tracing::info!(bytes = written, %level, "pdf compressed");
        Ok(file.to_path_buf())
    }
}

async fn read_existing(path: &Path) -> Result<Bytes, CompressorError> {
    match tokio::fs::read(path).await {
        Ok(data) => Ok(Bytes::from(data)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(CompressorError::FileNotFound(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}
