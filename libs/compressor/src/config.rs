//! Typed configuration for the compressor.
//!
//! Layering: serde defaults, then an optional YAML file, then
//! `COMPRESSOR__*` environment variables (`__` separates nesting levels).

use crate::error::CompressorError;
use crate::secret::ApiKey;
use compressor_http::{
    API_ENDPOINT, CompressionCounter, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY,
    DEFAULT_USER_AGENT, HttpError, RetryConfig, TlsRootConfig, Transport, TransportBuilder,
    WEB_ENDPOINT,
};
use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix for environment overrides, e.g. `COMPRESSOR__TINYPNG__API_KEY`
pub const ENV_PREFIX: &str = "COMPRESSOR__";

/// Default ILovePDF REST endpoint
pub const PDF_API_ENDPOINT: &str = "https://api.ilovepdf.com";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressorConfig {
    pub tinypng: ShrinkConfig,
    pub ilovepdf: PdfConfig,
    pub transport: TransportSettings,
}

impl CompressorConfig {
    /// Load layered configuration.
    ///
    /// # Errors
    /// Returns [`CompressorError::FileNotFound`] if `path` is given but missing,
    /// or [`CompressorError::Config`] if a layer cannot be decoded.
    pub fn load(path: Option<&Path>) -> Result<Self, CompressorError> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            if !path.is_file() {
                return Err(CompressorError::FileNotFound(path.to_path_buf()));
            }
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        Ok(figment.extract()?)
    }
}

/// Settings for the image "shrink" service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShrinkConfig {
    /// Account key; the demo value restricts uploads to the web endpoint
    #[serde(default = "ApiKey::demo")]
    pub api_key: ApiKey,

    /// Unauthenticated endpoint used for payloads under 5 MiB
    #[serde(default = "default_web_endpoint")]
    pub web_endpoint: String,

    #[serde(default = "default_api_endpoint")]
    pub api_endpoint: String,
}

fn default_web_endpoint() -> String {
    WEB_ENDPOINT.to_owned()
}

fn default_api_endpoint() -> String {
    API_ENDPOINT.to_owned()
}

impl Default for ShrinkConfig {
    fn default() -> Self {
        Self {
            api_key: ApiKey::demo(),
            web_endpoint: default_web_endpoint(),
            api_endpoint: default_api_endpoint(),
        }
    }
}

/// Settings for the PDF compression service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PdfConfig {
    /// `"<project_id>:<project_key>"`; empty means not configured
    pub credentials: ApiKey,

    #[serde(default = "default_pdf_endpoint")]
    pub api_endpoint: String,
}

fn default_pdf_endpoint() -> String {
    PDF_API_ENDPOINT.to_owned()
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            credentials: ApiKey::new(""),
            api_endpoint: default_pdf_endpoint(),
        }
    }
}

/// Transport options shared by both services
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportSettings {
    /// Per-attempt timeout
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    #[serde(default = "default_retry_delay", with = "humantime_serde")]
    pub retry_delay: Duration,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// PEM bundle trusted by authenticated requests
    pub ca_bundle: Option<PathBuf>,

    pub tls_roots: TlsRoots,

    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,

    /// Only honored in debug builds or with the `allow-insecure-http` feature
    pub allow_insecure_http: bool,
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_retries() -> usize {
    DEFAULT_MAX_RETRIES
}

fn default_retry_delay() -> Duration {
    DEFAULT_RETRY_DELAY
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_owned()
}

fn default_max_body_size() -> usize {
    64 * 1024 * 1024
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
            user_agent: default_user_agent(),
            ca_bundle: None,
            tls_roots: TlsRoots::default(),
            max_body_size: default_max_body_size(),
            allow_insecure_http: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsRoots {
    #[default]
    Native,
    Webpki,
}

impl From<TlsRoots> for TlsRootConfig {
    fn from(roots: TlsRoots) -> Self {
        match roots {
            TlsRoots::Native => Self::Native,
            TlsRoots::Webpki => Self::WebPki,
        }
    }
}

impl TransportSettings {
    #[must_use]
    pub fn builder(&self) -> TransportBuilder {
        let retry = (self.max_retries > 0).then(|| RetryConfig {
            max_retries: self.max_retries,
            delay: self.retry_delay,
        });
        let mut builder = TransportBuilder::new()
            .timeout(self.request_timeout)
            .retry(retry)
            .user_agent(self.user_agent.clone())
            .tls_roots(self.tls_roots.into())
            .max_body_size(self.max_body_size);
        if let Some(path) = &self.ca_bundle {
            builder = builder.ca_bundle(path.clone());
        }
        if self.allow_insecure_http {
            builder = allow_insecure(builder);
        }
        builder
    }

    /// Build a transport that reports into `counter`
    ///
    /// # Errors
    /// Returns an error if TLS setup fails or the CA bundle cannot be loaded.
    pub fn build_transport(&self, counter: CompressionCounter) -> Result<Transport, HttpError> {
        self.builder().counter(counter).build()
    }
}

#[cfg(any(debug_assertions, feature = "allow-insecure-http"))]
fn allow_insecure(builder: TransportBuilder) -> TransportBuilder {
    builder.allow_insecure_http()
}

#[cfg(not(any(debug_assertions, feature = "allow-insecure-http")))]
fn allow_insecure(builder: TransportBuilder) -> TransportBuilder {
    tracing::warn!("allow_insecure_http ignored: not supported in this build");
    builder
}

/// Durations written as `30s`, `500ms`, `1m 30s`
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer, de};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        humantime::parse_duration(&raw).map_err(de::Error::custom)
    }
}
