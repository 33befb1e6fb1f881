#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Image and PDF compression through remote services
//!
//! Images go to a TinyPNG-style "shrink" API: payloads under 5 MiB use the
//! free web endpoint, larger ones need an account key and the authenticated
//! API. PDFs go to ILovePDF when a project key pair is configured.
//!
//! # Example
//!
//! ```ignore
//! use compressor::{CompressionCounter, CompressionMode, Compressor, CompressorConfig};
//!
//! let config = CompressorConfig::load(Some(Path::new("compressor.yaml")))?;
//! let compressor = Compressor::from_config(&config, CompressionCounter::new())?;
//!
//! compressor.compress_image("uploads/cat.png", None, CompressionMode::File).await?;
//! compressor.compress_pdf(Path::new("uploads/report.pdf"), "extreme").await?;
//! println!("compressions this month: {}", compressor.compression_count());
//! ```

mod compressor;
mod config;
mod error;
mod fs;
pub mod pdf;
mod secret;
mod shrink;

pub use compressor::{CompressionMode, Compressor};
pub use config::{
    CompressorConfig, ENV_PREFIX, PDF_API_ENDPOINT, PdfConfig, ShrinkConfig, TlsRoots,
    TransportSettings,
};
pub use error::CompressorError;
pub use pdf::{CompressionLevel, ILovePdfService, PdfCredentials, PdfService};
pub use secret::{ApiKey, DEMO_KEY};
pub use shrink::{API_THRESHOLD, ShrinkClient, ShrinkSource};

pub use compressor_http::{CompressionCounter, HttpError};
