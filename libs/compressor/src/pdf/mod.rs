//! PDF compression through a remote service.

mod ilovepdf;
mod multipart;

pub use ilovepdf::{ILovePdfService, PdfCredentials};
pub use multipart::{MultipartForm, MultipartPart};

use crate::error::CompressorError;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How hard the PDF service should squeeze the document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    Low,
    #[default]
    Recommended,
    Extreme,
}

impl CompressionLevel {
    /// Unknown values fall back to [`CompressionLevel::Recommended`]
    #[must_use]
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Self::Low,
            "extreme" => Self::Extreme,
            _ => Self::Recommended,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Recommended => "recommended",
            Self::Extreme => "extreme",
        }
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remote service that compresses a single PDF document
#[async_trait]
pub trait PdfService: Send + Sync {
    /// Compress `data` (uploaded under `file_name`) and return the result.
    ///
    /// # Errors
    /// Returns [`CompressorError::Http`] on transport or service failures and
    /// [`CompressorError::Pdf`] if the service answers with an unusable payload.
    async fn compress(
        &self,
        file_name: &str,
        data: Bytes,
        level: CompressionLevel,
    ) -> Result<Bytes, CompressorError>;
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_level_parsing() {
        assert_eq!(CompressionLevel::parse_lenient("low"), CompressionLevel::Low);
        assert_eq!(CompressionLevel::parse_lenient(" EXTREME "), CompressionLevel::Extreme);
        assert_eq!(
            CompressionLevel::parse_lenient("recommended"),
            CompressionLevel::Recommended
        );
        assert_eq!(CompressionLevel::parse_lenient("ultra"), CompressionLevel::Recommended);
        assert_eq!(CompressionLevel::parse_lenient(""), CompressionLevel::Recommended);
    }

    #[test]
    fn test_level_wire_names() {
        assert_eq!(CompressionLevel::Low.to_string(), "low");
        assert_eq!(
            serde_json::to_value(CompressionLevel::Extreme).unwrap(),
            serde_json::json!("extreme")
        );
    }
}
