use compressor_http::HttpError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while compressing a file
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CompressorError {
    /// The named service needs a key that is not configured
    #[error("The key for {service} API is not installed")]
    EmptyKey { service: &'static str },

    #[error("File \"{}\" not found", .0.display())]
    FileNotFound(PathBuf),

    #[error("Mode compression not support")]
    ModeNotSupported(String),

    #[error("You must specify the path to the new file")]
    EmptyNewFile,

    /// No stored compression result to resolve
    #[error("Response not found")]
    ResponseNotFound,

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The PDF service answered with something unusable
    #[error("PDF service error: {0}")]
    Pdf(String),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),
}

impl From<figment::Error> for CompressorError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}
