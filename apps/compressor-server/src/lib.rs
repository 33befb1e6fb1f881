#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! HTTP upload endpoint for the file compressor

pub mod api;
pub mod config;
pub mod logging;
pub mod signals;

pub use api::{AppState, CompressResponse, router};
pub use config::{AppConfig, CliOverrides, LoggingConfig, ServerConfig};
