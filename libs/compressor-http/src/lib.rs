#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Retrying HTTP transport for remote compression services
//!
//! This crate provides a hyper-based transport with:
//! - TLS via rustls (HTTPS only by default), with an optional pinned CA bundle
//! - Per-call immutable options: base endpoint, credentials, trust profile,
//!   deadline and cancellation
//! - One retry by default after a fixed 500 ms pause, on connection failures
//!   and 5xx responses, for every method
//! - Response header parsing and a shared `compression-count` counter
//! - A closed error taxonomy with a pure status to error-kind mapping
//!
//! # Example
//!
//! ```ignore
//! use compressor_http::{Credentials, RequestBody, RequestOptions, TlsProfile, Transport};
//!
//! let transport = Transport::builder().ca_bundle("/etc/compressor/cacert.pem").build()?;
//! let options = RequestOptions::new(compressor_http::API_ENDPOINT)
//!     .credentials(Credentials::basic("api", key))
//!     .tls(TlsProfile::Pinned);
//!
//! let response = transport
//!     .request(Method::POST, "/shrink", RequestBody::Raw(bytes), &options)
//!     .await?;
//! println!("count: {}", transport.counter().get());
//! ```

mod builder;
mod client;
mod config;
mod counter;
mod error;
mod headers;
mod layers;
mod request;
mod response;
mod tls;

pub use builder::TransportBuilder;
pub use client::Transport;
pub use config::{
    API_ENDPOINT, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY, DEFAULT_USER_AGENT, RetryConfig,
    RetryTrigger, TlsRootConfig, TransportConfig, TransportSecurity, WEB_ENDPOINT,
};
pub use counter::CompressionCounter;
pub use error::{BoxError, ErrorClass, ErrorDetail, HttpError, PARSE_ERROR_CODE, RemoteErrorKind};
pub use headers::{COMPRESSION_COUNT_HEADER, Headers, IntoHeaders, parse_headers};
pub use layers::{
    CompressionCountLayer, CompressionCountService, DefaultHeadersLayer, DefaultHeadersService,
    RetryLayer, RetryService,
};
pub use request::{Credentials, RequestBody, RequestOptions, TlsProfile, resolve_url};
pub use response::{ApiResponse, ResponseBody};

/// Re-exported so callers can build methods without depending on `http`
pub use http::Method;
