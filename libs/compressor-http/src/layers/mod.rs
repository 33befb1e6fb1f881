//! Tower layers for the transport middleware stack
//!
//! - [`DefaultHeadersLayer`] - Adds User-Agent and other default headers
//! - [`RetryLayer`] - Retries connection failures and 5xx with a fixed delay
//! - [`CompressionCountLayer`] - Records `compression-count` from every attempt

mod count;
mod headers;
mod retry;

pub use count::{CompressionCountLayer, CompressionCountService};
pub use headers::{DefaultHeadersLayer, DefaultHeadersService};
pub use retry::{RetryLayer, RetryService};
