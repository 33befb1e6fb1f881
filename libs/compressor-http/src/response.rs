use crate::error::HttpError;
use crate::headers::Headers;
use bytes::Bytes;
use http::Response;
use http_body_util::BodyExt;

/// Type-erased response body produced by the service stack
pub type ResponseBody =
    http_body_util::combinators::BoxBody<Bytes, Box<dyn std::error::Error + Send + Sync>>;

/// Fully buffered successful response
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Bytes,
    pub headers: Headers,
    /// `compression-count` reported with this response, if any
    pub compression_count: Option<u64>,
}

impl ApiResponse {
    #[must_use]
    pub fn new(status: u16, body: Bytes, headers: Headers) -> Self {
        let compression_count = headers.compression_count();
        Self {
            status,
            body,
            headers,
            compression_count,
        }
    }

    /// Where the compressed output can be fetched
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.headers.location()
    }

    /// Decode the body as JSON
    ///
    /// # Errors
    /// Returns `HttpError::Json` if the body is not valid JSON for `T`
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, HttpError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Read the whole body, failing once more than `limit` bytes arrive.
///
/// # Errors
/// Returns `HttpError::BodyTooLarge` past the limit, or `HttpError::Transport`
/// if the body stream fails
pub async fn read_body_limited(
    response: Response<ResponseBody>,
    limit: usize,
) -> Result<Bytes, HttpError> {
    let (_parts, body) = response.into_parts();

    let mut collected = Vec::new();
    let mut body = std::pin::pin!(body);

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(HttpError::Transport)?;
        if let Some(chunk) = frame.data_ref() {
            if collected.len() + chunk.len() > limit {
                return Err(HttpError::BodyTooLarge {
                    limit,
                    actual: collected.len() + chunk.len(),
                });
            }
            collected.extend_from_slice(chunk);
        }
    }

    Ok(Bytes::from(collected))
}
