use crate::builder::TransportBuilder;
use crate::config::TransportSecurity;
use crate::counter::CompressionCounter;
use crate::error::{ErrorDetail, HttpError};
use crate::headers::parse_headers;
use crate::request::{RequestBody, RequestOptions, TlsProfile, build_request, resolve_url};
use crate::response::{ApiResponse, ResponseBody, read_body_limited};
use bytes::Bytes;
use http::{Method, Request, Response};
use http_body_util::Full;
use std::future::Future;
use tower::util::BoxCloneSyncService;
use tower::{Service, ServiceExt};

/// Type-erased service stack behind a [`Transport`]
pub type InnerService =
    BoxCloneSyncService<Request<Full<Bytes>>, Response<ResponseBody>, HttpError>;

/// Retrying HTTP transport for the compression services
///
/// Cheap to clone and safe to share across tasks. All per-call state lives
/// in [`RequestOptions`]; the only shared mutable state is the
/// [`CompressionCounter`].
///
/// # Example
///
/// ```ignore
/// use compressor_http::{RequestBody, RequestOptions, Transport, WEB_ENDPOINT};
///
/// let transport = Transport::builder().build()?;
/// let response = transport
///     .request(
///         Method::POST,
///         "/shrink",
///         RequestBody::Raw(png_bytes),
///         &RequestOptions::new(WEB_ENDPOINT),
///     )
///     .await?;
/// let output = response.location();
/// ```
#[derive(Clone)]
pub struct Transport {
    pub(crate) default_service: InnerService,
    pub(crate) pinned_service: Option<InnerService>,
    pub(crate) max_body_size: usize,
    pub(crate) transport_security: TransportSecurity,
    pub(crate) counter: CompressionCounter,
}

impl Transport {
    /// Create a transport with default configuration
    ///
    /// # Errors
    /// Returns an error if TLS initialization fails
    pub fn new() -> Result<Self, HttpError> {
        TransportBuilder::new().build()
    }

    #[must_use]
    pub fn builder() -> TransportBuilder {
        TransportBuilder::new()
    }

    /// Counter updated from `compression-count` response headers
    #[must_use]
    pub fn counter(&self) -> &CompressionCounter {
        &self.counter
    }

    /// Send one request, retrying transient failures.
    ///
    /// `target` is resolved against `options.base_url` unless it is already
    /// absolute. A 2xx response is buffered and returned; any other status
    /// is decoded into [`HttpError::Remote`].
    ///
    /// # Errors
    ///
    /// - [`HttpError::Remote`] for non-2xx responses
    /// - [`HttpError::Transport`] or [`HttpError::Timeout`] once retries are exhausted
    /// - [`HttpError::DeadlineExceeded`] if `options.timeout` elapses
    /// - [`HttpError::Cancelled`] if `options.cancel` fires
    /// - [`HttpError::InvalidUri`] / [`HttpError::InvalidScheme`] for unusable targets
    /// - [`HttpError::BodyTooLarge`] if the body exceeds the configured limit
    #[tracing::instrument(
        name = "transport.request",
        skip_all,
        fields(method = %method, target = %target, tls = ?options.tls)
    )]
    pub async fn request(
        &self,
        method: Method,
        target: &str,
        body: RequestBody,
        options: &RequestOptions,
    ) -> Result<ApiResponse, HttpError> {
        let url = resolve_url(&options.base_url, target, self.transport_security);
        let request = build_request(
            method,
            &url,
            body,
            options.credentials.as_ref(),
            self.transport_security,
        )?;

        let exchange = self.exchange(self.service_for(options.tls), request);
        let exchange = async {
            match options.timeout {
                Some(deadline) => tokio::time::timeout(deadline, exchange)
                    .await
                    .map_err(|_elapsed| HttpError::DeadlineExceeded(deadline))?,
                None => exchange.await,
            }
        };

        match &options.cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    () = token.cancelled() => Err(HttpError::Cancelled),
                    result = exchange => result,
                }
            }
            None => exchange.await,
        }
    }

    fn service_for(&self, profile: TlsProfile) -> InnerService {
        match (profile, &self.pinned_service) {
            (TlsProfile::Pinned, Some(pinned)) => pinned.clone(),
            (TlsProfile::Pinned, None) => {
                tracing::debug!("no CA bundle configured; pinned request uses default roots");
                self.default_service.clone()
            }
            (TlsProfile::Default, _) => self.default_service.clone(),
        }
    }

    fn exchange(
        &self,
        mut service: InnerService,
        request: Request<Full<Bytes>>,
    ) -> impl Future<Output = Result<ApiResponse, HttpError>> + Send + 'static {
        let max_body_size = self.max_body_size;

        async move {
            let response = service.ready().await?.call(request).await?;

            let status = response.status().as_u16();
            // The count layer has already recorded `compression-count`
            let headers = parse_headers(response.headers());

            let body = read_body_limited(response, max_body_size).await?;

            if (200..300).contains(&status) {
                tracing::debug!(status, bytes = body.len(), "request succeeded");
                Ok(ApiResponse::new(status, body, headers))
            } else {
                let err = HttpError::remote(status, ErrorDetail::from_body(&body));
                tracing::debug!(status, error = %err, "remote service rejected request");
                Err(err)
            }
        }
    }
}
