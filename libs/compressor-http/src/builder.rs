use crate::client::{InnerService, Transport};
use crate::config::{RetryConfig, TlsRootConfig, TransportConfig, TransportSecurity};
use crate::counter::CompressionCounter;
use crate::error::HttpError;
use crate::layers::{CompressionCountLayer, DefaultHeadersLayer, RetryLayer};
use crate::response::ResponseBody;
use crate::tls;
use bytes::Bytes;
use http::Response;
use http_body_util::{BodyExt, Full};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tower::timeout::TimeoutLayer;
use tower::util::BoxCloneSyncService;
use tower::{ServiceBuilder, ServiceExt};

/// Builder for constructing a [`Transport`] with a layered tower middleware stack.
pub struct TransportBuilder {
    config: TransportConfig,
    counter: CompressionCounter,
}

impl TransportBuilder {
    /// Create a new builder with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(TransportConfig::default())
    }

    /// Create a builder with a specific configuration
    #[must_use]
    pub fn with_config(config: TransportConfig) -> Self {
        Self {
            config,
            counter: CompressionCounter::new(),
        }
    }

    /// Set the per-attempt timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the User-Agent header
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the retry policy (`None` disables retries)
    #[must_use]
    pub fn retry(mut self, retry: Option<RetryConfig>) -> Self {
        self.config.retry = retry;
        self
    }

    /// Set the maximum response body size
    #[must_use]
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    /// Set transport security mode
    #[must_use]
    pub fn transport(mut self, transport: TransportSecurity) -> Self {
        self.config.transport = transport;
        self
    }

    /// Allow insecure HTTP connections (for testing with mock servers)
    ///
    /// Only available in debug builds or with the `allow-insecure-http` feature.
    #[cfg(any(debug_assertions, feature = "allow-insecure-http"))]
    #[must_use]
    pub fn allow_insecure_http(mut self) -> Self {
        tracing::warn!(
            "allow_insecure_http() called: HTTP traffic is not encrypted; \
             use only for testing with mock servers"
        );
        self.config.transport = TransportSecurity::AllowInsecureHttp;
        self
    }

    /// Set the trust store for default-profile requests
    #[must_use]
    pub fn tls_roots(mut self, roots: TlsRootConfig) -> Self {
        self.config.tls_roots = roots;
        self
    }

    /// Set the CA bundle used by pinned-profile requests
    #[must_use]
    pub fn ca_bundle(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.ca_bundle = Some(path.into());
        self
    }

    #[must_use]
    pub fn pool_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.pool_idle_timeout = timeout;
        self
    }

    #[must_use]
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.config.pool_max_idle_per_host = max;
        self
    }

    /// Share an existing compression counter with the transport
    #[must_use]
    pub fn counter(mut self, counter: CompressionCounter) -> Self {
        self.counter = counter;
        self
    }

    /// Build the transport
    ///
    /// # Errors
    /// Returns an error if TLS initialization fails, the CA bundle cannot be
    /// loaded, or the User-Agent is not a valid header value
    pub fn build(self) -> Result<Transport, HttpError> {
        if self.config.transport == TransportSecurity::AllowInsecureHttp {
            tracing::warn!(
                "insecure HTTP enabled (TransportSecurity::AllowInsecureHttp); \
                 use only for testing with mock servers"
            );
        }

        let default_roots = match self.config.tls_roots {
            TlsRootConfig::WebPki => TrustRoots::WebPki,
            TlsRootConfig::Native => TrustRoots::Native,
        };
        let default_service = build_service(
            build_https_connector(default_roots, self.config.transport)?,
            &self.config,
            &self.counter,
        )?;

        let pinned_service = match &self.config.ca_bundle {
            Some(path) => {
                let connector =
                    build_https_connector(TrustRoots::Bundle(path), self.config.transport)?;
                Some(build_service(connector, &self.config, &self.counter)?)
            }
            None => None,
        };

        Ok(Transport {
            default_service,
            pinned_service,
            max_body_size: self.config.max_body_size,
            transport_security: self.config.transport,
            counter: self.counter,
        })
    }
}

impl Default for TransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Assemble the middleware stack over one connector.
///
/// Request flow (outer to inner):
///   Retry → `CompressionCount` → `ErrorMapping` → Timeout → `DefaultHeaders` → `hyper_client`
///
/// Each attempt gets its own timeout. The retry layer sees 5xx responses as
/// `Ok(Response)` and hands the last one back once retries are exhausted.
fn build_service(
    connector: HttpsConnector<HttpConnector>,
    config: &TransportConfig,
    counter: &CompressionCounter,
) -> Result<InnerService, HttpError> {
    let timeout = config.request_timeout;

    let mut client_builder = Client::builder(TokioExecutor::new());
    // pool_timer is required for pool_idle_timeout to take effect
    client_builder
        .pool_timer(TokioTimer::new())
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .http2_only(false);
    if let Some(idle_timeout) = config.pool_idle_timeout {
        client_builder.pool_idle_timeout(idle_timeout);
    }
    let hyper_client = client_builder.build::<_, Full<Bytes>>(connector);

    let headers_layer = DefaultHeadersLayer::with_user_agent(&config.user_agent)?;

    let service = ServiceBuilder::new()
        .layer(TimeoutLayer::new(timeout))
        .layer(headers_layer)
        .service(hyper_client)
        .map_response(box_response_body)
        .map_err(move |e: tower::BoxError| map_tower_error(e, timeout));

    let boxed = BoxCloneSyncService::new(
        ServiceBuilder::new()
            .layer(CompressionCountLayer::new(counter.clone()))
            .service(service),
    );

    Ok(match &config.retry {
        Some(retry) => BoxCloneSyncService::new(
            ServiceBuilder::new()
                .layer(RetryLayer::new(retry.clone()))
                .service(boxed),
        ),
        None => boxed,
    })
}

/// Map tower errors to `HttpError` with actual timeout duration
///
/// An `HttpError` boxed by a middleware is unwrapped rather than re-wrapped
/// as `Transport`.
fn map_tower_error(err: tower::BoxError, timeout: Duration) -> HttpError {
    if err.is::<tower::timeout::error::Elapsed>() {
        return HttpError::Timeout(timeout);
    }

    match err.downcast::<HttpError>() {
        Ok(http_err) => *http_err,
        Err(other) => HttpError::Transport(other),
    }
}

fn box_response_body<B>(response: Response<B>) -> Response<ResponseBody>
where
    B: hyper::body::Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = response.into_parts();
    let boxed_body: ResponseBody = body.map_err(Into::into).boxed();
    Response::from_parts(parts, boxed_body)
}

/// Trust store for one connector
enum TrustRoots<'a> {
    WebPki,
    Native,
    Bundle(&'a Path),
}

/// Build the HTTPS connector for the given trust store.
///
/// HTTP/2 is negotiated via ALPN (`enable_all_versions()`).
///
/// # Errors
///
/// Returns `HttpError::Tls` if no usable root certificates can be loaded.
fn build_https_connector(
    roots: TrustRoots<'_>,
    transport: TransportSecurity,
) -> Result<HttpsConnector<HttpConnector>, HttpError> {
    let builder = match roots {
        TrustRoots::WebPki => HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(tls::get_crypto_provider())
            .map_err(|e| HttpError::Tls(Box::new(e)))?,
        TrustRoots::Native => {
            let client_config =
                tls::native_roots_client_config().map_err(|e| HttpError::Tls(e.into()))?;
            HttpsConnectorBuilder::new().with_tls_config(client_config)
        }
        TrustRoots::Bundle(path) => {
            let client_config =
                tls::ca_bundle_client_config(path).map_err(|e| HttpError::Tls(e.into()))?;
            HttpsConnectorBuilder::new().with_tls_config(client_config)
        }
    };

    let connector = if transport == TransportSecurity::AllowInsecureHttp {
        builder.https_or_http().enable_all_versions().build()
    } else {
        builder.https_only().enable_all_versions().build()
    };
    Ok(connector)
}
