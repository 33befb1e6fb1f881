use crate::config::TransportSecurity;
use crate::error::HttpError;
use base64::Engine;
use base64::engine::general_purpose;
use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderValue, Method, Request};
use http_body_util::Full;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use zeroize::Zeroizing;

/// Request payload
#[derive(Clone, Debug, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Raw bytes, sent as-is without a content type
    Raw(Bytes),
    /// Serialized JSON record, sent with `Content-Type: application/json`
    Json(Bytes),
    /// Pre-encoded payload with an explicit content type
    Encoded { content_type: String, data: Bytes },
}

impl RequestBody {
    /// Serialize a record as a JSON body
    ///
    /// # Errors
    /// Returns `HttpError::Json` if serialization fails
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, HttpError> {
        Ok(Self::Json(Bytes::from(serde_json::to_vec(value)?)))
    }

    /// Size of the encoded payload in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Raw(data) | Self::Json(data) | Self::Encoded { data, .. } => data.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn content_type(&self) -> Option<&str> {
        match self {
            Self::Json(_) => Some("application/json"),
            Self::Encoded { content_type, .. } => Some(content_type),
            Self::Empty | Self::Raw(_) => None,
        }
    }

    fn into_bytes(self) -> Bytes {
        match self {
            Self::Empty => Bytes::new(),
            Self::Raw(data) | Self::Json(data) | Self::Encoded { data, .. } => data,
        }
    }
}

/// Credentials attached to a single request
#[derive(Clone)]
pub enum Credentials {
    /// `Authorization: Basic base64(user:password)`
    Basic {
        user: String,
        password: Zeroizing<String>,
    },
    /// `Authorization: Bearer <token>`
    Bearer(Zeroizing<String>),
}

impl Credentials {
    #[must_use]
    pub fn basic(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            user: user.into(),
            password: Zeroizing::new(password.into()),
        }
    }

    #[must_use]
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer(Zeroizing::new(token.into()))
    }

    /// Render the `Authorization` header value
    ///
    /// # Errors
    /// Returns `HttpError::InvalidHeaderValue` if the encoded value is not a valid header
    pub fn header_value(&self) -> Result<HeaderValue, HttpError> {
        // Intermediates are scrubbed on drop
        let rendered = match self {
            Self::Basic { user, password } => {
                let pair = Zeroizing::new(format!("{user}:{}", password.as_str()));
                let encoded = Zeroizing::new(general_purpose::STANDARD.encode(pair.as_bytes()));
                Zeroizing::new(format!("Basic {}", encoded.as_str()))
            }
            Self::Bearer(token) => Zeroizing::new(format!("Bearer {}", token.as_str())),
        };
        let mut value = HeaderValue::from_str(&rendered)?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic { user, .. } => f
                .debug_struct("Basic")
                .field("user", user)
                .field("password", &"[REDACTED]")
                .finish(),
            Self::Bearer(_) => f.debug_tuple("Bearer").field(&"[REDACTED]").finish(),
        }
    }
}

/// Trust store used for a request's TLS handshake
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TlsProfile {
    /// Platform or webpki roots, per [`TlsRootConfig`](crate::TlsRootConfig)
    #[default]
    Default,
    /// Only the configured CA bundle
    Pinned,
}

/// Immutable per-call options
///
/// Built fresh for every request so nothing set for one call can leak into
/// the next.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Base endpoint prefixed to relative targets
    pub base_url: String,
    pub credentials: Option<Credentials>,
    pub tls: TlsProfile,
    /// Deadline for the whole call, retries included
    pub timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

impl RequestOptions {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    #[must_use]
    pub fn tls(mut self, tls: TlsProfile) -> Self {
        self.tls = tls;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

fn has_scheme_prefix(url: &str, scheme: &str) -> bool {
    url.get(..scheme.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
}

/// Resolve a request target against the base endpoint.
///
/// Targets starting with `https:` are used verbatim; with insecure HTTP
/// allowed, so are `http:` targets. Anything else is appended to `base`.
#[must_use]
pub fn resolve_url(base: &str, target: &str, transport: TransportSecurity) -> String {
    let absolute = has_scheme_prefix(target, "https:")
        || (transport == TransportSecurity::AllowInsecureHttp
            && has_scheme_prefix(target, "http:"));
    if absolute {
        target.to_owned()
    } else {
        format!("{base}{target}")
    }
}

/// Parse a resolved URL and check its scheme against the transport mode.
fn validate_url(url: &str, transport: TransportSecurity) -> Result<http::Uri, HttpError> {
    let uri: http::Uri = url.parse().map_err(|e: http::uri::InvalidUri| HttpError::InvalidUri {
        url: url.to_owned(),
        reason: e.to_string(),
    })?;

    if uri.authority().is_none() {
        return Err(HttpError::InvalidUri {
            url: url.to_owned(),
            reason: "missing host/authority".to_owned(),
        });
    }

    match uri.scheme_str() {
        Some("https") => Ok(uri),
        Some("http") => match transport {
            TransportSecurity::AllowInsecureHttp => Ok(uri),
            TransportSecurity::TlsOnly => Err(HttpError::InvalidScheme {
                scheme: "http".to_owned(),
                reason: "HTTPS required (transport security is TlsOnly)".to_owned(),
            }),
        },
        Some(scheme) => Err(HttpError::InvalidScheme {
            scheme: scheme.to_owned(),
            reason: "only http:// and https:// schemes are supported".to_owned(),
        }),
        None => Err(HttpError::InvalidUri {
            url: url.to_owned(),
            reason: "missing scheme".to_owned(),
        }),
    }
}

/// Assemble the outbound request for one call.
///
/// # Errors
/// Returns an error if the URL is invalid for the transport mode or a header
/// value cannot be encoded
pub fn build_request(
    method: Method,
    url: &str,
    body: RequestBody,
    credentials: Option<&Credentials>,
    transport: TransportSecurity,
) -> Result<Request<Full<Bytes>>, HttpError> {
    let uri = validate_url(url, transport)?;
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(content_type) = body.content_type() {
        builder = builder.header(CONTENT_TYPE, HeaderValue::from_str(content_type)?);
    }
    if let Some(credentials) = credentials {
        builder = builder.header(AUTHORIZATION, credentials.header_value()?);
    }

    Ok(builder.body(Full::new(body.into_bytes()))?)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use serde_json::json;

    #[test]
    fn test_resolve_relative_target() {
        assert_eq!(
            resolve_url("https://tinypng.com/web", "/shrink", TransportSecurity::TlsOnly),
            "https://tinypng.com/web/shrink"
        );
    }

    #[test]
    fn test_resolve_absolute_https_target() {
        let target = "https://api.tinify.com/output/abc";
        assert_eq!(
            resolve_url("https://tinypng.com/web", target, TransportSecurity::TlsOnly),
            target
        );
        assert_eq!(
            resolve_url("https://x", "HTTPS://Example.com/a", TransportSecurity::TlsOnly),
            "HTTPS://Example.com/a"
        );
    }

    #[test]
    fn test_resolve_http_target_depends_on_transport() {
        let target = "http://127.0.0.1:9000/output";
        assert_eq!(
            resolve_url("https://base", target, TransportSecurity::TlsOnly),
            format!("https://base{target}")
        );
        assert_eq!(
            resolve_url("https://base", target, TransportSecurity::AllowInsecureHttp),
            target
        );
    }

    #[test]
    fn test_basic_credentials_header() {
        let value = Credentials::basic("api", "secret-key").header_value().unwrap();
        let expected = format!(
            "Basic {}",
            general_purpose::STANDARD.encode("api:secret-key")
        );
        assert_eq!(value.to_str().unwrap(), expected);
        assert!(value.is_sensitive());
    }

    #[test]
    fn test_bearer_credentials_header() {
        let value = Credentials::bearer("tok").header_value().unwrap();
        assert_eq!(value.to_str().unwrap(), "Bearer tok");
    }

    #[test]
    fn test_credentials_debug_redacted() {
        let debug = format!("{:?}", Credentials::basic("api", "secret-key"));
        assert!(debug.contains("api"));
        assert!(!debug.contains("secret-key"));

        let debug = format!("{:?}", Credentials::bearer("tok-123"));
        assert!(!debug.contains("tok-123"));
    }

    #[test]
    fn test_options_default_is_anonymous() {
        let options = RequestOptions::new("https://tinypng.com/web");
        assert!(options.credentials.is_none());
        assert_eq!(options.tls, TlsProfile::Default);
        assert!(options.timeout.is_none());
        assert!(options.cancel.is_none());
    }

    #[tokio::test]
    async fn test_build_request_json_body() {
        let body = RequestBody::json(&json!({"source": {"url": "https://x/y.png"}})).unwrap();
        let req = build_request(
            Method::POST,
            "https://tinypng.com/web/shrink",
            body,
            None,
            TransportSecurity::TlsOnly,
        )
        .unwrap();

        assert_eq!(req.headers()[CONTENT_TYPE], "application/json");
        assert!(req.headers().get(AUTHORIZATION).is_none());
        let bytes = req.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes.as_ref(), br#"{"source":{"url":"https://x/y.png"}}"#);
    }

    #[test]
    fn test_build_request_raw_body_has_no_content_type() {
        let req = build_request(
            Method::POST,
            "https://api.tinify.com/shrink",
            RequestBody::Raw(Bytes::from_static(b"\x89PNG")),
            Some(&Credentials::basic("api", "k")),
            TransportSecurity::TlsOnly,
        )
        .unwrap();

        assert!(req.headers().get(CONTENT_TYPE).is_none());
        assert!(req.headers().get(AUTHORIZATION).is_some());
    }

    #[test]
    fn test_build_request_encoded_body() {
        let body = RequestBody::Encoded {
            content_type: "multipart/form-data; boundary=abc".to_owned(),
            data: Bytes::from_static(b"--abc--\r\n"),
        };
        assert_eq!(body.len(), 9);

        let req = build_request(
            Method::POST,
            "https://api.ilovepdf.com/v1/upload",
            body,
            None,
            TransportSecurity::TlsOnly,
        )
        .unwrap();
        assert_eq!(
            req.headers()[CONTENT_TYPE],
            "multipart/form-data; boundary=abc"
        );
    }

    #[test]
    fn test_http_rejected_with_tls_only() {
        let err = build_request(
            Method::GET,
            "http://example.com/test",
            RequestBody::Empty,
            None,
            TransportSecurity::TlsOnly,
        )
        .unwrap_err();

        match err {
            HttpError::InvalidScheme { scheme, reason } => {
                assert_eq!(scheme, "http");
                assert!(reason.contains("TlsOnly"));
            }
            other => panic!("Expected InvalidScheme error, got: {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_scheme_rejected() {
        let err = build_request(
            Method::GET,
            "ftp://files.example.com/file.txt",
            RequestBody::Empty,
            None,
            TransportSecurity::AllowInsecureHttp,
        )
        .unwrap_err();
        assert!(matches!(err, HttpError::InvalidScheme { scheme, .. } if scheme == "ftp"));
    }

    #[test]
    fn test_relative_url_rejected() {
        let err = build_request(
            Method::GET,
            "example.com/test",
            RequestBody::Empty,
            None,
            TransportSecurity::AllowInsecureHttp,
        )
        .unwrap_err();
        assert!(matches!(err, HttpError::InvalidUri { .. }));
    }
}
