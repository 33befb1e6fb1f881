use crate::counter::CompressionCounter;
use crate::headers::COMPRESSION_COUNT_HEADER;
use http::{HeaderMap, Request, Response};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Tower layer that records `compression-count` from every response
///
/// Sits below the retry layer, so responses that are drained and retried
/// still update the counter.
#[derive(Clone)]
pub struct CompressionCountLayer {
    counter: CompressionCounter,
}

impl CompressionCountLayer {
    #[must_use]
    pub fn new(counter: CompressionCounter) -> Self {
        Self { counter }
    }
}

impl<S> Layer<S> for CompressionCountLayer {
    type Service = CompressionCountService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CompressionCountService {
            inner,
            counter: self.counter.clone(),
        }
    }
}

#[derive(Clone)]
pub struct CompressionCountService<S> {
    inner: S,
    counter: CompressionCounter,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for CompressionCountService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let counter = self.counter.clone();
        let future = self.inner.call(req);
        Box::pin(async move {
            let response = future.await?;
            if let Some(count) = compression_count(response.headers()) {
                counter.set(count);
            }
            Ok(response)
        })
    }
}

/// Numeric `compression-count`; a missing or malformed value is ignored
fn compression_count(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(COMPRESSION_COUNT_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::error::HttpError;
    use crate::layers::RetryLayer;
    use crate::response::ResponseBody;
    use bytes::Bytes;
    use http::StatusCode;
    use http_body_util::{BodyExt, Full};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tower::{ServiceBuilder, ServiceExt};

    /// Answers the first call with 503 and `compression-count: 10`, then 200
    /// without the header.
    #[derive(Clone, Default)]
    struct FlakyShrink {
        calls: Arc<AtomicUsize>,
    }

    impl Service<Request<Full<Bytes>>> for FlakyShrink {
        type Response = Response<ResponseBody>;
        type Error = HttpError;
        type Future = std::future::Ready<Result<Self::Response, Self::Error>>;

        fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _req: Request<Full<Bytes>>) -> Self::Future {
            let mut builder = Response::builder();
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                builder = builder
                    .status(StatusCode::SERVICE_UNAVAILABLE)
                    .header(COMPRESSION_COUNT_HEADER, "10");
            }
            let body = Full::new(Bytes::from_static(b"{}"))
                .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> { Box::new(e) })
                .boxed();
            std::future::ready(Ok(builder.body(body).unwrap()))
        }
    }

    fn request() -> Request<Full<Bytes>> {
        Request::builder()
            .method("POST")
            .uri("https://tinypng.com/web/shrink")
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_count_from_retried_response_is_kept() {
        let counter = CompressionCounter::new();
        let stub = FlakyShrink::default();
        let service = ServiceBuilder::new()
            .layer(RetryLayer::new(RetryConfig {
                max_retries: 1,
                delay: Duration::from_millis(500),
            }))
            .layer(CompressionCountLayer::new(counter.clone()))
            .service(stub.clone());

        let response = service.oneshot(request()).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
        assert_eq!(counter.get(), 10);
    }

    #[test]
    fn test_malformed_count_ignored() {
        let mut headers = HeaderMap::new();
        assert_eq!(compression_count(&headers), None);

        headers.insert(COMPRESSION_COUNT_HEADER, "many".parse().unwrap());
        assert_eq!(compression_count(&headers), None);

        headers.insert(COMPRESSION_COUNT_HEADER, " 77 ".parse().unwrap());
        assert_eq!(compression_count(&headers), Some(77));
    }
}
