use crate::config::{RetryConfig, RetryTrigger};
use crate::error::HttpError;
use crate::response::ResponseBody;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::{BodyExt, Full};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service, ServiceExt};

/// Upper bound on bytes drained from a response that is about to be retried
const RETRY_DRAIN_LIMIT: usize = 64 * 1024;

/// Tower layer that retries transient failures with a fixed delay
#[derive(Clone)]
pub struct RetryLayer {
    config: RetryConfig,
}

impl RetryLayer {
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }
}

impl<S> Layer<S> for RetryLayer {
    type Service = RetryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RetryService {
            inner,
            config: self.config.clone(),
        }
    }
}

/// Service that replays a request after connection failures and 5xx statuses
///
/// Retries on both `Err(HttpError)` and `Ok(Response)` based on status codes.
/// Once retries are exhausted the last outcome is returned as-is, so a
/// persistent 5xx surfaces as `Ok(Response)` for the caller to classify.
#[derive(Clone)]
pub struct RetryService<S> {
    inner: S,
    config: RetryConfig,
}

impl<S> Service<Request<Full<Bytes>>> for RetryService<S>
where
    S: Service<Request<Full<Bytes>>, Response = Response<ResponseBody>, Error = HttpError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
{
    type Response = S::Response;
    type Error = HttpError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Full<Bytes>>) -> Self::Future {
        // Swap so we consume the instance that was poll_ready'd,
        // leaving a fresh clone for the next poll_ready cycle.
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        let config = self.config.clone();

        let (parts, body) = req.into_parts();
        let http_version = parts.version;
        let extensions = parts.extensions.clone();

        Box::pin(async move {
            let method = parts.method.clone();
            let url_host = parts
                .uri
                .authority()
                .map_or_else(|| "unknown".to_owned(), ToString::to_string);

            for attempt in 0..=config.max_retries {
                let mut req = Request::from_parts(parts.clone(), body.clone());
                *req.version_mut() = http_version;
                *req.extensions_mut() = extensions.clone();

                let mut svc = inner.clone();
                svc.ready().await?;

                match svc.call(req).await {
                    Ok(resp) => {
                        let status = resp.status().as_u16();
                        let trigger = RetryTrigger::Status(status);
                        if !config.should_retry(trigger, attempt) {
                            return Ok(resp);
                        }

                        // Drain so the connection can be reused
                        if let Err(e) = drain_response_body(resp, RETRY_DRAIN_LIMIT).await {
                            tracing::debug!(
                                error = %e,
                                "failed to drain response body before retry"
                            );
                        }

                        tracing::debug!(
                            retry = attempt + 1,
                            max_retries = config.max_retries,
                            status,
                            method = %method,
                            host = %url_host,
                            delay_ms = config.delay.as_millis(),
                            "retrying request after server error"
                        );
                    }
                    Err(err) => {
                        let trigger = get_retry_trigger(&err);
                        if !config.should_retry(trigger, attempt) {
                            return Err(err);
                        }

                        tracing::debug!(
                            retry = attempt + 1,
                            max_retries = config.max_retries,
                            error = %err,
                            trigger = ?trigger,
                            method = %method,
                            host = %url_host,
                            delay_ms = config.delay.as_millis(),
                            "retrying request after error"
                        );
                    }
                }

                tokio::time::sleep(config.delay).await;
            }

            Err(HttpError::NoResponse)
        })
    }
}

/// Drain response body up to `limit` bytes to allow connection reuse.
///
/// HTTP/1.1 connections return to the pool only after the body is consumed.
/// Larger bodies are abandoned and the retry opens a new connection.
async fn drain_response_body(
    response: Response<ResponseBody>,
    limit: usize,
) -> Result<(), HttpError> {
    let (_parts, body) = response.into_parts();
    let mut body = std::pin::pin!(body);
    let mut drained = 0usize;

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(HttpError::Transport)?;
        if let Some(chunk) = frame.data_ref() {
            drained += chunk.len();
            if drained >= limit {
                break;
            }
        }
    }

    Ok(())
}

fn get_retry_trigger(err: &HttpError) -> RetryTrigger {
    match err {
        HttpError::Transport(_) => RetryTrigger::TransportError,
        HttpError::Timeout(_) => RetryTrigger::Timeout,
        _ => RetryTrigger::NonRetryable,
    }
}
