//! Signed request verification
//!
//! Callers sign `METHOD\npath\nbody\ntimestamp` with the shared secret and
//! send the hex digest in `X-Signature` (optionally prefixed `sha256=`) and
//! the unix timestamp in `X-Timestamp`. Requests with a missing, stale or
//! mismatching signature never reach the handler.

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use application::RequestSigner;
use axum::{
    body::{Body, to_bytes},
    extract::Request,
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use tower::{Layer, Service};
use tracing::warn;

use super::security::RawBody;
use crate::error::ApiError;

/// Header carrying the hex HMAC
pub const X_SIGNATURE: &str = "x-signature";

/// Header carrying the signing timestamp (unix seconds)
pub const X_TIMESTAMP: &str = "x-timestamp";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Layer applying [`SignatureVerification`]
#[derive(Clone, Debug)]
pub struct SignatureVerificationLayer {
    signer: Arc<RequestSigner>,
    max_body_bytes: usize,
}

impl SignatureVerificationLayer {
    /// Create the layer
    #[must_use]
    pub const fn new(signer: Arc<RequestSigner>, max_body_bytes: usize) -> Self {
        Self {
            signer,
            max_body_bytes,
        }
    }
}

impl<S> Layer<S> for SignatureVerificationLayer {
    type Service = SignatureVerification<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SignatureVerification {
            inner,
            signer: Arc::clone(&self.signer),
            max_body_bytes: self.max_body_bytes,
        }
    }
}

/// Signature verification service
#[derive(Clone, Debug)]
pub struct SignatureVerification<S> {
    inner: S,
    signer: Arc<RequestSigner>,
    max_body_bytes: usize,
}

impl<S> Service<Request> for SignatureVerification<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let signer = Arc::clone(&self.signer);
        let limit = self.max_body_bytes;
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let (parts, body) = req.into_parts();

            let signature = header_str(&parts.headers, X_SIGNATURE).map(str::to_owned);
            let timestamp = header_str(&parts.headers, X_TIMESTAMP)
                .and_then(|t| t.trim().parse::<i64>().ok());
            let (Some(signature), Some(timestamp)) = (signature, timestamp) else {
                warn!(path = %parts.uri.path(), "Missing or unreadable signature headers");
                return Ok(
                    ApiError::SignatureInvalid("missing signature headers".to_string())
                        .into_response(),
                );
            };

            let Ok(bytes) = to_bytes(body, limit).await else {
                return Ok(ApiError::PayloadTooLarge { limit }.into_response());
            };

            let signed = parts
                .extensions
                .get::<RawBody>()
                .map_or(&bytes, |raw| &raw.0);
            if let Err(e) = signer.verify(
                parts.method.as_str(),
                parts.uri.path(),
                signed,
                timestamp,
                &signature,
            ) {
                warn!(path = %parts.uri.path(), error = %e, "Rejected signed request");
                return Ok(ApiError::from(e).into_response());
            }

            inner.call(Request::from_parts(parts, Body::from(bytes))).await
        })
    }
}
