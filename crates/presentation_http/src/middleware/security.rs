//! Request security middleware
//!
//! Runs every inbound request through the same fixed sequence:
//!
//! 1. Bypass check against the configured probe paths
//! 2. Rate limiting per client identity, strict quota on sensitive paths
//! 3. Body validation for POST, PUT, PATCH and DELETE
//! 4. Forwarding to the inner service
//! 5. Security and rate-limit response headers
//!
//! Rejections short-circuit with the JSON bodies rendered by [`ApiError`].
//!
//! # Example
//!
//! ```ignore
//! use presentation_http::middleware::{SecurityLayer, SecuritySettings};
//!
//! let settings = SecuritySettings::from_config(&config.security)?;
//! let app = Router::new()
//!     .route("/api/v1/claims", post(handler))
//!     .layer(SecurityLayer::new(settings, Some(limiter), validator));
//! ```

use std::{
    future::Future,
    net::IpAddr,
    panic::{AssertUnwindSafe, catch_unwind},
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use application::{ApplicationError, InputValidator, RateLimiter};
use axum::{
    body::{Body, Bytes, to_bytes},
    extract::Request,
    http::{HeaderMap, HeaderName, HeaderValue, Method, header},
    response::{IntoResponse, Response},
};
use domain::{RateLimitDecision, RateMode, ValidationResult};
use infrastructure::SecurityConfig;
use serde_json::Value;
use tower::{Layer, Service};
use tracing::{debug, error, warn};

use super::{client_identity::client_identity, path_matcher::PathMatcher};
use crate::error::ApiError;

/// Field path used when a non-JSON body is validated as one string
pub const RAW_BODY_FIELD: &str = "body";

const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";

/// Body bytes as received, kept when a sanitized body is forwarded instead
///
/// Signature verification must run over what the client actually sent.
#[derive(Debug, Clone)]
pub struct RawBody(pub Bytes);

/// Per-deployment settings of the security middleware
#[derive(Debug, Clone)]
pub struct SecuritySettings {
    /// Paths (and their sub-paths) that skip every check
    pub bypass_paths: Vec<String>,
    /// Paths that use the strict quota
    pub sensitive_paths: PathMatcher,
    /// Peers allowed to set `X-Forwarded-For`
    pub trusted_proxies: Vec<IpAddr>,
    /// Largest accepted request body
    pub max_body_bytes: usize,
    /// Forward the sanitized JSON instead of the original bytes
    pub forward_sanitized_body: bool,
    /// `Strict-Transport-Security` value
    pub hsts_policy: HeaderValue,
}

impl SecuritySettings {
    /// Build settings from configuration
    ///
    /// # Errors
    ///
    /// Returns [`ApplicationError::Configuration`] when a sensitive path
    /// pattern or the HSTS policy cannot be used.
    pub fn from_config(config: &SecurityConfig) -> Result<Self, ApplicationError> {
        let sensitive_paths =
            PathMatcher::new(&config.rate_limit.sensitive_path_patterns).map_err(|e| {
                ApplicationError::Configuration(format!("invalid sensitive path pattern: {e}"))
            })?;
        let hsts_policy = HeaderValue::from_str(&config.hsts_policy).map_err(|e| {
            ApplicationError::Configuration(format!("invalid HSTS policy: {e}"))
        })?;

        Ok(Self {
            bypass_paths: config.bypass_paths.clone(),
            sensitive_paths,
            trusted_proxies: config.trusted_proxies.clone(),
            max_body_bytes: config.max_body_bytes,
            forward_sanitized_body: config.forward_sanitized_body,
            hsts_policy,
        })
    }

    /// Whether `path` skips all checks
    #[must_use]
    pub fn is_bypassed(&self, path: &str) -> bool {
        self.bypass_paths
            .iter()
            .any(|prefix| path_has_prefix(path, prefix))
    }

    /// Rate mode for `path`
    #[must_use]
    pub fn mode_for(&self, path: &str) -> RateMode {
        if self.sensitive_paths.matches(path) {
            RateMode::Strict
        } else {
            RateMode::Standard
        }
    }
}

/// `path` equals `prefix` or lies below it on a segment boundary
fn path_has_prefix(path: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return false;
    }
    if prefix.ends_with('/') {
        return path.starts_with(prefix);
    }
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

fn is_mutating(method: &Method) -> bool {
    [Method::POST, Method::PUT, Method::PATCH, Method::DELETE].contains(method)
}

fn content_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

#[derive(Debug)]
struct SecurityState {
    settings: SecuritySettings,
    rate_limiter: Option<Arc<RateLimiter>>,
    validator: Arc<InputValidator>,
}

impl SecurityState {
    fn check_rate_limit(&self, req: &Request) -> Option<RateLimitDecision> {
        let limiter = self.rate_limiter.as_ref()?;
        let path = req.uri().path();
        let identity = client_identity(req, &self.settings.trusted_proxies);
        let mode = self.settings.mode_for(path);
        let decision = limiter.check_rate_limit(&identity, mode);

        if decision.allowed {
            debug!(client = %identity, mode = %mode, path, remaining = decision.remaining, "Request admitted");
        } else {
            warn!(
                client = %identity,
                mode = %mode,
                path,
                retry_after = decision.retry_after(),
                blocked = decision.blocked,
                "Rate limit exceeded"
            );
        }
        Some(decision)
    }

    async fn inspect_body(&self, req: Request) -> Result<Request, ApiError> {
        if !is_mutating(req.method()) {
            return Ok(req);
        }

        let limit = self.settings.max_body_bytes;
        let (mut parts, body) = req.into_parts();
        if content_length(&parts.headers).is_some_and(|len| len > limit) {
            warn!(path = %parts.uri.path(), limit, "Declared body length over limit");
            return Err(ApiError::PayloadTooLarge { limit });
        }

        let bytes = to_bytes(body, limit).await.map_err(|e| {
            warn!(path = %parts.uri.path(), limit, error = %e, "Request body rejected");
            ApiError::PayloadTooLarge { limit }
        })?;
        if bytes.is_empty() {
            return Ok(Request::from_parts(parts, Body::from(bytes)));
        }

        let parsed = serde_json::from_slice::<Value>(&bytes).ok();
        let result = self.validate(parsed.as_ref(), &bytes)?;
        if !result.is_valid() {
            warn!(
                path = %parts.uri.path(),
                categories = ?result.categories(),
                issues = result.errors.len(),
                "Request failed input validation"
            );
            return Err(ApiError::ValidationFailed(result.errors));
        }

        let body = match parsed {
            Some(value) if self.settings.forward_sanitized_body => {
                let sanitized = serde_json::to_vec(&self.validator.sanitize_structured(&value))
                    .map_err(|e| ApiError::Internal(e.to_string()))?;
                parts
                    .headers
                    .insert(header::CONTENT_LENGTH, HeaderValue::from(sanitized.len()));
                parts.extensions.insert(RawBody(bytes));
                Body::from(sanitized)
            },
            _ => Body::from(bytes),
        };
        Ok(Request::from_parts(parts, body))
    }

    /// Run the validator, failing closed on detector errors and panics
    fn validate(&self, parsed: Option<&Value>, raw: &[u8]) -> Result<ValidationResult, ApiError> {
        let validator = &self.validator;
        let outcome = catch_unwind(AssertUnwindSafe(|| match parsed {
            Some(value) => validator.validate_request_data(value),
            None => validator.validate_text(RAW_BODY_FIELD, &String::from_utf8_lossy(raw)),
        }));

        match outcome {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => {
                error!(error = %e, "Input validation aborted, rejecting request");
                Err(e.into())
            },
            Err(_) => {
                error!("Input validator panicked, rejecting request");
                Err(ApiError::ValidationFailed(Vec::new()))
            },
        }
    }

    fn decorate(&self, response: &mut Response, decision: Option<&RateLimitDecision>) {
        let headers = response.headers_mut();

        headers.insert(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        );
        headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
        headers.insert(
            header::X_XSS_PROTECTION,
            HeaderValue::from_static("1; mode=block"),
        );
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            self.settings.hsts_policy.clone(),
        );

        if let Some(decision) = decision {
            headers.insert(
                HeaderName::from_static(X_RATELIMIT_LIMIT),
                HeaderValue::from(decision.limit),
            );
            headers.insert(
                HeaderName::from_static(X_RATELIMIT_REMAINING),
                HeaderValue::from(decision.remaining),
            );
            headers.insert(
                HeaderName::from_static(X_RATELIMIT_RESET),
                HeaderValue::from(decision.reset_at.timestamp()),
            );
        }
    }
}

/// Layer applying [`SecurityMiddleware`]
#[derive(Clone, Debug)]
pub struct SecurityLayer {
    state: Arc<SecurityState>,
}

impl SecurityLayer {
    /// Create the layer
    ///
    /// Pass `None` for `rate_limiter` to disable rate limiting.
    #[must_use]
    pub fn new(
        settings: SecuritySettings,
        rate_limiter: Option<Arc<RateLimiter>>,
        validator: Arc<InputValidator>,
    ) -> Self {
        Self {
            state: Arc::new(SecurityState {
                settings,
                rate_limiter,
                validator,
            }),
        }
    }
}

impl<S> Layer<S> for SecurityLayer {
    type Service = SecurityMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SecurityMiddleware {
            inner,
            state: Arc::clone(&self.state),
        }
    }
}

/// Security middleware service
#[derive(Clone, Debug)]
pub struct SecurityMiddleware<S> {
    inner: S,
    state: Arc<SecurityState>,
}

impl<S> Service<Request> for SecurityMiddleware<S>
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
        let state = Arc::clone(&self.state);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if state.settings.is_bypassed(req.uri().path()) {
                let mut response = inner.call(req).await?;
                state.decorate(&mut response, None);
                return Ok(response);
            }

            let decision = state.check_rate_limit(&req);
            let screened = match &decision {
                Some(d) if !d.allowed => Err(ApiError::RateLimited {
                    retry_after_secs: d.retry_after(),
                }),
                _ => state.inspect_body(req).await,
            };

            let mut response = match screened {
                Ok(req) => inner.call(req).await?,
                Err(rejection) => rejection.into_response(),
            };
            state.decorate(&mut response, decision.as_ref());
            Ok(response)
        })
    }
}
