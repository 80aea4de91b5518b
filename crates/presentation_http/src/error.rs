//! API error handling
//!
//! Every rejection produced by the security layers is rendered here as a JSON
//! body with a stable `error` code. Internal error details never reach the
//! client.

use application::ApplicationError;
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use domain::{SignatureError, ValidationIssue};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Validation failed with {} issue(s)", .0.len())]
    ValidationFailed(Vec<ValidationIssue>),

    #[error("Payload exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("Signature invalid: {0}")]
    SignatureInvalid(String),

    #[error("Signature expired")]
    SignatureExpired,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Stable machine-readable code, used as the `error` field
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limit_exceeded",
            Self::ValidationFailed(_) => "validation_failed",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::SignatureInvalid(_) => "signature_invalid",
            Self::SignatureExpired => "signature_expired",
            Self::BadRequest(_) => "bad_request",
            Self::Internal(_) => "internal_error",
        }
    }

    /// HTTP status for this error
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::ValidationFailed(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::SignatureInvalid(_) | Self::SignatureExpired => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Body of a 400 validation rejection
#[derive(Debug, Serialize)]
pub struct ValidationErrorResponse<'a> {
    /// Always `validation_failed`
    pub error: &'static str,
    /// One entry per failed (field, category) pair
    pub details: &'a [ValidationIssue],
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        match self {
            Self::RateLimited { retry_after_secs } => {
                let mut response = (
                    status,
                    Json(json!({ "error": code, "retry_after": retry_after_secs })),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
                response
            },
            Self::ValidationFailed(issues) => (
                status,
                Json(ValidationErrorResponse {
                    error: code,
                    details: &issues,
                }),
            )
                .into_response(),
            Self::PayloadTooLarge { limit } => {
                (status, Json(json!({ "error": code, "limit": limit }))).into_response()
            },
            Self::BadRequest(message) => {
                (status, Json(json!({ "error": code, "message": message }))).into_response()
            },
            Self::SignatureInvalid(_) | Self::SignatureExpired | Self::Internal(_) => {
                (status, Json(json!({ "error": code }))).into_response()
            },
        }
    }
}

impl From<SignatureError> for ApiError {
    fn from(err: SignatureError) -> Self {
        match err {
            SignatureError::Expired { .. } => Self::SignatureExpired,
            SignatureError::Invalid | SignatureError::Malformed(_) => {
                Self::SignatureInvalid(err.to_string())
            },
        }
    }
}

impl From<ApplicationError> for ApiError {
    fn from(err: ApplicationError) -> Self {
        match err {
            ApplicationError::Domain(e) => Self::BadRequest(e.to_string()),
            // A detector that cannot finish must not let the payload through
            ApplicationError::DetectorFailure { .. } => Self::ValidationFailed(Vec::new()),
            ApplicationError::Configuration(msg) | ApplicationError::Internal(msg) => {
                Self::Internal(msg)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use domain::ThreatCategory;
    use serde_json::Value;

    use super::*;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn rate_limited_body_and_header() {
        let response = ApiError::RateLimited {
            retry_after_secs: 42,
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
        let body = body_json(response).await;
        assert_eq!(body, json!({"error": "rate_limit_exceeded", "retry_after": 42}));
    }

    #[tokio::test]
    async fn validation_failed_lists_details() {
        let issues = vec![ValidationIssue::new(ThreatCategory::SqlInjection, "username")];
        let response = ApiError::ValidationFailed(issues).into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "validation_failed");
        assert_eq!(body["details"][0]["category"], "sql_injection");
        assert_eq!(body["details"][0]["field"], "username");
        assert!(body["details"][0]["message"].is_string());
    }

    #[tokio::test]
    async fn payload_too_large_reports_limit() {
        let response = ApiError::PayloadTooLarge { limit: 1024 }.into_response();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body = body_json(response).await;
        assert_eq!(body, json!({"error": "payload_too_large", "limit": 1024}));
    }

    #[tokio::test]
    async fn signature_errors_are_unauthorized() {
        let invalid: ApiError = SignatureError::Invalid.into();
        let expired: ApiError = SignatureError::Expired { skew_secs: 900 }.into();
        let malformed: ApiError = SignatureError::Malformed("bad hex".to_string()).into();

        assert_eq!(malformed.code(), "signature_invalid");

        let response = invalid.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await, json!({"error": "signature_invalid"}));

        let response = expired.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await, json!({"error": "signature_expired"}));
    }

    #[tokio::test]
    async fn internal_error_hides_details() {
        let response = ApiError::Internal("db password is hunter2".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body, json!({"error": "internal_error"}));
    }

    #[test]
    fn detector_failure_fails_closed() {
        let err: ApiError = ApplicationError::detector_failure("xss", "regex aborted").into();
        assert!(matches!(err, ApiError::ValidationFailed(ref d) if d.is_empty()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn configuration_error_is_internal() {
        let err: ApiError = ApplicationError::Configuration("bad".to_string()).into();
        assert!(matches!(err, ApiError::Internal(_)));
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            ApiError::RateLimited {
                retry_after_secs: 3
            }
            .to_string(),
            "Rate limit exceeded, retry after 3s"
        );
        assert_eq!(
            ApiError::ValidationFailed(Vec::new()).to_string(),
            "Validation failed with 0 issue(s)"
        );
    }
}
