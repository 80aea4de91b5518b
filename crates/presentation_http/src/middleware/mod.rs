//! HTTP middleware components
//!
//! This module contains the request security layer (rate limiting, input
//! validation, response headers) and signed request verification.

pub mod client_identity;
pub mod path_matcher;
pub mod security;
pub mod signature;

pub use client_identity::client_identity;
pub use path_matcher::PathMatcher;
pub use security::{RAW_BODY_FIELD, RawBody, SecurityLayer, SecurityMiddleware, SecuritySettings};
pub use signature::{
    SignatureVerification, SignatureVerificationLayer, X_SIGNATURE, X_TIMESTAMP,
};
