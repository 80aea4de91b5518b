//! Application layer - Security checks guarding the API surface
//!
//! Contains the rate limiter, the input validator with its injection
//! detectors, and the request signer. All services take their collaborators
//! (configuration, clock) at construction time and hold no global state.

pub mod error;
pub mod ports;
pub mod services;
#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

pub use error::ApplicationError;
pub use ports::*;
pub use services::*;
