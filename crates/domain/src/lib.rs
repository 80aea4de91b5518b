//! Domain layer for Claims Guard
//!
//! Contains the vocabulary of the request security middleware: caller
//! identities, rate-limit modes and decisions, injection categories and
//! validation results. This layer performs no I/O.

pub mod entities;
pub mod errors;
pub mod value_objects;

pub use entities::*;
pub use errors::{DomainError, SignatureError};
pub use value_objects::*;
