//! Value Objects - Immutable, identity-less domain primitives

mod client_identity;
mod rate_mode;

pub use client_identity::ClientIdentity;
pub use rate_mode::RateMode;
