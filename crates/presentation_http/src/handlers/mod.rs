//! HTTP request handlers

pub mod auth;
pub mod callbacks;
pub mod claims;
pub mod health;
