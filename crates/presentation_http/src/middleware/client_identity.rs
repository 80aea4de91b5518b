//! Client identity derivation
//!
//! Resolution order:
//! 1. a `ClientIdentity` extension inserted by an upstream auth layer
//! 2. the first `X-Forwarded-For` hop, only when the peer is a trusted proxy
//! 3. the peer address from `ConnectInfo<SocketAddr>`
//! 4. `"unknown"`

use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, Request};
use domain::ClientIdentity;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Derive the rate-limit identity for a request
pub fn client_identity(req: &Request, trusted_proxies: &[IpAddr]) -> ClientIdentity {
    if let Some(identity) = req.extensions().get::<ClientIdentity>() {
        return identity.clone();
    }

    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let Some(peer_ip) = peer else {
        return ClientIdentity::unknown();
    };

    trusted_proxies
        .contains(&peer_ip)
        .then(|| forwarded_for(req))
        .flatten()
        .map_or_else(|| ClientIdentity::from(peer_ip), ClientIdentity::from)
}

/// First parseable address in `X-Forwarded-For` (the original client)
fn forwarded_for(req: &Request) -> Option<IpAddr> {
    req.headers()
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse().ok())
}
