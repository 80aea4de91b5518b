//! Route definitions

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::{
    handlers,
    middleware::{SecurityLayer, SignatureVerificationLayer},
    state::AppState,
};

/// Create the main router with all routes
///
/// Every route sits behind the security layer. Callback routes are mounted
/// only when a signature secret is configured, and additionally require a
/// valid request signature.
pub fn create_router(state: AppState) -> Router {
    let security = SecurityLayer::new(
        state.security.clone(),
        state.rate_limiter.clone(),
        Arc::clone(&state.validator),
    );

    let mut router = Router::new()
        // Health and status endpoints
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        // Claims API (v1)
        .route("/api/v1/claims", post(handlers::claims::submit_claim))
        .route(
            "/api/v1/claims/{id}",
            get(handlers::claims::get_claim).put(handlers::claims::update_claim),
        )
        // Session API (v1)
        .route("/api/v1/auth/session", post(handlers::auth::create_session));

    if let Some(signer) = &state.signer {
        let callbacks = Router::new()
            .route(
                "/api/v1/callbacks/{source}",
                post(handlers::callbacks::receive_callback),
            )
            .route_layer(SignatureVerificationLayer::new(
                Arc::clone(signer),
                state.security.max_body_bytes,
            ));
        router = router.merge(callbacks);
    }

    router.layer(security).with_state(state)
}
