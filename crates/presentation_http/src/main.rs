//! Claims Guard HTTP Server
//!
//! Main entry point for the HTTP API server.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use infrastructure::{AppConfig, SecurityValidator, SystemClock, init_telemetry};
use presentation_http::{AppState, create_router, spawn_rate_limit_cleanup_task};
use tokio::{net::TcpListener, signal};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration before logging exists, report failures afterwards
    let (config, load_error) = match AppConfig::load() {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    init_telemetry(&config.telemetry)?;

    info!("🛡️ Claims Guard v{} starting...", env!("CARGO_PKG_VERSION"));
    if let Some(e) = load_error {
        warn!("Failed to load config, using defaults: {}", e);
    }

    info!(
        environment = %config.environment(),
        host = %config.server.host,
        port = %config.server.port,
        rate_limiting = config.security.rate_limit.enabled,
        "Configuration loaded"
    );

    // Refuse to start on critical security misconfiguration in production
    let warnings = SecurityValidator::validate(&config);
    SecurityValidator::log_warnings(&warnings);
    if SecurityValidator::should_block_startup(&config, &warnings) {
        anyhow::bail!(
            "Refusing to start: critical security configuration issues in production \
             (set CLAIMS_GUARD_ALLOW_INSECURE_CONFIG=true to override)"
        );
    }

    let addr = config.server.bind_address();
    let shutdown_timeout = config
        .server
        .shutdown_timeout()
        .unwrap_or(Duration::from_secs(30));
    let cleanup_interval = config.security.rate_limit.cleanup_interval();
    let cleanup_max_idle = config.security.rate_limit.cleanup_max_idle();

    // Initialize security services
    let state = AppState::from_config(config, Arc::new(SystemClock::new()))
        .map_err(|e| anyhow::anyhow!("Failed to initialize security services: {e}"))?;

    let cleanup_handle = state.rate_limiter.as_ref().map(|limiter| {
        spawn_rate_limit_cleanup_task(Arc::clone(limiter), cleanup_interval, cleanup_max_idle)
    });

    if state.signer.is_none() {
        info!("No signature secret configured, signed callback routes are disabled");
    }

    // Build router
    let app = create_router(state).layer(TraceLayer::new_for_http());

    // Start server
    let listener = TcpListener::bind(&addr).await?;
    info!("🚀 Server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown_timeout))
    .await?;

    if let Some(handle) = cleanup_handle {
        handle.abort();
    }

    info!("👋 Server shutdown complete");

    Ok(())
}

/// Wait for shutdown signals (SIGINT, SIGTERM) and handle graceful shutdown
async fn shutdown_signal(timeout: Duration) {
    let ctrl_c = async {
        // Log error but continue waiting - this is a best-effort signal handler
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("📥 Received Ctrl+C, initiating graceful shutdown...");
        }
        () = terminate => {
            info!("📥 Received SIGTERM, initiating graceful shutdown...");
        }
    }

    info!("⏳ Waiting up to {:?} for connections to close...", timeout);
}
