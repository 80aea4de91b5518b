//! Application state shared across handlers and middleware

use std::sync::Arc;

use application::{ApplicationError, Clock, InputValidator, RateLimiter, RequestSigner};
use infrastructure::AppConfig;

use crate::middleware::SecuritySettings;

/// Shared application state
#[derive(Clone, Debug)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// Settings of the security layer
    pub security: SecuritySettings,
    /// Rate limiter, absent when rate limiting is disabled
    pub rate_limiter: Option<Arc<RateLimiter>>,
    /// Input validator
    pub validator: Arc<InputValidator>,
    /// Request signer, absent when no signature secret is configured
    pub signer: Option<Arc<RequestSigner>>,
}

impl AppState {
    /// Build every security service from configuration
    ///
    /// The services are created here, once, and shared by all requests.
    pub fn from_config(config: AppConfig, clock: Arc<dyn Clock>) -> Result<Self, ApplicationError> {
        let security = SecuritySettings::from_config(&config.security)?;

        let rate_limit = &config.security.rate_limit;
        let rate_limiter = if rate_limit.enabled {
            rate_limit.validate_cleanup()?;
            Some(Arc::new(RateLimiter::new(
                rate_limit.limiter_config(),
                Arc::clone(&clock),
            )?))
        } else {
            None
        };

        let validator = Arc::new(InputValidator::new(&config.security.validator_config()));
        let signer = config.signature.build_signer(clock)?.map(Arc::new);

        Ok(Self {
            config: Arc::new(config),
            security,
            rate_limiter,
            validator,
            signer,
        })
    }
}
