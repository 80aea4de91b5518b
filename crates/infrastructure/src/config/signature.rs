//! Request signing configuration.

use std::sync::Arc;

use application::{ApplicationError, Clock, DEFAULT_TOLERANCE_SECS, RequestSigner};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Shared secret and replay window for signed requests
#[derive(Clone, Serialize, Deserialize)]
pub struct SignatureConfig {
    /// HMAC secret (sensitive - uses SecretString)
    ///
    /// Signed callback routes are disabled while this is unset.
    #[serde(default, skip_serializing)]
    pub secret: Option<SecretString>,

    /// Accepted distance between request timestamp and server time
    #[serde(default = "default_tolerance")]
    pub tolerance_secs: u64,
}

const fn default_tolerance() -> u64 {
    DEFAULT_TOLERANCE_SECS
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            secret: None,
            tolerance_secs: default_tolerance(),
        }
    }
}

impl std::fmt::Debug for SignatureConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureConfig")
            .field(
                "secret",
                &if self.secret.is_some() {
                    Some("[REDACTED]")
                } else {
                    None
                },
            )
            .field("tolerance_secs", &self.tolerance_secs)
            .finish()
    }
}

impl SignatureConfig {
    /// Length of the configured secret in bytes, zero when unset
    #[must_use]
    pub fn secret_len(&self) -> usize {
        self.secret.as_ref().map_or(0, |s| s.expose_secret().len())
    }

    /// Build a signer, or `None` when no secret is configured
    pub fn build_signer(
        &self,
        clock: Arc<dyn Clock>,
    ) -> Result<Option<RequestSigner>, ApplicationError> {
        self.secret
            .as_ref()
            .map(|secret| {
                RequestSigner::new(secret.expose_secret().as_bytes(), self.tolerance_secs, clock)
            })
            .transpose()
    }
}
