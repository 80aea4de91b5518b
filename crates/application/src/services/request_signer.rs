//! HMAC-SHA256 request signing with a replay window
//!
//! The signed material is `METHOD\npath\nbody\ntimestamp`. Method and path
//! cannot contain a line break and the timestamp is a bare integer, so the
//! first two and the last separator are unambiguous even when the body
//! contains line breaks.

use std::{fmt, sync::Arc};

use domain::SignatureError;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, warn};

use crate::{error::ApplicationError, ports::Clock};

type HmacSha256 = Hmac<Sha256>;

/// Default accepted distance between a request timestamp and now
pub const DEFAULT_TOLERANCE_SECS: u64 = 300;

/// Optional prefix accepted on incoming signatures
const SIGNATURE_PREFIX: &str = "sha256=";

/// Signs and verifies request material with a process-wide secret
#[derive(Clone)]
pub struct RequestSigner {
    mac: HmacSha256,
    tolerance_secs: u64,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSigner")
            .field("secret", &"[REDACTED]")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish_non_exhaustive()
    }
}

impl RequestSigner {
    /// Create a signer
    ///
    /// # Errors
    ///
    /// Returns `ApplicationError::Configuration` for an empty secret.
    pub fn new(
        secret: &[u8],
        tolerance_secs: u64,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ApplicationError> {
        if secret.is_empty() {
            return Err(ApplicationError::Configuration(
                "signature secret must not be empty".to_string(),
            ));
        }
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| ApplicationError::Configuration(format!("invalid HMAC key: {e}")))?;
        Ok(Self {
            mac,
            tolerance_secs,
            clock,
        })
    }

    /// Accepted timestamp skew in seconds
    pub const fn tolerance_secs(&self) -> u64 {
        self.tolerance_secs
    }

    /// Lowercase hex HMAC over the canonical request material
    ///
    /// Pure: the result depends only on the arguments and the secret.
    pub fn sign_request(&self, method: &str, path: &str, body: &[u8], timestamp: i64) -> String {
        hex::encode(self.digest(method, path, body, timestamp))
    }

    /// Check freshness and signature, reporting why verification failed
    ///
    /// Freshness is checked first, so an expired request is reported as
    /// expired whether or not its signature matches.
    ///
    /// # Errors
    ///
    /// - `SignatureError::Expired` when `|now - timestamp|` exceeds the tolerance
    /// - `SignatureError::Malformed` when the signature is not hex
    /// - `SignatureError::Invalid` when the signature does not match
    pub fn verify(
        &self,
        method: &str,
        path: &str,
        body: &[u8],
        timestamp: i64,
        signature: &str,
    ) -> Result<(), SignatureError> {
        let now = self.clock.now().timestamp();
        let skew_secs = now.abs_diff(timestamp);
        if skew_secs > self.tolerance_secs {
            warn!(skew_secs, tolerance_secs = self.tolerance_secs, "Signature timestamp outside tolerance");
            return Err(SignatureError::Expired { skew_secs });
        }

        let signature = signature.trim();
        let signature_hex = signature.strip_prefix(SIGNATURE_PREFIX).unwrap_or(signature);
        let provided = hex::decode(signature_hex)
            .map_err(|e| SignatureError::Malformed(format!("signature is not hex: {e}")))?;

        let mut mac = self.mac.clone();
        update_canonical(&mut mac, method, path, body, timestamp);
        mac.verify_slice(&provided).map_err(|_| {
            warn!(method, path, "Signature mismatch");
            SignatureError::Invalid
        })?;

        debug!(method, path, "Signature verified");
        Ok(())
    }

    /// True iff the signature matches and the timestamp is fresh
    pub fn verify_signature(
        &self,
        method: &str,
        path: &str,
        body: &[u8],
        timestamp: i64,
        signature: &str,
    ) -> bool {
        self.verify(method, path, body, timestamp, signature).is_ok()
    }

    fn digest(&self, method: &str, path: &str, body: &[u8], timestamp: i64) -> Vec<u8> {
        let mut mac = self.mac.clone();
        update_canonical(&mut mac, method, path, body, timestamp);
        mac.finalize().into_bytes().to_vec()
    }
}

fn update_canonical(mac: &mut HmacSha256, method: &str, path: &str, body: &[u8], timestamp: i64) {
    mac.update(method.to_ascii_uppercase().as_bytes());
    mac.update(b"\n");
    mac.update(path.as_bytes());
    mac.update(b"\n");
    mac.update(body);
    mac.update(b"\n");
    mac.update(timestamp.to_string().as_bytes());
}
