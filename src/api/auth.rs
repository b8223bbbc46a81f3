//! Request authentication and rate limiting.
//!
//! The configured API key is never kept in the clear: only
//! `HMAC-SHA256(key, AUTH_DOMAIN)` is stored, and a presented key is
//! checked by recomputing the tag and comparing in constant time.
//!
//! Crypto is handled by the `hmac-sha256` crate; pure Rust, no_std,
//! constant-time verification, identical on ESP-IDF and host targets.

use burster::Limiter;
use core::time::Duration;
use log::warn;

/// Fixed message the key is MACed over.
const AUTH_DOMAIN: &[u8] = b"aquacontrol/api-key/v1";

/// Longest key accepted from a request header.
pub const MAX_KEY_LEN: usize = 128;

// ── API key ──────────────────────────────────────────────────

#[derive(Clone)]
pub struct ApiKey {
    tag: [u8; 32],
}

impl ApiKey {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            tag: hmac_sha256::HMAC::mac(AUTH_DOMAIN, secret),
        }
    }

    /// `true` when `presented` is the configured key.  Empty and
    /// oversized keys are rejected without hashing.
    pub fn verify(&self, presented: &[u8]) -> bool {
        if presented.is_empty() || presented.len() > MAX_KEY_LEN {
            return false;
        }
        hmac_sha256::HMAC::verify(AUTH_DOMAIN, presented, &self.tag)
    }
}

impl core::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("ApiKey(..)")
    }
}

// ── Rate limiting ────────────────────────────────────────────

/// Token bucket shared by every API request.
pub struct RequestLimiter {
    bucket: burster::TokenBucket<fn() -> Duration>,
}

impl RequestLimiter {
    /// `rate_per_sec` tokens per second, `burst` capacity.
    pub fn new(rate_per_sec: u32, burst: u32) -> Self {
        Self {
            bucket: burster::TokenBucket::new_with_time_provider(
                u64::from(rate_per_sec),
                u64::from(burst),
                platform_now as fn() -> Duration,
            ),
        }
    }

    /// Consume one token; returns `false` when exhausted.
    pub fn check(&mut self) -> bool {
        let ok = self.bucket.try_consume(1).is_ok();
        if !ok {
            warn!("api: rate limit exceeded");
        }
        ok
    }
}

// ── Platform time for rate limiter ───────────────────────────

#[cfg(target_os = "espidf")]
fn platform_now() -> Duration {
    let us = unsafe { esp_idf_svc::sys::esp_timer_get_time() };
    Duration::from_micros(us as u64)
}

#[cfg(not(target_os = "espidf"))]
fn platform_now() -> Duration {
    use std::time::Instant;
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    START.get_or_init(Instant::now).elapsed()
}

// ── Tests ────────────────────────────────────────────────────
