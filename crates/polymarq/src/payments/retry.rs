use std::time::Duration;

use rand::Rng;

/// Backoff for calls to the payment gateway.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_millis: u64,
    pub max_millis: u64,
    pub jitter_pct: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_millis: 250,
            max_millis: 5_000,
            jitter_pct: 0.20,
        }
    }
}

/// Delay before retry number `retry_no` (1-based): `base * 2^(retry_no - 1)`,
/// capped at `max_millis`, then jittered by up to `jitter_pct` either way.
pub fn next_delay(retry_no: u32, cfg: &RetryConfig, rng: &mut impl Rng) -> Duration {
    let exp = retry_no.max(1) - 1;
    let pow2 = 1_u64.checked_shl(exp).unwrap_or(u64::MAX);
    let delay = cfg.base_millis.saturating_mul(pow2).min(cfg.max_millis);

    let jitter_range = delay as f64 * cfg.jitter_pct;
    let jitter = if jitter_range > 0.0 {
        rng.gen_range(-jitter_range..=jitter_range)
    } else {
        0.0
    };

    let jittered = (delay as f64 + jitter).round().clamp(0.0, cfg.max_millis as f64);
    Duration::from_millis(jittered as u64)
}

/// Status codes worth another attempt.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}
