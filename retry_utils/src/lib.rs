use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, warn};

/// How a failed ledger call should be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// 429 from the node - back off harder
    RateLimited,
    /// 5xx, timeouts, dropped connections
    Transient,
    /// Malformed request, RPC error object, undecodable payload - never retried
    Permanent,
}

/// Exponential backoff settings
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Retries after the initial attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl BackoffPolicy {
    pub fn new(max_retries: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_millis(base_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
        }
    }

    /// No retries at all, used by tests and one-shot probes
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (0-indexed), `None` for permanent failures
    pub fn delay_for(&self, attempt: u32, class: FailureClass) -> Option<Duration> {
        let factor = match class {
            FailureClass::Permanent => return None,
            FailureClass::Transient => 1u32,
            FailureClass::RateLimited => 2u32,
        };

        let exp = 2u32.saturating_pow(attempt.min(16));
        let delay = self
            .base_delay
            .saturating_mul(exp)
            .saturating_mul(factor);

        Some(delay.min(self.max_delay))
    }
}

/// Run `operation` until it succeeds, fails permanently, or retries run out.
///
/// `classify` decides per error whether another attempt is worthwhile.
/// The last error is returned unchanged when giving up.
pub async fn retry_with_backoff<F, Fut, T, E>(
    mut operation: F,
    policy: &BackoffPolicy,
    classify: impl Fn(&E) -> FailureClass,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("✅ Ledger call succeeded after {} retries", attempt);
                }
                return Ok(value);
            }
            Err(e) => {
                let class = classify(&e);

                let delay = match policy.delay_for(attempt, class) {
                    Some(d) if attempt < policy.max_retries => d,
                    Some(_) => {
                        error!(
                            "❌ Ledger call failed after {} attempts: {}",
                            attempt + 1,
                            e
                        );
                        return Err(e);
                    }
                    None => {
                        debug!("Ledger call failed permanently: {}", e);
                        return Err(e);
                    }
                };

                warn!(
                    "⚠️  Ledger call failed (attempt {}/{}, {:?}): {} - retrying in {}ms",
                    attempt + 1,
                    policy.max_retries + 1,
                    class,
                    e,
                    delay.as_millis()
                );

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
