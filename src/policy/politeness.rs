use crate::config::PolitenessConfig;
use crate::frontier::{CrawlOutcome, WorkQueue};
use crate::policy::PolitenessPolicy;
use crate::uri::CrawlUri;
use std::time::Duration;

/// Delays a site by a multiple of how long its last fetch took
///
/// A slow server gets proportionally more breathing room. The result is
/// clamped so fast servers still see a minimum gap and slow ones are not
/// abandoned for ever.
#[derive(Debug, Clone)]
pub struct DelayFactorPolicy {
    delay_factor: f64,
    min_delay: Duration,
    max_delay: Duration,
}

impl DelayFactorPolicy {
    pub fn new(delay_factor: f64, min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            delay_factor,
            min_delay,
            max_delay,
        }
    }

    pub fn from_config(config: &PolitenessConfig) -> Self {
        Self::new(
            config.delay_factor,
            Duration::from_millis(config.min_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    /// No delay at all; useful when politeness is enforced elsewhere
    pub fn none() -> Self {
        Self::new(0.0, Duration::ZERO, Duration::ZERO)
    }

    /// Computes the delay for a fetch that took `fetch_duration`
    pub fn delay_for(&self, fetch_duration: Duration) -> Duration {
        let scaled_ms = (fetch_duration.as_millis() as f64 * self.delay_factor).round();
        let scaled = if scaled_ms.is_finite() && scaled_ms >= 0.0 && scaled_ms < u64::MAX as f64 {
            Duration::from_millis(scaled_ms as u64)
        } else {
            self.max_delay
        };
        scaled.max(self.min_delay).min(self.max_delay)
    }
}

impl PolitenessPolicy for DelayFactorPolicy {
    fn delay(&self, _queue: &WorkQueue, _completed: &CrawlUri, outcome: &CrawlOutcome) -> Duration {
        self.delay_for(outcome.fetch_duration)
    }
}
