use std::time::Duration;

use rand::Rng;

use crate::endpoint::RetryPolicy;

/// Linear backoff with jitter between retries of an offline endpoint.
///
/// Min and max are not absolute bounds on the delay. A per-attempt base is
/// drawn uniformly between them and multiplied by the attempt number, so
/// attempt `a` sleeps somewhere in `[min * a, max * a]`. There is no
/// ceiling: the delay keeps growing with the attempt count until the
/// retry budget stops the endpoint (or saturates at `Duration::MAX` when
/// the budget is unlimited).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearJitterBackoff {
    min: Duration,
    max: Duration,
    max_attempts: u32,
}

impl LinearJitterBackoff {
    pub fn new(min: Duration, max: Duration, max_attempts: u32) -> Self {
        Self { min, max, max_attempts }
    }

    pub fn from_policy(policy: &RetryPolicy) -> Self {
        Self::new(policy.min_interval, policy.max_interval, policy.max_attempts)
    }

    /// Delay before the next check after `attempt` consecutive failures
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with(attempt, &mut rand::thread_rng())
    }

    pub fn delay_with<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        if self.max <= self.min {
            return self.min.saturating_mul(attempt);
        }

        let fraction: f64 = rng.gen_range(0.0..1.0);
        let spread = (self.max - self.min).as_nanos() as f64 * fraction;
        let base = self.min.saturating_add(Duration::from_nanos(spread as u64));
        base.saturating_mul(attempt)
    }

    /// True once the retry budget is spent; a budget of 0 never runs out
    pub fn is_exhausted(&self, attempt: u32) -> bool {
        self.max_attempts != 0 && attempt >= self.max_attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_delay_within_scaled_bounds() {
        let min = Duration::from_millis(200);
        let max = Duration::from_millis(900);
        let backoff = LinearJitterBackoff::new(min, max, 0);
        let mut rng = StdRng::seed_from_u64(7);

        for attempt in 1..=50u32 {
            for _ in 0..20 {
                let delay = backoff.delay_with(attempt, &mut rng);
                assert!(delay >= min * attempt, "attempt {attempt}: {delay:?} below lower bound");
                assert!(delay <= max * attempt, "attempt {attempt}: {delay:?} above upper bound");
            }
        }
    }

    #[test]
    fn test_equal_bounds_are_linear() {
        let backoff = LinearJitterBackoff::new(Duration::from_secs(2), Duration::from_secs(2), 0);
        assert_eq!(backoff.delay(1), Duration::from_secs(2));
        assert_eq!(backoff.delay(3), Duration::from_secs(6));

        let inverted = LinearJitterBackoff::new(Duration::from_secs(5), Duration::from_secs(1), 0);
        assert_eq!(inverted.delay(4), Duration::from_secs(20));
    }

    #[test]
    fn test_delay_saturates_instead_of_overflowing() {
        let backoff = LinearJitterBackoff::new(Duration::MAX / 2, Duration::MAX, 0);
        assert_eq!(backoff.delay(u32::MAX), Duration::MAX);
    }

    #[test]
    fn test_exhaustion() {
        let unlimited = LinearJitterBackoff::new(Duration::ZERO, Duration::ZERO, 0);
        assert!(!unlimited.is_exhausted(u32::MAX));

        let limited = LinearJitterBackoff::new(Duration::ZERO, Duration::ZERO, 3);
        assert!(!limited.is_exhausted(2));
        assert!(limited.is_exhausted(3));
        assert!(limited.is_exhausted(4));
    }
}
