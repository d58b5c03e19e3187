//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

/// Delay before the next attempt after `failures` consecutive failures.
///
/// Zero failures means no delay. Jitter adds up to 10% on top of the capped
/// delay.
pub fn calculate_backoff(failures: u32, base_ms: u64, max_ms: u64) -> Duration {
    if failures == 0 {
        return Duration::ZERO;
    }

    let exponential_base = 2u64.saturating_pow(failures - 1);
    let capped_delay = base_ms.saturating_mul(exponential_base).min(max_ms);

    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        assert_eq!(calculate_backoff(0, 100, 2000), Duration::ZERO);

        let first = calculate_backoff(1, 100, 2000);
        assert!(first >= Duration::from_millis(100) && first < Duration::from_millis(110));

        let third = calculate_backoff(3, 100, 2000);
        assert!(third >= Duration::from_millis(400));

        let capped = calculate_backoff(40, 100, 1000);
        assert!(capped >= Duration::from_millis(1000) && capped < Duration::from_millis(1100));
    }
}
