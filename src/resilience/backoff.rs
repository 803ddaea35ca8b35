//! Exponential backoff between tries against the same provider.

use std::time::Duration;

/// Delay to wait after the failed try `try_index` (0-based): `base_ms * 2^try_index`.
///
/// With a 200ms base this yields 200, 400, 800, ... milliseconds.
pub fn calculate_backoff(try_index: u32, base_ms: u64) -> Duration {
    let factor = 2u64.saturating_pow(try_index);
    Duration::from_millis(base_ms.saturating_mul(factor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        assert_eq!(calculate_backoff(0, 200), Duration::from_millis(200));
        assert_eq!(calculate_backoff(1, 200), Duration::from_millis(400));
        assert_eq!(calculate_backoff(2, 200), Duration::from_millis(800));
        assert_eq!(calculate_backoff(3, 100), Duration::from_millis(800));
    }

    #[test]
    fn test_backoff_saturates() {
        assert_eq!(calculate_backoff(80, 200), Duration::from_millis(u64::MAX));
        assert_eq!(calculate_backoff(5, 0), Duration::ZERO);
    }
}
