use std::time::Duration;

/// Delay before retry number `retry_count` (0 = first retry).
///
/// Doubles `base` per retry and saturates instead of overflowing.
///
/// ```
/// use std::time::Duration;
/// use geofetch::retry_delay;
///
/// let base = Duration::from_millis(500);
/// assert_eq!(retry_delay(0, base), Duration::from_millis(500));
/// assert_eq!(retry_delay(2, base), Duration::from_secs(2));
/// ```
pub fn retry_delay(retry_count: u32, base: Duration) -> Duration {
    base.saturating_mul(2_u32.saturating_pow(retry_count))
}
