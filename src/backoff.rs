use std::time::Duration;

/// Computes the wait before the next attempt.
///
/// `attempt` is 1 before the first retry, 2 before the second, and so on.
/// The wait starts at `min_wait`, doubles per attempt and is capped at
/// `max_wait`. The result always lies in `[min_wait, max(min_wait, max_wait)]`.
pub fn backoff_wait(attempt: usize, min_wait: Duration, max_wait: Duration) -> Duration {
    let max_wait = max_wait.max(min_wait);
    let exp = attempt.saturating_sub(1).min(31) as u32;
    min_wait
        .checked_mul(1u32 << exp)
        .map_or(max_wait, |wait| wait.min(max_wait))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::backoff_wait;

    #[test]
    fn starts_at_min_and_doubles() {
        let min = Duration::from_millis(100);
        let max = Duration::from_secs(10);
        assert_eq!(backoff_wait(1, min, max), Duration::from_millis(100));
        assert_eq!(backoff_wait(2, min, max), Duration::from_millis(200));
        assert_eq!(backoff_wait(3, min, max), Duration::from_millis(400));
    }

    #[test]
    fn caps_at_max() {
        let min = Duration::from_secs(1);
        let max = Duration::from_secs(64);
        assert_eq!(backoff_wait(7, min, max), Duration::from_secs(64));
        assert_eq!(backoff_wait(8, min, max), Duration::from_secs(64));
    }

    #[test]
    fn stays_within_bounds_for_many_attempts() {
        let min = Duration::from_millis(10);
        let max = Duration::from_millis(750);
        for attempt in 1..=200 {
            let wait = backoff_wait(attempt, min, max);
            assert!(wait >= min, "attempt {attempt} waited {wait:?}");
            assert!(wait <= max, "attempt {attempt} waited {wait:?}");
        }
    }

    #[test]
    fn huge_min_wait_does_not_overflow() {
        let min = Duration::from_secs(u64::MAX / 2);
        let wait = backoff_wait(40, min, Duration::MAX);
        assert!(wait >= min);
    }

    #[test]
    fn max_below_min_collapses_to_min() {
        let min = Duration::from_secs(3);
        assert_eq!(backoff_wait(5, min, Duration::from_secs(1)), min);
    }
}
