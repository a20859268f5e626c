use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// A small, fully specified sliding-window limiter — not delegated to an
/// external crate, unlike the rest of the ambient stack, because it's a
/// handful of lines with no cross-cutting concern beyond this module.
pub struct SlidingWindowLimiter {
    window: Duration,
    max_events: usize,
    entries: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
}

impl SlidingWindowLimiter {
    pub fn new(window: Duration, max_events: usize) -> Self {
        Self {
            window,
            max_events,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Admits one event for `key` at `now`, or rejects with the duration
    /// the caller must wait before the window has room again.
    pub async fn check(&self, key: &str) -> Result<(), Duration> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let deque = entries.entry(key.to_owned()).or_default();
        while let Some(&front) = deque.front() {
            if now.duration_since(front) >= self.window {
                deque.pop_front();
            } else {
                break;
            }
        }
        if deque.len() >= self.max_events {
            let oldest = *deque.front().expect("len >= max_events > 0 implies non-empty");
            let retry_after = self.window.saturating_sub(now.duration_since(oldest));
            return Err(retry_after);
        }
        deque.push_back(now);
        Ok(())
    }

    pub async fn clear(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }
}

/// Rounds a retry-after duration up to whole seconds, matching spec's
/// `ceil((oldestInWindow + window - now) / 1s)`.
pub fn retry_after_secs(d: Duration) -> u64 {
    let secs = d.as_secs();
    if d.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admits_up_to_the_limit_then_rejects() {
        let limiter = SlidingWindowLimiter::new(Duration::from_secs(60), 10);
        for _ in 0..10 {
            assert!(limiter.check("socket-1").await.is_ok());
        }
        assert!(limiter.check("socket-1").await.is_err());
    }

    #[tokio::test]
    async fn limiter_is_keyed_independently() {
        let limiter = SlidingWindowLimiter::new(Duration::from_secs(60), 1);
        assert!(limiter.check("a").await.is_ok());
        assert!(limiter.check("b").await.is_ok());
        assert!(limiter.check("a").await.is_err());
    }

    #[tokio::test]
    async fn clear_resets_the_window_for_a_key() {
        let limiter = SlidingWindowLimiter::new(Duration::from_secs(60), 1);
        assert!(limiter.check("a").await.is_ok());
        assert!(limiter.check("a").await.is_err());
        limiter.clear("a").await;
        assert!(limiter.check("a").await.is_ok());
    }

    #[test]
    fn retry_after_secs_rounds_up() {
        assert_eq!(retry_after_secs(Duration::from_millis(0)), 0);
        assert_eq!(retry_after_secs(Duration::from_millis(1)), 1);
        assert_eq!(retry_after_secs(Duration::from_secs(5)), 5);
        assert_eq!(retry_after_secs(Duration::from_millis(5500)), 6);
    }
}
