use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Default)]
struct WindowState {
    sent: VecDeque<Instant>,
    /// Set when the provider answers 429; nothing is sent before this instant
    cooldown_until: Option<Instant>,
}

/// Sliding-window rate limiter shared by every request of one client: at most
/// `max_requests` per `window`, plus a provider-imposed cool-down after a 429.
#[derive(Clone)]
pub(crate) struct RateLimiter {
    state: Arc<Mutex<WindowState>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub(crate) fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(WindowState::default())),
            max_requests: max_requests.max(1),
            window,
        }
    }

    /// Requests per minute
    pub(crate) fn per_minute(max_requests: usize) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }

    /// Wait for a free slot and claim it
    pub(crate) async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                self.next_wait(&mut state, now)
            };
            match wait {
                None => return,
                Some(wait) => {
                    tracing::debug!("Rate limiter: waiting {:.1}s for market data slot", wait.as_secs_f64());
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Claim a slot at `now`, or return how long to wait before trying again
    fn next_wait(&self, state: &mut WindowState, now: Instant) -> Option<Duration> {
        if let Some(until) = state.cooldown_until {
            if until > now {
                return Some(until - now);
            }
            state.cooldown_until = None;
        }

        while state
            .sent
            .front()
            .is_some_and(|&sent| now.duration_since(sent) >= self.window)
        {
            state.sent.pop_front();
        }

        if state.sent.len() < self.max_requests {
            state.sent.push_back(now);
            return None;
        }

        let oldest = state.sent.front().copied().unwrap_or(now);
        Some((oldest + self.window).saturating_duration_since(now) + Duration::from_millis(50))
    }

    /// Hold back every caller for `wait`; a longer existing cool-down is kept
    pub(crate) async fn cool_down(&self, wait: Duration) {
        let until = Instant::now() + wait;
        let mut state = self.state.lock().await;
        if state.cooldown_until.map_or(true, |current| current < until) {
            state.cooldown_until = Some(until);
        }
    }

    #[cfg(test)]
    async fn in_flight(&self) -> usize {
        self.state.lock().await.sent.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_under_limit_is_immediate() {
        let limiter = RateLimiter::per_minute(3);
        let started = std::time::Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(limiter.in_flight().await, 3);
    }

    #[tokio::test]
    async fn test_expired_slots_are_released() {
        let limiter = RateLimiter::new(1, Duration::from_millis(20));
        limiter.acquire().await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        limiter.acquire().await;
        assert_eq!(limiter.in_flight().await, 1);
    }

    #[test]
    fn test_full_window_reports_wait() {
        let limiter = RateLimiter::new(2, Duration::from_secs(10));
        let mut state = WindowState::default();
        let now = Instant::now();
        assert_eq!(limiter.next_wait(&mut state, now), None);
        assert_eq!(limiter.next_wait(&mut state, now), None);

        let wait = limiter.next_wait(&mut state, now + Duration::from_secs(4)).unwrap();
        assert!(wait > Duration::from_secs(5) && wait < Duration::from_secs(7), "{:?}", wait);
        // Once the window has passed the oldest slot frees up
        assert_eq!(limiter.next_wait(&mut state, now + Duration::from_secs(10)), None);
    }

    #[test]
    fn test_cooldown_blocks_even_with_free_slots() {
        let limiter = RateLimiter::per_minute(100);
        let now = Instant::now();
        let mut state = WindowState {
            sent: VecDeque::new(),
            cooldown_until: Some(now + Duration::from_secs(3)),
        };
        assert_eq!(limiter.next_wait(&mut state, now), Some(Duration::from_secs(3)));
        assert_eq!(limiter.next_wait(&mut state, now + Duration::from_secs(3)), None);
        assert!(state.cooldown_until.is_none());
    }

    #[tokio::test]
    async fn test_cool_down_keeps_longer_pause() {
        let limiter = RateLimiter::per_minute(10);
        limiter.cool_down(Duration::from_secs(30)).await;
        limiter.cool_down(Duration::from_secs(1)).await;
        let state = limiter.state.lock().await;
        let remaining = state.cooldown_until.unwrap().saturating_duration_since(Instant::now());
        assert!(remaining > Duration::from_secs(20));
    }
}
