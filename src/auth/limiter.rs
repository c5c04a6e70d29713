//! Per-client login attempt limiting

use crate::error::{Error, Result};
use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Default sliding window length
pub const LOGIN_WINDOW: Duration = Duration::from_secs(60);

/// Sliding-window limiter keyed by client address
pub struct LoginLimiter {
    attempts: Arc<RwLock<HashMap<IpAddr, VecDeque<Instant>>>>,
    max_attempts: usize,
    window: Duration,
}

impl LoginLimiter {
    pub fn new(max_attempts: usize) -> Self {
        Self::with_window(max_attempts, LOGIN_WINDOW)
    }

    pub fn with_window(max_attempts: usize, window: Duration) -> Self {
        Self {
            attempts: Arc::new(RwLock::new(HashMap::new())),
            max_attempts,
            window,
        }
    }

    /// Record an attempt from `ip`, or reject it when the window is full.
    /// Rejected attempts are not recorded.
    pub async fn check(&self, ip: IpAddr) -> Result<()> {
        let now = Instant::now();
        let mut attempts = self.attempts.write().await;
        let window = attempts.entry(ip).or_default();

        while let Some(oldest) = window.front() {
            if now.duration_since(*oldest) >= self.window {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() >= self.max_attempts {
            let retry_after = window
                .front()
                .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(self.window);
            // Round up so clients never retry a moment too early
            let retry_after_secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            return Err(Error::RateLimited {
                retry_after_secs: retry_after_secs.max(1),
            });
        }

        window.push_back(now);
        Ok(())
    }

    /// Drop clients whose attempts have all left the window
    pub async fn sweep(&self) {
        let now = Instant::now();
        let mut attempts = self.attempts.write().await;
        attempts.retain(|_, window| {
            window
                .back()
                .is_some_and(|newest| now.duration_since(*newest) < self.window)
        });
    }

    /// Number of clients currently tracked
    pub async fn tracked_clients(&self) -> usize {
        self.attempts.read().await.len()
    }

    /// Periodically sweep stale windows in the background
    pub fn spawn_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(limiter.window);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                limiter.sweep().await;
            }
        })
    }
}

impl Clone for LoginLimiter {
    fn clone(&self) -> Self {
        Self {
            attempts: Arc::clone(&self.attempts),
            max_attempts: self.max_attempts,
            window: self.window,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[tokio::test]
    async fn test_sixth_attempt_rejected() {
        let limiter = LoginLimiter::new(5);
        for _ in 0..5 {
            assert!(limiter.check(ip(1)).await.is_ok());
        }

        match limiter.check(ip(1)).await {
            Err(Error::RateLimited { retry_after_secs }) => {
                assert!((1..=60).contains(&retry_after_secs))
            }
            other => panic!("expected rate limit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_clients_are_independent() {
        let limiter = LoginLimiter::new(1);
        assert!(limiter.check(ip(1)).await.is_ok());
        assert!(limiter.check(ip(1)).await.is_err());
        assert!(limiter.check(ip(2)).await.is_ok());
    }

    #[tokio::test]
    async fn test_window_slides() {
        let limiter = LoginLimiter::with_window(2, Duration::from_millis(50));
        assert!(limiter.check(ip(1)).await.is_ok());
        assert!(limiter.check(ip(1)).await.is_ok());
        assert!(limiter.check(ip(1)).await.is_err());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(limiter.check(ip(1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_sweep_drops_stale_clients() {
        let limiter = LoginLimiter::with_window(5, Duration::from_millis(20));
        limiter.check(ip(1)).await.unwrap();
        limiter.check(ip(2)).await.unwrap();
        assert_eq!(limiter.tracked_clients().await, 2);

        tokio::time::sleep(Duration::from_millis(40)).await;
        limiter.sweep().await;
        assert_eq!(limiter.tracked_clients().await, 0);
    }
}
