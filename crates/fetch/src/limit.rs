//! Process-wide upstream rate limiter.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};

/// Enforces a minimum spacing between upstream requests.
///
/// One instance is shared by every worker (the upstream throttles per
/// source address, not per task). Each `acquire` reserves the next free
/// slot under the lock and then waits for it outside the lock, so
/// concurrent callers line up in slots spaced `min_interval` apart rather
/// than stampeding when the lock frees up.
#[derive(Debug)]
pub struct Limiter {
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl Limiter {
    pub fn new(min_interval: Duration) -> Self {
        Self { min_interval, next_slot: Mutex::new(None) }
    }

    /// Wait until this caller's reserved slot arrives.
    pub async fn acquire(&self) {
        if self.min_interval.is_zero() {
            return;
        }
        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next {
                Some(reserved) if reserved > now => reserved,
                _ => now,
            };
            *next = Some(slot + self.min_interval);
            slot
        };
        sleep_until(slot).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_spacing_is_enforced() {
        let limiter = Limiter::new(Duration::from_millis(20));
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        // First slot is immediate, then two spaced intervals.
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_concurrent_callers_take_distinct_slots() {
        let limiter = Arc::new(Limiter::new(Duration::from_millis(15)));
        let start = Instant::now();
        let tasks: Vec<_> = (0..3)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move { limiter.acquire().await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_zero_interval_is_free() {
        let limiter = Limiter::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..100 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
