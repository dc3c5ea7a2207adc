//! Fixed-interval pacing between outbound calls
//!
//! Providers and model APIs are rate limited; the pipeline inserts a fixed
//! delay between consecutive calls. This is quota politeness, not a
//! correctness requirement.

use std::time::Duration;

use tokio::time::Instant;

/// Spaces calls at least `interval` apart.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    last: Option<Instant>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Wait out the remainder of the interval since the previous call.
    /// The first call never waits.
    pub async fn pace(&mut self) {
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                tokio::time::sleep(self.interval - elapsed).await;
            }
        }
        self.last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_call_does_not_wait() {
        let mut pacer = Pacer::new(Duration::from_secs(60));
        let start = Instant::now();
        pacer.pace().await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn second_call_waits_out_the_interval() {
        let mut pacer = Pacer::new(Duration::from_millis(50));
        let start = Instant::now();
        pacer.pace().await;
        pacer.pace().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn zero_interval_never_waits() {
        let mut pacer = Pacer::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..10 {
            pacer.pace().await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
