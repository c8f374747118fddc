//! Injectable poll timer.
//!
//! The transfer monitor waits between polls through a [`Ticker`] so tests
//! can drive it without wall-clock delays.

use std::time::Duration;

use async_trait::async_trait;

/// Waits out one poll interval.
#[async_trait]
pub trait Ticker: Send + Sync {
    async fn tick(&self);

    /// Nominal interval, used for log messages and bounds.
    fn interval(&self) -> Duration;
}

/// Real timer backed by `tokio::time::sleep`.
#[derive(Debug, Clone, Copy)]
pub struct SleepTicker {
    interval: Duration,
}

impl SleepTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

#[async_trait]
impl Ticker for SleepTicker {
    async fn tick(&self) {
        tokio::time::sleep(self.interval).await;
    }

    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Timer that never waits.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstantTicker;

#[async_trait]
impl Ticker for InstantTicker {
    async fn tick(&self) {
        tokio::task::yield_now().await;
    }

    fn interval(&self) -> Duration {
        Duration::ZERO
    }
}
