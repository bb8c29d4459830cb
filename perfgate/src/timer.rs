use std::time::Duration;
use tokio::time::{interval, Instant, Interval, MissedTickBehavior};

/// Fixed-period ticker for the progress monitors.
pub(crate) struct Ticker {
    interval: Interval,
    started: Instant,
}

impl Ticker {
    pub async fn new(period: Duration) -> Self {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // NOTE: First tick completes instantly
        let started = interval.tick().await;
        Self { interval, started }
    }

    /// Wait for the next tick; returns the time since the ticker was created.
    pub async fn tick(&mut self) -> Duration {
        self.interval.tick().await;
        self.started.elapsed()
    }
}
