// Synthetic progress for transfers that do not report bytes sent

use std::future::Future;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Highest value the animation may show. 100 is reserved for a finished transfer.
pub const SYNTHETIC_CAP: f64 = 99.0;
const MAX_STEP: f64 = 10.0;

/// Time based progress estimate, independent of the bytes actually sent.
#[derive(Debug, Default, Clone)]
pub struct SyntheticProgress {
    value: f64,
}

impl SyntheticProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a random increment in `[0, 10)`.
    pub fn step(&mut self) -> u8 {
        self.advance(rand::random::<f64>() * MAX_STEP)
    }

    pub fn advance(&mut self, increment: f64) -> u8 {
        self.value = (self.value + increment.max(0.0)).min(SYNTHETIC_CAP);
        self.percent()
    }

    pub fn percent(&self) -> u8 {
        self.value.floor() as u8
    }
}

/// Awaits `transfer`, calling `report` with a new estimate on every `tick`
/// until the transfer resolves. The transfer wins ties with the timer.
pub async fn with_synthetic_progress<F, R>(transfer: F, tick: Duration, mut report: R) -> F::Output
where
    F: Future,
    R: FnMut(u8),
{
    tokio::pin!(transfer);
    let mut progress = SyntheticProgress::new();
    let mut ticker = interval_at(Instant::now() + tick, tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            output = &mut transfer => return output,
            _ = ticker.tick() => report(progress.step()),
        }
    }
}
