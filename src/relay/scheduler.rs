//! Time abstraction and randomized pre-send pacing.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Suspends the caller. Swapped for an instant recorder in tests.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real wall-clock sleeping via tokio.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Waits a uniformly random duration before each send so the outbound
/// cadence never settles into a fixed interval.
pub struct JitteredScheduler {
    sleeper: Arc<dyn Sleeper>,
    rng: Mutex<StdRng>,
}

impl JitteredScheduler {
    pub fn new(sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            sleeper,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic scheduler for reproducible runs.
    pub fn with_seed(sleeper: Arc<dyn Sleeper>, seed: u64) -> Self {
        Self {
            sleeper,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Pick a delay in `[min, max]` (bounds swapped if inverted).
    pub fn pick(&self, min: Duration, max: Duration) -> Duration {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        let lo_ms = lo.as_millis() as u64;
        let hi_ms = hi.as_millis() as u64;
        let ms = match self.rng.lock() {
            Ok(mut rng) => rng.gen_range(lo_ms..=hi_ms),
            Err(poisoned) => poisoned.into_inner().gen_range(lo_ms..=hi_ms),
        };
        Duration::from_millis(ms)
    }

    /// Sleep a random duration in `[min, max]` and return it.
    pub async fn wait_random(&self, min: Duration, max: Duration) -> Duration {
        let delay = self.pick(min, max);
        debug!(delay_ms = delay.as_millis() as u64, "Jittered wait");
        self.sleeper.sleep(delay).await;
        delay
    }
}
