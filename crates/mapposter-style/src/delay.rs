use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

/// Seconds to wait before the first backend call (free tiers allow a burst of one).
pub const DEFAULT_WARM_UP: Duration = Duration::from_secs(15);
/// Seconds to wait between rate-limited attempts.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(20);
/// Attempts per input mode, including the first.
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Waiting is injected so retry flows can run without wall-clock time.
#[async_trait]
pub trait Delay: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDelay;

#[async_trait]
impl Delay for TokioDelay {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

pub type DelayRef = Arc<dyn Delay>;

/// Fixed intervals and retry budget for one styling job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StylePacing {
    pub warm_up: Duration,
    pub backoff: Duration,
    pub max_attempts: usize,
}

impl Default for StylePacing {
    fn default() -> Self {
        Self {
            warm_up: DEFAULT_WARM_UP,
            backoff: DEFAULT_BACKOFF,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl StylePacing {
    /// Budget used by the client; a zero budget still allows one attempt.
    pub fn attempts_per_mode(&self) -> usize {
        self.max_attempts.max(1)
    }
}
