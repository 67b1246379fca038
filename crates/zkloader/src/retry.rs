//! Bounded retry with linear backoff on top of [`AcquisitionCoordinator::load`].

use std::time::Duration;

use crate::coordinator::AcquisitionCoordinator;
use crate::events::LoaderEvent;
use crate::types::{LoadError, LoadResult};

impl AcquisitionCoordinator {
    /// Load with up to `max_attempts` attempts.
    ///
    /// After failed attempt `n` (unless it was the last) waits
    /// `n * retry_base_delay` before trying again. A failed `load()` has
    /// already cleared its pending outcome, so each retry runs a fresh
    /// fallback sequence. `max_attempts` of zero is treated as one.
    ///
    /// `EnvironmentUnavailable` is returned as-is; retrying cannot fix it.
    pub async fn preload(&self, max_attempts: u32) -> LoadResult<()> {
        let max_attempts = max_attempts.max(1);
        let base = self.config().retry_base_delay();

        let mut attempt = 1;
        loop {
            tracing::info!("Loading proving toolkit (attempt {attempt}/{max_attempts})");

            let err = match self.load().await {
                Ok(()) => return Ok(()),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => e,
            };

            tracing::warn!("Attempt {attempt} failed: {err}");

            if attempt == max_attempts {
                return Err(LoadError::RetryExhausted {
                    attempts: max_attempts,
                    last: Box::new(err),
                });
            }

            let delay = backoff_delay(base, attempt);
            self.events().emit(LoaderEvent::RetryScheduled {
                attempt,
                max_attempts,
                delay_ms: delay.as_millis() as u64,
            });
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// [`preload`](Self::preload) with the configured attempt budget.
    pub async fn preload_default(&self) -> LoadResult<()> {
        self.preload(self.config().max_attempts).await
    }
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(attempt)
}
