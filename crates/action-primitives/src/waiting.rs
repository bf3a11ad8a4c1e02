//! Bounded polling used by every wait and assertion.
//!
//! A check is re-run every `interval` until it reports ready, the timeout
//! elapses or the context is cancelled. There are no retries beyond this
//! single bounded loop.

use crate::{errors::ActionError, types::ExecCtx};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::trace;

/// Default polling cadence for waits and expectations.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Timeout applied to `wait_for*` operations without an explicit value.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Timeout applied to expectations without an explicit value.
pub const DEFAULT_ASSERTION_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Result of one check attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Check<T> {
    Ready(T),
    /// Not there yet; carries what was observed for the failure message.
    Pending(Option<String>),
}

/// Returned when the timeout elapses before the check is ready.
#[derive(Debug, Clone, PartialEq)]
pub struct Stalled {
    pub waited: Duration,
    pub attempts: u32,
    pub last_observed: Option<String>,
}

impl Stalled {
    pub fn describe(&self) -> String {
        match &self.last_observed {
            Some(seen) => format!(
                "after {}ms ({} attempts), last observed {seen}",
                self.waited.as_millis(),
                self.attempts
            ),
            None => format!(
                "after {}ms ({} attempts)",
                self.waited.as_millis(),
                self.attempts
            ),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: POLL_INTERVAL,
        }
    }
}

impl PollSettings {
    /// Runs `check` until ready. It always runs at least once, even with
    /// a zero timeout. Hard errors from `check` end the loop immediately.
    pub async fn until<T, F, Fut>(
        &self,
        ctx: &ExecCtx,
        timeout: Duration,
        mut check: F,
    ) -> Result<Result<T, Stalled>, ActionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Check<T>, ActionError>>,
    {
        let started = Instant::now();
        let deadline = started + timeout;
        let mut attempts = 0u32;
        let mut last_observed = None;

        loop {
            if ctx.is_cancelled() {
                return Err(ActionError::Interrupted("Context cancelled".to_string()));
            }

            attempts += 1;
            match check().await? {
                Check::Ready(value) => return Ok(Ok(value)),
                Check::Pending(observed) => {
                    if observed.is_some() {
                        last_observed = observed;
                    }
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(Err(Stalled {
                    waited: now.duration_since(started),
                    attempts,
                    last_observed,
                }));
            }
            trace!(target: "action-primitives", attempts, "condition pending");
            sleep(self.interval.min(deadline - now)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_adapter::PageId;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn ctx() -> ExecCtx {
        ExecCtx::new(PageId::new(), Duration::from_secs(30))
    }

    fn fast() -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn resolves_once_check_is_ready() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let outcome = fast()
            .until(&ctx(), Duration::from_secs(1), move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(if n == 3 {
                    Check::Ready(n)
                } else {
                    Check::Pending(None)
                })
            })
            .await
            .unwrap();
        assert_eq!(outcome, Ok(3));
    }

    #[tokio::test]
    async fn stalls_with_last_observation() {
        let outcome = fast()
            .until::<(), _, _>(&ctx(), Duration::from_millis(30), || async {
                Ok(Check::Pending(Some("'5'".to_string())))
            })
            .await
            .unwrap();
        let stalled = outcome.unwrap_err();
        assert!(stalled.attempts >= 2);
        assert_eq!(stalled.last_observed.as_deref(), Some("'5'"));
        assert!(stalled.describe().contains("last observed '5'"));
    }

    #[tokio::test]
    async fn zero_timeout_still_checks_once() {
        let outcome = fast()
            .until(&ctx(), Duration::ZERO, || async { Ok(Check::Ready("now")) })
            .await
            .unwrap();
        assert_eq!(outcome, Ok("now"));
    }

    #[tokio::test]
    async fn check_errors_abort_the_loop() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let err = fast()
            .until::<(), _, _>(&ctx(), Duration::from_secs(1), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ActionError::CdpIo("link closed".into()))
            })
            .await
            .unwrap_err();
        assert_eq!(err, ActionError::CdpIo("link closed".into()));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_interrupts() {
        let ctx = ctx();
        ctx.cancel_token.cancel();
        let err = fast()
            .until::<(), _, _>(&ctx, Duration::from_secs(1), || async {
                Ok(Check::Pending(None))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Interrupted(_)));
    }
}
