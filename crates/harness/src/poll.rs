//! Bounded polling for asynchronous state changes.
//!
//! Most waits in the framework are "retry a probe until it produces a value
//! or the budget runs out": service activation, file appearance, lock
//! acquisition, reboot cycles. `Poller` is that loop, with a wall-clock
//! budget, an optional attempt cap, and a single configurable interval
//! between attempts.

use std::future::Future;
use std::task::Poll;
use std::time::{Duration, Instant};

use tracing::warn;

use testbed_common::{Error, Result};

/// Default wall-clock budget for a poll
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(250);

/// Default interval between attempts
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// A bounded retry loop around an async probe.
///
/// The probe returns `Poll::Ready(value)` when the awaited condition holds,
/// `Poll::Pending` to retry after one interval, or an error to abort the
/// loop immediately. Every invocation terminates: with a value, with a
/// `Timeout`/`RetriesExhausted` error, or (in lenient mode) with `None` —
/// never an unbounded wait.
#[derive(Debug, Clone)]
pub struct Poller {
    timeout: Duration,
    interval: Duration,
    max_attempts: Option<u32>,
    message: String,
}

impl Default for Poller {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            interval: DEFAULT_INTERVAL,
            max_attempts: None,
            message: "condition not met".to_string(),
        }
    }
}

impl Poller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wall-clock budget for the whole loop
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sleep between attempts
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Cap on probe invocations, independent of the time budget
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Diagnostic context embedded in the exhaustion error
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Run the probe until it is ready or the budget is exhausted.
    ///
    /// The probe always runs at least once, even with a zero timeout, so
    /// "try at least once" call sites behave as expected. Probe errors
    /// propagate immediately.
    pub async fn run<T, F, Fut>(&self, mut probe: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Poll<T>>>,
    {
        let start = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            if let Poll::Ready(value) = probe().await? {
                return Ok(value);
            }

            if let Some(cap) = self.max_attempts {
                if attempts >= cap {
                    return Err(Error::RetriesExhausted {
                        message: self.message.clone(),
                        attempts,
                    });
                }
            }
            if start.elapsed() >= self.timeout {
                return Err(Error::Timeout {
                    message: self.message.clone(),
                    attempts,
                    elapsed: start.elapsed(),
                });
            }

            tokio::time::sleep(self.interval).await;
        }
    }

    /// Non-throwing variant: exhaustion and probe errors are logged and
    /// surface as `None`, so callers that only branch on the outcome do not
    /// have to unwind.
    pub async fn run_lenient<T, F, Fut>(&self, probe: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Poll<T>>>,
    {
        match self.run(probe).await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Poll gave up: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_poller() -> Poller {
        Poller::new()
            .timeout(Duration::from_millis(500))
            .interval(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_ready_on_nth_attempt_probes_exactly_n_times() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result = fast_poller()
            .run(move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(if n == 4 { Poll::Ready(n) } else { Poll::Pending })
            })
            .await
            .unwrap();
        assert_eq!(result, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_timeout_window() {
        let timeout = Duration::from_millis(200);
        let interval = Duration::from_millis(20);
        let start = Instant::now();
        let err = Poller::new()
            .timeout(timeout)
            .interval(interval)
            .message("marker never appeared")
            .run(|| async { Ok(Poll::<()>::Pending) })
            .await
            .unwrap_err();

        let elapsed = start.elapsed();
        assert!(elapsed >= timeout, "raised early: {:?}", elapsed);
        assert!(
            elapsed < timeout + interval + Duration::from_millis(50),
            "raised late: {:?}",
            elapsed
        );
        assert!(err.to_string().contains("marker never appeared"));
    }

    #[tokio::test]
    async fn test_zero_timeout_still_probes_once() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let err = Poller::new()
            .timeout(Duration::ZERO)
            .run(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Poll::<()>::Pending)
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, Error::Timeout { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn test_max_attempts_cap() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let err = fast_poller()
            .max_attempts(3)
            .run(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Poll::<()>::Pending)
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(err, Error::RetriesExhausted { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn test_probe_error_propagates_immediately() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let err = fast_poller()
            .run(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<Poll<()>, _>(Error::Transport("connection reset".to_string()))
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_lenient_mode_returns_none() {
        let outcome = Poller::new()
            .timeout(Duration::from_millis(50))
            .interval(Duration::from_millis(10))
            .run_lenient(|| async { Ok(Poll::<()>::Pending) })
            .await;
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn test_lenient_mode_swallows_probe_errors() {
        let outcome = Poller::new()
            .run_lenient(|| async {
                Err::<Poll<()>, _>(Error::Transport("unreachable".to_string()))
            })
            .await;
        assert!(outcome.is_none());
    }
}
