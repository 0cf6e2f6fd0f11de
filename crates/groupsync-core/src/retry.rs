//! Exponential backoff retry policy for remote directory calls.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::SyncError;
use crate::observer::{SyncEvent, SyncObserver, TracingObserver};

/// Suspends the calling task between retry attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Sleep for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Real wall-clock sleeper backed by `tokio::time::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Retry policy configuration.
///
/// `tries` counts total attempts, so `tries = 1` disables retrying.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Total number of attempts.
    pub tries: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    pub backoff: f64,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    sleeper: Arc<dyn Sleeper>,
    observer: Arc<dyn SyncObserver>,
    cancel: Option<CancellationToken>,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("tries", &self.tries)
            .field("base_delay", &self.base_delay)
            .field("backoff", &self.backoff)
            .field("max_delay", &self.max_delay)
            .field("cancellable", &self.cancel.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(500), 2.0, Duration::from_secs(8))
    }
}

impl RetryPolicy {
    /// Create a policy with real sleeping and tracing output.
    #[must_use]
    pub fn new(tries: u32, base_delay: Duration, backoff: f64, max_delay: Duration) -> Self {
        Self {
            tries: tries.max(1),
            base_delay,
            backoff,
            max_delay,
            sleeper: Arc::new(TokioSleeper),
            observer: Arc::new(TracingObserver),
            cancel: None,
        }
    }

    /// Replace the sleeper (tests use one that records instead of waiting).
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Replace the observer that receives retry events.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Abort attempts and sleeps once `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Delay to wait after the `attempt`-th failure (1-based).
    ///
    /// `min(base_delay * backoff^(attempt-1), max_delay)`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.backoff.powi(exponent);
        let max = self.max_delay.as_secs_f64();
        if !secs.is_finite() || secs >= max {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs.max(0.0))
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Execute `op` until it succeeds, fails with a non-retryable error, or
    /// `tries` attempts have failed with retryable errors.
    ///
    /// The last retryable error is returned unchanged once attempts run out.
    pub async fn execute<T, E, F, Fut, P>(
        &self,
        operation_name: &str,
        is_retryable: P,
        op: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display + From<SyncError>,
    {
        self.execute_with_hint(operation_name, is_retryable, |_: &E| None, op)
            .await
    }

    /// Like [`execute`](Self::execute), but a failure may dictate its own wait.
    ///
    /// When `delay_hint` returns a duration it replaces the backoff delay for
    /// that attempt, capped at `max_delay`.
    pub async fn execute_with_hint<T, E, F, Fut, P, H>(
        &self,
        operation_name: &str,
        is_retryable: P,
        delay_hint: H,
        mut op: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        H: Fn(&E) -> Option<Duration>,
        E: std::fmt::Display + From<SyncError>,
    {
        let mut attempt: u32 = 0;
        loop {
            if self.is_cancelled() {
                return Err(SyncError::Cancelled.into());
            }

            attempt += 1;
            let error = match op().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !is_retryable(&error) {
                return Err(error);
            }

            if attempt >= self.tries {
                self.observer.on_event(&SyncEvent::RetriesExhausted {
                    operation: operation_name.to_string(),
                    attempts: attempt,
                    error: error.to_string(),
                });
                return Err(error);
            }

            let delay = delay_hint(&error)
                .map_or_else(|| self.delay_for(attempt), |hint| hint.min(self.max_delay));
            self.observer.on_event(&SyncEvent::RetryScheduled {
                operation: operation_name.to_string(),
                attempt,
                delay,
                error: error.to_string(),
            });

            match &self.cancel {
                Some(token) => {
                    tokio::select! {
                        () = token.cancelled() => return Err(SyncError::Cancelled.into()),
                        () = self.sleeper.sleep(delay) => {}
                    }
                }
                None => self.sleeper.sleep(delay).await,
            }
        }
    }

    /// [`execute`](Self::execute) with [`SyncError::is_retryable`] as the
    /// predicate, honoring `Retry-After` on rate-limited responses.
    pub async fn run<T, F, Fut>(&self, operation_name: &str, op: F) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SyncError>>,
    {
        self.execute_with_hint(operation_name, SyncError::is_retryable, SyncError::retry_after, op)
            .await
    }
}
