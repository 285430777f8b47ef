//! # Backoff Executor
//!
//! Generic retry wrapper for flaky remote calls.
//!
//! An operation is retried while its error is classified as retryable and
//! attempts remain. Each wait is the current delay plus uniform random jitter,
//! after which the delay grows by the backoff factor. Successful values pass
//! through untouched; the last error is returned once attempts run out, or as
//! soon as the executor's cancellation token fires during a wait.

use bridge_traits::BridgeError;
use core_runtime::config::RetrySettings;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Longest single wait, whatever the factor and attempt count produce.
const MAX_DELAY: Duration = Duration::from_secs(600);

/// Errors that know whether retrying them can help.
pub trait Retryable {
    fn is_retryable(&self) -> bool;

    /// Minimum wait requested by the remote side, if any.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Retryable for BridgeError {
    fn is_retryable(&self) -> bool {
        self.is_transient()
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            BridgeError::RateLimited {
                retry_after_secs: Some(secs),
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

/// Retry tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    /// Upper bound (exclusive) of the jitter added to every wait
    pub max_jitter: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        RetrySettings::default().into()
    }
}

impl From<RetrySettings> for BackoffPolicy {
    fn from(settings: RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_delay: settings.initial_delay,
            backoff_factor: settings.backoff_factor,
            max_jitter: settings.max_jitter,
        }
    }
}

/// Runs operations under a [`BackoffPolicy`].
///
/// # Example
///
/// ```ignore
/// let executor = BackoffExecutor::new(BackoffPolicy::default());
/// let id = executor
///     .execute("create_folder", || destination.create_folder("Photos", None))
///     .await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct BackoffExecutor {
    policy: BackoffPolicy,
    cancellation: Option<CancellationToken>,
}

impl BackoffExecutor {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            cancellation: None,
        }
    }

    /// Stop retrying once `cancellation` fires, returning the last error.
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = Some(cancellation);
        self
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Run `operation`, retrying errors that report themselves as retryable.
    pub async fn execute<T, E, F, Fut>(&self, label: &str, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        self.execute_with(label, operation, |error: &E| error.is_retryable())
            .await
    }

    /// Run `operation`, consulting `classifier` to decide whether an error is retried.
    pub async fn execute_with<T, E, F, Fut, C>(
        &self,
        label: &str,
        mut operation: F,
        classifier: C,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> bool,
        E: Retryable + Display,
    {
        let mut delay = self.policy.initial_delay;
        let mut attempt = 1;

        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !classifier(&error) {
                debug!(operation = label, error = %error, "Non-retryable error");
                return Err(error);
            }

            if attempt >= self.policy.max_attempts {
                error!(
                    operation = label,
                    attempts = attempt,
                    error = %error,
                    "Operation failed after exhausting retries"
                );
                return Err(error);
            }

            let mut wait = delay.saturating_add(self.jitter());
            if let Some(hint) = error.retry_after() {
                wait = wait.max(hint);
            }
            let wait = wait.min(MAX_DELAY);

            warn!(
                operation = label,
                attempt,
                max_attempts = self.policy.max_attempts,
                delay_ms = wait.as_millis() as u64,
                error = %error,
                "Retrying after transient error"
            );

            if !self.wait(wait).await {
                info!(operation = label, attempts = attempt, "Retries cancelled");
                return Err(error);
            }

            delay = next_delay(delay, self.policy.backoff_factor);
            attempt += 1;
        }
    }

    /// Sleep for `wait`; `false` when cancelled first.
    async fn wait(&self, wait: Duration) -> bool {
        match &self.cancellation {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => false,
                    _ = tokio::time::sleep(wait) => true,
                }
            }
            None => {
                if !wait.is_zero() {
                    tokio::time::sleep(wait).await;
                }
                true
            }
        }
    }

    fn jitter(&self) -> Duration {
        if self.policy.max_jitter.is_zero() {
            return Duration::ZERO;
        }
        self.policy.max_jitter.mul_f64(rand::random::<f64>())
    }
}

fn next_delay(delay: Duration, factor: f64) -> Duration {
    Duration::try_from_secs_f64(delay.as_secs_f64() * factor)
        .unwrap_or(MAX_DELAY)
        .min(MAX_DELAY)
}
