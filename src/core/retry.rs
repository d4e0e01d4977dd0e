//! Bounded re-attempts for fallible async operations.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::debug;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

type RetryPredicate<E> = Box<dyn Fn(&E, u32) -> bool + Send + Sync>;

/// Governs [`retry`].
///
/// The delay between attempts is constant; it does not grow with the
/// attempt number.
pub struct RetryOptions<E> {
    pub max_attempts: u32,
    pub delay: Duration,
    /// Called with the error and the 1-based number of the attempt that just
    /// failed. Returning `false` stops retrying immediately.
    pub on_retry: Option<RetryPredicate<E>>,
}

impl<E> Default for RetryOptions<E> {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
            on_retry: None,
        }
    }
}

impl<E> RetryOptions<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn on_retry<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E, u32) -> bool + Send + Sync + 'static,
    {
        self.on_retry = Some(Box::new(predicate));
        self
    }
}

impl<E> fmt::Debug for RetryOptions<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("max_attempts", &self.max_attempts)
            .field("delay", &self.delay)
            .field("on_retry", &self.on_retry.is_some())
            .finish()
    }
}

/// Run `operation` until it succeeds or `max_attempts` is exhausted.
///
/// A `max_attempts` of zero is treated as one. The error of the final
/// attempt is returned unchanged.
pub async fn retry<T, E, F, Fut>(mut operation: F, options: &RetryOptions<E>) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let max_attempts = options.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if attempt >= max_attempts {
            return Err(err);
        }

        if let Some(on_retry) = &options.on_retry {
            if !on_retry(&err, attempt) {
                debug!(attempt, "Not retrying: {err}");
                return Err(err);
            }
        }

        debug!(
            attempt,
            max_attempts,
            delay_ms = options.delay.as_millis() as u64,
            "Retrying after error: {err}"
        );
        tokio::time::sleep(options.delay).await;
        attempt += 1;
    }
}
