//! Leading-edge throttle whose callers share the leading call's result.
//!
//! The first call in a fresh window starts the work; every call arriving
//! before the window elapses awaits that same work and receives a clone of
//! its output, success or failure. Nothing is queued and nothing is
//! re-invoked until the window has passed.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::time::Instant;
use tracing::debug;

struct Window<T> {
    opened_at: Instant,
    result: Shared<BoxFuture<'static, T>>,
}

pub struct Throttle<T> {
    window: Duration,
    current: Mutex<Option<Window<T>>>,
}

impl<T> Throttle<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            current: Mutex::new(None),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Run `f` if no window is open, otherwise join the open window's call.
    pub async fn run<F, Fut>(&self, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let shared = {
            let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
            let now = Instant::now();
            match current.as_ref() {
                Some(open) if now.duration_since(open.opened_at) < self.window => {
                    debug!("Throttled call joins the open window");
                    open.result.clone()
                }
                _ => {
                    let result = f().boxed().shared();
                    *current = Some(Window {
                        opened_at: now,
                        result: result.clone(),
                    });
                    result
                }
            }
        };
        shared.await
    }

    /// Close the current window so the next call runs immediately.
    pub fn reset(&self) {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

/// A function guarded by a [`Throttle`]; see [`throttle`].
pub struct Throttled<F, T> {
    f: F,
    throttle: Throttle<T>,
}

/// Wrap `f` so calls within `window` of a leading call share its result.
///
/// Arguments of joining calls are ignored; they observe the leading call's
/// output.
pub fn throttle<F, T>(f: F, window: Duration) -> Throttled<F, T>
where
    T: Clone + Send + Sync + 'static,
{
    Throttled {
        f,
        throttle: Throttle::new(window),
    }
}

impl<F, T> Throttled<F, T>
where
    T: Clone + Send + Sync + 'static,
{
    pub async fn call<A, Fut>(&self, args: A) -> T
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        self.throttle.run(|| (self.f)(args)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn counting(
        calls: &Arc<AtomicU32>,
    ) -> impl Fn(u32) -> BoxFuture<'static, Result<u32, String>> {
        let calls = Arc::clone(calls);
        move |arg| {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(call * 100 + arg)
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn calls_within_window_share_one_invocation() {
        let calls = Arc::new(AtomicU32::new(0));
        let guarded = throttle(counting(&calls), Duration::from_millis(5000));

        let first = guarded.call(1).await;
        tokio::time::advance(Duration::from_millis(1000)).await;
        let second = guarded.call(2).await;

        assert_eq!(first, Ok(101));
        assert_eq!(second, first);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn call_after_window_invokes_again() {
        let calls = Arc::new(AtomicU32::new(0));
        let guarded = throttle(counting(&calls), Duration::from_millis(5000));

        assert_eq!(guarded.call(1).await, Ok(101));
        tokio::time::advance(Duration::from_millis(5000)).await;
        assert_eq!(guarded.call(2).await, Ok(202));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_join_the_in_flight_call() {
        let calls = Arc::new(AtomicU32::new(0));
        let guarded = throttle(counting(&calls), Duration::from_millis(5000));

        let (a, b, c) = tokio::join!(guarded.call(1), guarded.call(2), guarded.call(3));

        assert_eq!(a, Ok(101));
        assert_eq!(b, a);
        assert_eq!(c, a);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_shared_too() {
        let calls = Arc::new(AtomicU32::new(0));
        let throttle: Throttle<Result<u32, String>> = Throttle::new(Duration::from_millis(50));

        let run = || {
            let calls = Arc::clone(&calls);
            throttle.run(move || async move {
                let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err(format!("boom {call}"))
            })
        };

        assert_eq!(run().await, Err("boom 1".to_string()));
        assert_eq!(run().await, Err("boom 1".to_string()));

        throttle.reset();
        assert_eq!(run().await, Err("boom 2".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
