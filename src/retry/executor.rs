//! Runs operations under a [`RetryPolicy`].

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use super::policy::RetryPolicy;

type Predicate<E> = Box<dyn Fn(&E) -> bool + Send + Sync>;
type Hook<E> = Box<dyn Fn(&RetryEvent<'_, E>) + Send + Sync>;

/// Information about a retry, passed to the `on_retry` hook.
#[derive(Debug, Clone)]
pub struct RetryEvent<'a, E> {
    /// Which retry is about to happen (1-indexed).
    pub attempt: u32,
    /// The error from the failed attempt.
    pub error: &'a E,
    /// Delay before the next attempt.
    pub delay: Duration,
    /// Total elapsed time since the first attempt.
    pub elapsed: Duration,
}

/// Executes an async operation with retries.
///
/// Without a predicate every failure is retried with exponential backoff
/// until the policy is exhausted. With a predicate ([`when`](Self::when)) a
/// failure the predicate rejects is returned at once, and retries wait a flat
/// `initial_delay`.
///
/// The operation's own error is returned unchanged.
///
/// # Examples
///
/// ```rust
/// use storefront_core::{RetryExecutor, RetryPolicy};
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let calls = AtomicU32::new(0);
/// let calls = &calls;
/// let executor = RetryExecutor::new(
///     RetryPolicy::exponential(Duration::from_millis(1)).with_max_retries(3),
/// );
///
/// let result = executor
///     .execute(move || async move {
///         if calls.fetch_add(1, Ordering::SeqCst) < 2 {
///             Err("catalog unavailable")
///         } else {
///             Ok("catalog")
///         }
///     })
///     .await;
///
/// assert_eq!(result, Ok("catalog"));
/// assert_eq!(calls.load(Ordering::SeqCst), 3);
/// # });
/// ```
pub struct RetryExecutor<E> {
    policy: RetryPolicy,
    should_retry: Option<Predicate<E>>,
    on_retry: Option<Hook<E>>,
}

impl<E> std::fmt::Debug for RetryExecutor<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("policy", &self.policy)
            .field("gated", &self.should_retry.is_some())
            .field("has_hook", &self.on_retry.is_some())
            .finish()
    }
}

impl<E> RetryExecutor<E> {
    /// Create an executor that retries every failure.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            should_retry: None,
            on_retry: None,
        }
    }

    /// Only retry errors the predicate accepts. Switches to flat delays.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use storefront_core::{RetryExecutor, RetryPolicy};
    /// use std::time::Duration;
    ///
    /// #[derive(Debug, PartialEq)]
    /// enum CartError { Timeout, OutOfStock }
    ///
    /// # tokio_test::block_on(async {
    /// let executor = RetryExecutor::new(
    ///     RetryPolicy::constant(Duration::from_millis(1)).with_max_retries(3),
    /// )
    /// .when(|e: &CartError| matches!(e, CartError::Timeout));
    ///
    /// // Out of stock is permanent: no retry
    /// let result: Result<(), _> = executor.execute(|| async { Err(CartError::OutOfStock) }).await;
    /// assert_eq!(result, Err(CartError::OutOfStock));
    /// # });
    /// ```
    pub fn when<P>(mut self, should_retry: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Some(Box::new(should_retry));
        self
    }

    /// Observe each retry just before its wait.
    ///
    /// The hook is synchronous and never affects control flow; use it for
    /// logging or metrics.
    pub fn on_retry<H>(mut self, on_retry: H) -> Self
    where
        H: Fn(&RetryEvent<'_, E>) + Send + Sync + 'static,
    {
        self.on_retry = Some(Box::new(on_retry));
        self
    }

    /// The policy this executor runs.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Whether a retry predicate is configured.
    pub fn is_gated(&self) -> bool {
        self.should_retry.is_some()
    }

    /// Run `operation` until it succeeds, the policy is exhausted, or the
    /// predicate rejects an error.
    ///
    /// The operation is invoked at most `max_retries + 1` times.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let start = Instant::now();
        let mut attempt = 0u32;

        loop {
            let error = match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::debug!(attempts = attempt + 1, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let next_delay = if self.is_gated() {
                self.policy.gated_delay_for_attempt(attempt)
            } else {
                self.policy.delay_for_attempt(attempt)
            };
            let Some(delay) = next_delay else {
                tracing::warn!(
                    attempts = attempt + 1,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "retries exhausted"
                );
                return Err(error);
            };

            if let Some(should_retry) = &self.should_retry {
                if !should_retry(&error) {
                    tracing::debug!(attempts = attempt + 1, "error is not retryable");
                    return Err(error);
                }
            }

            if let Some(on_retry) = &self.on_retry {
                let event = RetryEvent {
                    attempt: attempt + 1,
                    error: &error,
                    delay,
                    elapsed: start.elapsed(),
                };
                on_retry(&event);
            }

            tracing::debug!(
                retry = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "operation failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Retry every failure with exponential backoff.
///
/// # Examples
///
/// ```rust
/// use storefront_core::{retry, RetryPolicy};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let policy = RetryPolicy::exponential(Duration::from_millis(1)).with_max_retries(2);
/// let result: Result<u32, &str> = retry(|| async { Err("offline") }, &policy).await;
/// assert_eq!(result, Err("offline"));
/// # });
/// ```
pub async fn retry<T, E, F, Fut>(operation: F, policy: &RetryPolicy) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    RetryExecutor::new(policy.clone()).execute(operation).await
}

/// Retry only when the predicate returns true for the error.
///
/// Non-retryable errors immediately propagate without retry attempts.
/// Retries wait a flat `initial_delay`.
pub async fn retry_if<T, E, F, Fut, P>(
    operation: F,
    policy: &RetryPolicy,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool + Send + Sync + 'static,
{
    RetryExecutor::new(policy.clone())
        .when(should_retry)
        .execute(operation)
        .await
}

/// Retry every failure, calling `on_retry` before each wait.
pub async fn retry_with_hooks<T, E, F, Fut, H>(
    operation: F,
    policy: &RetryPolicy,
    on_retry: H,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    H: Fn(&RetryEvent<'_, E>) + Send + Sync + 'static,
{
    RetryExecutor::new(policy.clone())
        .on_retry(on_retry)
        .execute(operation)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_retry_success() {
        let result: Result<_, String> = retry(
            || async { Ok(42) },
            &RetryPolicy::constant(Duration::from_millis(1)).with_max_retries(3),
        )
        .await;

        assert_eq!(result, Ok(42));
    }

    #[tokio::test]
    async fn test_retry_exhausted() {
        let result: Result<i32, _> = retry(
            || async { Err("error".to_string()) },
            &RetryPolicy::constant(Duration::from_millis(1)).with_max_retries(2),
        )
        .await;

        assert_eq!(result, Err("error".to_string()));
    }

    #[tokio::test]
    async fn test_retry_if_non_retryable() {
        #[derive(Debug, PartialEq, Clone)]
        enum TestError {
            Transient,
            Permanent,
        }

        let result: Result<(), _> = retry_if(
            || async { Err(TestError::Permanent) },
            &RetryPolicy::constant(Duration::from_millis(1)).with_max_retries(3),
            |err| matches!(err, TestError::Transient),
        )
        .await;

        assert_eq!(result, Err(TestError::Permanent));
    }

    #[test]
    fn test_executor_debug() {
        let executor = RetryExecutor::<String>::new(RetryPolicy::default()).when(|_| true);
        let debug = format!("{:?}", executor);
        assert!(debug.contains("RetryExecutor"));
        assert!(debug.contains("gated: true"));
        assert!(executor.is_gated());
    }
}
