//! Retry with backoff for async operations.
//!
//! Splits the concern the usual way:
//!
//! - **Pure data**: [`RetryPolicy`] describes attempts and delays, with no side effects
//! - **Execution**: [`RetryExecutor`] runs an operation under a policy, sleeping between attempts
//!
//! # Quick Start
//!
//! ```rust
//! use storefront_core::{retry, RetryPolicy};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let policy = RetryPolicy::exponential(Duration::from_millis(1))
//!     .with_max_retries(3);
//!
//! let result: Result<_, String> = retry(|| async { Ok(42) }, &policy).await;
//! assert_eq!(result, Ok(42));
//! # });
//! ```
//!
//! # Variants
//!
//! - **Unconditional** ([`retry`], [`RetryExecutor::new`]): every failure is retried,
//!   waiting `initial_delay * backoff_multiplier^n` before retry `n`
//! - **Condition-gated** ([`retry_if`], [`RetryExecutor::when`]): a predicate decides per
//!   failure; rejected errors return at once and retries wait a flat `initial_delay`
//!
//! Either variant accepts an `on_retry` hook receiving a [`RetryEvent`].
//! Errors are never wrapped: the caller sees the operation's last error.

mod executor;
mod policy;

pub use executor::{retry, retry_if, retry_with_hooks, RetryEvent, RetryExecutor};
pub use policy::{
    RetryPolicy, DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_DELAY, DEFAULT_MAX_RETRIES,
};

#[cfg(test)]
mod tests;
