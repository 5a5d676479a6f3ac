//! # storefront-core
//!
//! The two pieces of real logic behind the storefront, plus the seams they
//! depend on:
//!
//! - **Retry**: run an async operation again with exponential or flat backoff,
//!   an optional retry predicate and an observer hook
//! - **Feature flags**: decide whether a flag is on from its master switch,
//!   time window and a percentage rollout draw
//!
//! Everything else the storefront does lives in the hosted backend. This crate
//! reaches it only through [`store::DataStore`], and reaches time and
//! randomness only through [`env::Clock`] and [`env::RandomSource`].
//!
//! ## Quick Example
//!
//! ```rust
//! use serde_json::json;
//! use storefront_core::store::MemoryStore;
//! use storefront_core::{retry, FlagEvaluator, RetryPolicy};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let store = MemoryStore::new();
//! store
//!     .insert_json("feature_flags", json!({"key": "loyalty", "enabled": true}))
//!     .unwrap();
//!
//! let flags = FlagEvaluator::new(&store);
//! let flags = &flags;
//! let policy = RetryPolicy::exponential(Duration::from_millis(1)).with_max_retries(2);
//!
//! let loyalty: Result<bool, String> =
//!     retry(move || async move { Ok(flags.is_enabled("loyalty").await) }, &policy).await;
//! assert_eq!(loyalty, Ok(true));
//! # });
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod env;
pub mod flags;
pub mod preferences;
pub mod retry;
pub mod store;
pub mod testing;

// Re-exports
pub use env::{Clock, RandomSource, SystemClock, ThreadRandom};
pub use flags::{
    decide, evaluate_flag, FeatureFlag, FlagDecision, FlagEvaluation, FlagEvaluator,
    FlagEvaluatorConfig,
};
pub use preferences::{PreferenceError, PreferenceStore};
pub use retry::{retry, retry_if, retry_with_hooks, RetryEvent, RetryExecutor, RetryPolicy};
pub use store::{DataStore, RetryingStore, StoreError};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::env::{Clock, RandomSource};
    pub use crate::flags::{FeatureFlag, FlagEvaluation, FlagEvaluator};
    pub use crate::preferences::PreferenceStore;
    pub use crate::retry::{retry, retry_if, RetryExecutor, RetryPolicy};
    pub use crate::store::{DataStore, Query};
}
