//! Testing utilities for code that evaluates flags or retries operations.
//!
//! Provides deterministic clock and randomness, a store that always fails,
//! and assertion macros for flag evaluations.
//!
//! # Examples
//!
//! ## Pinning time and randomness
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use serde_json::json;
//! use storefront_core::store::MemoryStore;
//! use storefront_core::testing::{FixedClock, FixedRandom};
//! use storefront_core::{assert_flag_off, assert_flag_on, FlagEvaluator};
//!
//! # tokio_test::block_on(async {
//! let store = MemoryStore::new();
//! store
//!     .insert_json("feature_flags", json!({"key": "quiz", "enabled": true, "rollout": 40}))
//!     .unwrap();
//!
//! let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap());
//! let flags = FlagEvaluator::new(&store).with_clock(clock);
//!
//! assert_flag_on!(flags.clone().with_random(FixedRandom::new(0.39)).evaluate("quiz").await);
//! assert_flag_off!(flags.with_random(FixedRandom::new(0.40)).evaluate("quiz").await);
//! # });
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::env::{Clock, RandomSource};
use crate::store::{DataStore, Query, Row, StoreError};

/// A clock stuck at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    /// A clock that always reads `at`.
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// A random source that always returns the same draw.
///
/// Values are clamped into `[0, 1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedRandom(f64);

impl FixedRandom {
    /// A source that always draws `value`.
    pub fn new(value: f64) -> Self {
        Self(value.clamp(0.0, ONE_BELOW))
    }
}

impl RandomSource for FixedRandom {
    fn next_unit(&self) -> f64 {
        self.0
    }
}

const ONE_BELOW: f64 = 1.0 - f64::EPSILON;

/// A random source replaying a list of draws, then repeating the last one.
///
/// Clones share the same sequence, so a clone can be handed to an evaluator
/// while the original is kept to inspect [`taken`](Self::taken).
#[derive(Debug, Clone)]
pub struct SequenceRandom {
    inner: Arc<SequenceInner>,
}

#[derive(Debug)]
struct SequenceInner {
    draws: Mutex<VecDeque<f64>>,
    last: Mutex<f64>,
    taken: AtomicUsize,
}

impl SequenceRandom {
    /// Replay `draws` in order.
    pub fn new(draws: impl IntoIterator<Item = f64>) -> Self {
        Self {
            inner: Arc::new(SequenceInner {
                draws: Mutex::new(draws.into_iter().collect()),
                last: Mutex::new(0.0),
                taken: AtomicUsize::new(0),
            }),
        }
    }

    /// How many draws have been taken.
    pub fn taken(&self) -> usize {
        self.inner.taken.load(Ordering::SeqCst)
    }
}

impl RandomSource for SequenceRandom {
    fn next_unit(&self) -> f64 {
        self.inner.taken.fetch_add(1, Ordering::SeqCst);
        let mut last = self.inner.last.lock().unwrap_or_else(|p| p.into_inner());
        let mut draws = self.inner.draws.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(next) = draws.pop_front() {
            *last = next;
        }
        *last
    }
}

/// A data store whose every call fails with [`StoreError::Unavailable`].
#[derive(Debug, Default)]
pub struct FailingStore {
    calls: AtomicUsize,
}

impl FailingStore {
    /// A new failing store.
    pub fn new() -> Self {
        Self::default()
    }

    /// How many calls were attempted.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> Result<T, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

impl DataStore for FailingStore {
    async fn fetch_one(&self, _query: &Query) -> Result<Option<Row>, StoreError> {
        self.fail()
    }

    async fn fetch_many(&self, _query: &Query) -> Result<Vec<Row>, StoreError> {
        self.fail()
    }

    async fn insert(&self, _table: &str, _row: Row) -> Result<(), StoreError> {
        self.fail()
    }

    async fn update(&self, _query: &Query, _patch: Row) -> Result<usize, StoreError> {
        self.fail()
    }

    async fn upsert(
        &self,
        _table: &str,
        _conflict_column: &str,
        _row: Row,
    ) -> Result<(), StoreError> {
        self.fail()
    }
}

/// Assert that a flag evaluation is active.
///
/// # Example
///
/// ```rust
/// use storefront_core::{assert_flag_on, FlagEvaluation};
///
/// assert_flag_on!(FlagEvaluation::active(Default::default()));
/// ```
#[macro_export]
macro_rules! assert_flag_on {
    ($evaluation:expr) => {{
        let evaluation: $crate::FlagEvaluation = $evaluation;
        if !evaluation.is_enabled {
            panic!("Expected flag on, got off ({})", evaluation.decision);
        }
    }};
}

/// Assert that a flag evaluation is inactive, optionally with a specific decision.
///
/// # Example
///
/// ```rust
/// use storefront_core::{assert_flag_off, FlagDecision, FlagEvaluation};
///
/// assert_flag_off!(FlagEvaluation::off(FlagDecision::Expired));
/// assert_flag_off!(FlagEvaluation::off(FlagDecision::Expired), FlagDecision::Expired);
/// ```
#[macro_export]
macro_rules! assert_flag_off {
    ($evaluation:expr) => {{
        let evaluation: $crate::FlagEvaluation = $evaluation;
        if evaluation.is_enabled {
            panic!("Expected flag off, got on with payload {:?}", evaluation.payload);
        }
        assert!(
            evaluation.payload.is_empty(),
            "Expected empty payload for an inactive flag, got {:?}",
            evaluation.payload
        );
    }};
    ($evaluation:expr, $decision:expr) => {{
        let evaluation: $crate::FlagEvaluation = $evaluation;
        $crate::assert_flag_off!(evaluation.clone());
        assert_eq!(evaluation.decision, $decision);
    }};
}

#[cfg(feature = "proptest")]
use proptest::prelude::*;

/// Strategy producing arbitrary flags with timestamps within a few days of `around`.
#[cfg(feature = "proptest")]
pub fn arb_feature_flag(around: DateTime<Utc>) -> BoxedStrategy<crate::FeatureFlag> {
    let offset = || prop::option::of(-72i64..72).prop_map(move |h| h.map(chrono::Duration::hours));
    (
        "[a-z][a-z0-9-]{0,15}",
        any::<bool>(),
        0.0f64..=100.0,
        offset(),
        offset(),
    )
        .prop_map(move |(key, enabled, rollout, start, end)| crate::FeatureFlag {
            key,
            enabled,
            rollout,
            start_at: start.map(|d| around + d),
            end_at: end.map(|d| around + d),
            payload: serde_json::Value::Null,
        })
        .boxed()
}
