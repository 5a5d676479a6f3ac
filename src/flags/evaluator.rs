//! Store-backed flag evaluation.

use std::collections::HashMap;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::model::{decide, evaluate_flag, FeatureFlag, FlagDecision, FlagEvaluation};
use crate::env::{Clock, RandomSource, SystemClock, ThreadRandom};
use crate::store::{DataStore, Query, Row, StoreError};

/// Default table holding flag records.
pub const DEFAULT_FLAG_TABLE: &str = "feature_flags";

/// Where the evaluator reads flags from.
///
/// # Examples
///
/// ```rust
/// use storefront_core::FlagEvaluatorConfig;
///
/// let config: FlagEvaluatorConfig = serde_json::from_str("{}").unwrap();
/// assert_eq!(config.table, "feature_flags");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagEvaluatorConfig {
    /// Table name.
    pub table: String,
}

impl Default for FlagEvaluatorConfig {
    fn default() -> Self {
        Self {
            table: DEFAULT_FLAG_TABLE.to_string(),
        }
    }
}

/// Evaluates flags fetched from a [`DataStore`].
///
/// Lookups never fail from the caller's point of view: a missing flag, a
/// store error or an unreadable row all evaluate to "off". Failures are
/// logged with `tracing`.
///
/// Clock and randomness default to the wall clock and a thread-local
/// generator; replace them with [`with_clock`](Self::with_clock) and
/// [`with_random`](Self::with_random).
///
/// # Examples
///
/// ```rust
/// use serde_json::json;
/// use storefront_core::store::MemoryStore;
/// use storefront_core::FlagEvaluator;
///
/// # tokio_test::block_on(async {
/// let store = MemoryStore::new();
/// store
///     .insert_json(
///         "feature_flags",
///         json!({"key": "wishlist", "enabled": true, "rollout": 100, "payload": {"max": 50}}),
///     )
///     .unwrap();
///
/// let flags = FlagEvaluator::new(store);
/// let wishlist = flags.evaluate("wishlist").await;
/// assert!(wishlist.is_enabled);
/// assert_eq!(wishlist.payload["max"], 50);
///
/// assert!(!flags.evaluate("gift-cards").await.is_enabled);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct FlagEvaluator<S, C = SystemClock, R = ThreadRandom> {
    store: S,
    clock: C,
    random: R,
    config: FlagEvaluatorConfig,
}

impl<S> FlagEvaluator<S> {
    /// Evaluate flags from `store` using the wall clock and thread randomness.
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: SystemClock,
            random: ThreadRandom,
            config: FlagEvaluatorConfig::default(),
        }
    }
}

impl<S, C, R> FlagEvaluator<S, C, R> {
    /// Replace the clock.
    pub fn with_clock<C2>(self, clock: C2) -> FlagEvaluator<S, C2, R> {
        FlagEvaluator {
            store: self.store,
            clock,
            random: self.random,
            config: self.config,
        }
    }

    /// Replace the random source.
    pub fn with_random<R2>(self, random: R2) -> FlagEvaluator<S, C, R2> {
        FlagEvaluator {
            store: self.store,
            clock: self.clock,
            random,
            config: self.config,
        }
    }

    /// Replace the table configuration.
    pub fn with_config(mut self, config: FlagEvaluatorConfig) -> Self {
        self.config = config;
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &FlagEvaluatorConfig {
        &self.config
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S, C, R> FlagEvaluator<S, C, R>
where
    S: DataStore,
    C: Clock,
    R: RandomSource,
{
    /// Evaluate one flag.
    ///
    /// Unknown keys and lookup failures yield `{is_enabled: false, payload: {}}`.
    pub async fn evaluate(&self, key: &str) -> FlagEvaluation {
        let flag = match self.lookup(key).await {
            Ok(Some(flag)) => flag,
            Ok(None) => {
                tracing::debug!(flag = key, "feature flag not found");
                return FlagEvaluation::off(FlagDecision::NotFound);
            }
            Err(err) => {
                tracing::warn!(
                    flag = key,
                    error = %err,
                    "feature flag lookup failed, treating as off"
                );
                return FlagEvaluation::off(FlagDecision::LookupFailed);
            }
        };

        let evaluation = evaluate_flag(&flag, self.clock.now(), &self.random);
        tracing::trace!(flag = key, decision = %evaluation.decision, "feature flag evaluated");
        evaluation
    }

    /// Evaluate several flags with one query, returning only the decisions.
    ///
    /// Keys absent from the store are absent from the map; callers treating a
    /// missing key as `false` should do so explicitly. A store error yields an
    /// empty map. A key stored more than once is reported as `false`, the
    /// same outcome [`evaluate`](Self::evaluate) gives it.
    pub async fn evaluate_all<I, K>(&self, keys: I) -> HashMap<String, bool>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let keys: Vec<String> = keys.into_iter().map(|k| k.as_ref().to_string()).collect();
        if keys.is_empty() {
            return HashMap::new();
        }

        let query = Query::table(&self.config.table).in_list("key", keys);
        let rows = match self.store.fetch_many(&query).await {
            Ok(rows) => rows,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "feature flag batch lookup failed, treating all as off"
                );
                return HashMap::new();
            }
        };

        let mut by_key: HashMap<String, Vec<Row>> = HashMap::new();
        for row in rows {
            let key = row.get("key").and_then(Value::as_str).map(str::to_string);
            match key {
                Some(key) => by_key.entry(key).or_default().push(row),
                None => tracing::warn!("skipping feature flag row without a key"),
            }
        }

        let now = self.clock.now();
        by_key
            .into_iter()
            .filter_map(|(key, mut rows)| {
                if rows.len() > 1 {
                    tracing::warn!(
                        flag = %key,
                        rows = rows.len(),
                        "duplicate feature flag rows, treating as off"
                    );
                    return Some((key, false));
                }
                let flag = match rows.pop().map(decode)? {
                    Ok(flag) => flag,
                    Err(err) => {
                        tracing::warn!(
                            flag = %key,
                            error = %err,
                            "skipping unreadable feature flag row"
                        );
                        return None;
                    }
                };
                Some((key, decide(&flag, now, &self.random).is_active()))
            })
            .collect()
    }

    /// Evaluate several flags concurrently, keeping payloads.
    ///
    /// Unlike [`evaluate_all`](Self::evaluate_all) every requested key is
    /// present in the result, with not-found keys evaluated as off.
    pub async fn evaluate_many<I, K>(&self, keys: I) -> HashMap<String, FlagEvaluation>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let keys: Vec<String> = keys.into_iter().map(|k| k.as_ref().to_string()).collect();
        let evaluations = join_all(keys.iter().map(|key| self.evaluate(key))).await;
        keys.into_iter().zip(evaluations).collect()
    }

    /// Shorthand for `evaluate(key).await.is_enabled`.
    pub async fn is_enabled(&self, key: &str) -> bool {
        self.evaluate(key).await.is_enabled
    }

    async fn lookup(&self, key: &str) -> Result<Option<FeatureFlag>, StoreError> {
        let query = Query::table(&self.config.table).eq("key", key);
        self.store.fetch_one(&query).await?.map(decode).transpose()
    }
}

fn decode(row: Row) -> Result<FeatureFlag, StoreError> {
    serde_json::from_value(Value::Object(row)).map_err(|e| StoreError::Decode(e.to_string()))
}
