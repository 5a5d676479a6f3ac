//! Flag records and the pure gating function.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::env::RandomSource;

fn full_rollout() -> f64 {
    100.0
}

/// A feature flag as stored by the backend.
///
/// Read-only from this crate's point of view. Column names follow the
/// storefront's `feature_flags` table; the older `is_enabled`,
/// `rollout_percentage`, `start_date` and `end_date` spellings are accepted.
///
/// # Examples
///
/// ```rust
/// use serde_json::json;
/// use storefront_core::FeatureFlag;
///
/// let flag: FeatureFlag = serde_json::from_value(json!({
///     "key": "summer-sale-banner",
///     "is_enabled": true,
///     "rollout_percentage": 50,
///     "end_date": "2026-09-01T00:00:00Z",
///     "payload": {"discount": 15}
/// }))
/// .unwrap();
///
/// assert!(flag.enabled);
/// assert_eq!(flag.rollout, 50.0);
/// assert!(flag.start_at.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureFlag {
    /// Unique identifier.
    pub key: String,
    /// Master switch.
    #[serde(alias = "is_enabled")]
    pub enabled: bool,
    /// Percentage of evaluations that see the flag active, in `[0, 100]`.
    #[serde(alias = "rollout_percentage", default = "full_rollout")]
    pub rollout: f64,
    /// Inclusive start of the active window.
    #[serde(alias = "start_date", default)]
    pub start_at: Option<DateTime<Utc>>,
    /// Inclusive end of the active window.
    #[serde(alias = "end_date", default)]
    pub end_at: Option<DateTime<Utc>>,
    /// Opaque data delivered with an active decision.
    #[serde(default)]
    pub payload: Value,
}

impl FeatureFlag {
    /// A flag that is switched on for everyone, with no window and no payload.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            enabled: true,
            rollout: 100.0,
            start_at: None,
            end_at: None,
            payload: Value::Null,
        }
    }

    /// Set the master switch.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the rollout percentage.
    pub fn with_rollout(mut self, rollout: f64) -> Self {
        self.rollout = rollout;
        self
    }

    /// Set the active window. Either bound may be open.
    pub fn with_window(
        mut self,
        start_at: Option<DateTime<Utc>>,
        end_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.start_at = start_at;
        self.end_at = end_at;
        self
    }

    /// Set the payload.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Where `now` falls relative to the active window.
    ///
    /// Both bounds are inclusive.
    pub fn window_decision(&self, now: DateTime<Utc>) -> Option<FlagDecision> {
        if self.start_at.is_some_and(|start| now < start) {
            return Some(FlagDecision::NotStarted);
        }
        if self.end_at.is_some_and(|end| now > end) {
            return Some(FlagDecision::Expired);
        }
        None
    }

    /// The payload as a key-value map, or empty if it is not an object.
    pub fn payload_map(&self) -> Map<String, Value> {
        match &self.payload {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        }
    }
}

/// How an evaluation ended.
///
/// Each evaluation moves from unknown to looked-up and then to exactly one
/// terminal decision. Only [`Active`](Self::Active) turns the feature on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagDecision {
    /// No flag with that key exists.
    NotFound,
    /// The store could not be queried or returned an unreadable row.
    LookupFailed,
    /// `now` is before the window opens.
    NotStarted,
    /// `now` is after the window closed.
    Expired,
    /// The master switch is off.
    Disabled,
    /// The rollout draw landed outside the percentage.
    RolloutExcluded,
    /// The feature is on.
    Active,
}

impl FlagDecision {
    /// True only for [`Active`](Self::Active).
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    /// True when the time window rejected the evaluation.
    pub fn is_time_gated(self) -> bool {
        matches!(self, Self::NotStarted | Self::Expired)
    }
}

impl std::fmt::Display for FlagDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotFound => "not found",
            Self::LookupFailed => "lookup failed",
            Self::NotStarted => "not started",
            Self::Expired => "expired",
            Self::Disabled => "disabled",
            Self::RolloutExcluded => "outside rollout",
            Self::Active => "active",
        };
        f.write_str(s)
    }
}

/// The outcome of one evaluation.
///
/// `is_enabled` is authoritative. `payload` is empty unless the flag is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagEvaluation {
    /// Whether the feature is on for this evaluation.
    pub is_enabled: bool,
    /// The flag's payload when active, otherwise empty.
    pub payload: Map<String, Value>,
    /// The terminal state the evaluation reached.
    pub decision: FlagDecision,
}

impl FlagEvaluation {
    /// An inactive evaluation with an empty payload.
    pub fn off(decision: FlagDecision) -> Self {
        Self {
            is_enabled: false,
            payload: Map::new(),
            decision,
        }
    }

    /// An active evaluation carrying `payload`.
    pub fn active(payload: Map<String, Value>) -> Self {
        Self {
            is_enabled: true,
            payload,
            decision: FlagDecision::Active,
        }
    }

    pub(crate) fn from_decision(flag: &FeatureFlag, decision: FlagDecision) -> Self {
        if decision.is_active() {
            Self::active(flag.payload_map())
        } else {
            Self::off(decision)
        }
    }
}

/// Decide a single flag at `now`.
///
/// The time window is checked first; the master switch next; the rollout
/// draw last. A draw is only taken when the switch is on, so a disabled or
/// out-of-window flag never consumes randomness. The draw is not cached:
/// repeated evaluations of the same flag may land on different sides of the
/// rollout.
///
/// # Examples
///
/// ```rust
/// use chrono::Utc;
/// use storefront_core::{evaluate_flag, FeatureFlag, FlagDecision};
///
/// let flag = FeatureFlag::new("loyalty-points").with_rollout(30.0);
///
/// let low = evaluate_flag(&flag, Utc::now(), &|| 0.10);
/// assert!(low.is_enabled);
///
/// let high = evaluate_flag(&flag, Utc::now(), &|| 0.90);
/// assert_eq!(high.decision, FlagDecision::RolloutExcluded);
/// ```
pub fn evaluate_flag<R>(flag: &FeatureFlag, now: DateTime<Utc>, random: &R) -> FlagEvaluation
where
    R: RandomSource + ?Sized,
{
    FlagEvaluation::from_decision(flag, decide(flag, now, random))
}

/// The terminal decision for `flag`, without building a payload.
pub fn decide<R>(flag: &FeatureFlag, now: DateTime<Utc>, random: &R) -> FlagDecision
where
    R: RandomSource + ?Sized,
{
    if let Some(gated) = flag.window_decision(now) {
        return gated;
    }
    if !flag.enabled {
        return FlagDecision::Disabled;
    }
    let draw = random.next_unit() * 100.0;
    if draw < flag.rollout {
        FlagDecision::Active
    } else {
        FlagDecision::RolloutExcluded
    }
}
