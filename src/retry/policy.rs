//! Retry policy types and configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of retries after the first failure.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default wait before the first retry.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(1000);
/// Default geometric growth factor between waits.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// A retry policy describing how to retry failed operations.
///
/// Policies are pure data - they describe retry behavior but don't execute it.
/// This makes them easy to test, clone, and inspect. Run one with
/// [`RetryExecutor`](super::RetryExecutor).
///
/// The wait before retry `n` (0-indexed) is
/// `initial_delay * backoff_multiplier^n`, capped by `max_delay` when set.
/// Condition-gated retries use a flat `initial_delay` instead.
///
/// # Examples
///
/// ```rust
/// use storefront_core::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.max_retries(), 3);
/// assert_eq!(policy.initial_delay(), Duration::from_millis(1000));
///
/// let policy = RetryPolicy::exponential(Duration::from_millis(100))
///     .with_max_retries(2);
/// assert_eq!(policy.delay_for_attempt(0), Some(Duration::from_millis(100)));
/// assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_millis(200)));
/// assert_eq!(policy.delay_for_attempt(2), None); // max_retries reached
/// ```
///
/// Policies also deserialize from configuration, with every field optional:
///
/// ```rust
/// use storefront_core::RetryPolicy;
/// use std::time::Duration;
///
/// let policy: RetryPolicy =
///     serde_json::from_str(r#"{"max_retries": 5, "initial_delay_ms": 250}"#).unwrap();
/// assert_eq!(policy.max_retries(), 5);
/// assert_eq!(policy.initial_delay(), Duration::from_millis(250));
/// assert_eq!(policy.backoff_multiplier(), 2.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    max_retries: u32,
    #[serde(rename = "initial_delay_ms", with = "millis")]
    initial_delay: Duration,
    backoff_multiplier: f64,
    #[serde(
        rename = "max_delay_ms",
        with = "opt_millis",
        skip_serializing_if = "Option::is_none"
    )]
    max_delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: DEFAULT_INITIAL_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_delay: None,
        }
    }
}

impl RetryPolicy {
    /// Create a policy whose delay doubles each retry, starting at `initial`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use storefront_core::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::exponential(Duration::from_millis(100))
    ///     .with_max_retries(5);
    ///
    /// // Delay doubles: 100ms, 200ms, 400ms, 800ms, 1600ms
    /// assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_millis(400)));
    /// ```
    pub fn exponential(initial: Duration) -> Self {
        Self {
            initial_delay: initial,
            ..Self::default()
        }
    }

    /// Create a policy with the same delay before every retry.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use storefront_core::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::constant(Duration::from_millis(500))
    ///     .with_max_retries(3);
    ///
    /// assert_eq!(policy.delay_for_attempt(0), Some(Duration::from_millis(500)));
    /// assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_millis(500)));
    /// assert_eq!(policy.delay_for_attempt(3), None);
    /// ```
    pub fn constant(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            backoff_multiplier: 1.0,
            ..Self::default()
        }
    }

    /// Set the maximum number of retry attempts.
    ///
    /// This does not include the initial attempt. For example, `with_max_retries(3)`
    /// means up to 4 total attempts (1 initial + 3 retries).
    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Set the wait before the first retry.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the geometric growth factor between waits.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Set the maximum delay cap.
    ///
    /// Delays will never exceed this value, regardless of the multiplier.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use storefront_core::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::exponential(Duration::from_millis(100))
    ///     .with_max_retries(10)
    ///     .with_max_delay(Duration::from_millis(300));
    ///
    /// assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_millis(200)));
    /// assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_millis(300)));
    /// ```
    pub fn with_max_delay(mut self, d: Duration) -> Self {
        self.max_delay = Some(d);
        self
    }

    /// Get the maximum number of retries.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Get the wait before the first retry.
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Get the backoff multiplier.
    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    /// Get the maximum delay cap.
    pub fn max_delay(&self) -> Option<Duration> {
        self.max_delay
    }

    /// Calculate the exponential delay before retry N (0-indexed).
    ///
    /// Returns None if no more retries should be attempted.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_retries {
            return None;
        }
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let factor = self.backoff_multiplier.powi(exponent);
        let nanos = self.initial_delay.as_nanos() as f64 * factor;
        Some(self.cap(duration_from_nanos(nanos)))
    }

    /// Calculate the flat delay used by condition-gated retries.
    ///
    /// Returns None if no more retries should be attempted.
    pub fn gated_delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_retries {
            return None;
        }
        Some(self.cap(self.initial_delay))
    }

    /// Total number of times an operation may run under this policy.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Validate the multiplier.
    ///
    /// Returns an error message if the policy is invalid.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier <= 0.0 {
            Err("RetryPolicy backoff_multiplier must be finite and positive")
        } else {
            Ok(())
        }
    }

    fn cap(&self, delay: Duration) -> Duration {
        match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }
}

/// Convert a float nanosecond count, saturating at both ends.
fn duration_from_nanos(nanos: f64) -> Duration {
    if nanos.is_nan() || nanos <= 0.0 {
        Duration::ZERO
    } else if nanos >= u64::MAX as f64 {
        Duration::from_nanos(u64::MAX)
    } else {
        Duration::from_nanos(nanos.round() as u64)
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

mod opt_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(d).map(|ms| ms.map(Duration::from_millis))
    }
}
