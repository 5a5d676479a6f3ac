//! Injected sources of time and randomness.
//!
//! Flag evaluation depends on "now" and on a uniform random draw. Both are
//! reached through the traits in this module so callers can pin them in tests
//! and production code can use the wall clock and a thread-local generator.
//!
//! # Examples
//!
//! ```rust
//! use storefront_core::env::{Clock, RandomSource, SystemClock, ThreadRandom};
//!
//! let now = SystemClock.now();
//! let draw = ThreadRandom.next_unit();
//! assert!((0.0..1.0).contains(&draw));
//! assert!(now.timestamp() > 0);
//!
//! // Any closure returning f64 is a random source.
//! let pinned = || 0.25;
//! assert_eq!(pinned.next_unit(), 0.25);
//! ```

use chrono::{DateTime, Utc};
use rand::Rng;

/// Source of the current instant.
pub trait Clock {
    /// The current time in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Source of uniform random numbers.
pub trait RandomSource {
    /// A uniform draw in `[0, 1)`.
    fn next_unit(&self) -> f64;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Thread-local generator from `rand`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_unit(&self) -> f64 {
        rand::rng().random_range(0.0..1.0)
    }
}

impl<F> RandomSource for F
where
    F: Fn() -> f64,
{
    fn next_unit(&self) -> f64 {
        self()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}
