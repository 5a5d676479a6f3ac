//! Feature flags with time windows and percentage rollout.
//!
//! A flag is active for one evaluation when:
//!
//! 1. `now` lies inside its optional `[start_at, end_at]` window,
//! 2. its master switch is on, and
//! 3. a uniform draw in `[0, 100)` is below its rollout percentage.
//!
//! The pure part lives in [`evaluate_flag`]; [`FlagEvaluator`] adds the store
//! lookup and fails closed when the store misbehaves.
//!
//! The rollout draw is taken on every evaluation. Nothing is cached per user
//! or session, so two evaluations of a partially rolled-out flag can disagree.

mod evaluator;
mod model;

pub use evaluator::{FlagEvaluator, FlagEvaluatorConfig, DEFAULT_FLAG_TABLE};
pub use model::{decide, evaluate_flag, FeatureFlag, FlagDecision, FlagEvaluation};
