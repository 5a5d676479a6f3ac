//! Property-based tests for flag gating

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use serde_json::json;
use storefront_core::{decide, evaluate_flag, FeatureFlag, FlagDecision};

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
}

proptest! {
    #[test]
    fn prop_future_start_is_always_off(
        minutes_ahead in 1i64..100_000,
        enabled in any::<bool>(),
        rollout in 0.0f64..=100.0,
        draw in 0.0f64..1.0,
    ) {
        let flag = FeatureFlag::new("launch")
            .with_enabled(enabled)
            .with_rollout(rollout)
            .with_window(Some(base() + Duration::minutes(minutes_ahead)), None)
            .with_payload(json!({"hero": "launch.png"}));

        let eval = evaluate_flag(&flag, base(), &move || draw);

        prop_assert!(!eval.is_enabled);
        prop_assert!(eval.payload.is_empty());
        prop_assert_eq!(eval.decision, FlagDecision::NotStarted);
    }

    #[test]
    fn prop_past_end_is_always_off(
        minutes_ago in 1i64..100_000,
        enabled in any::<bool>(),
        rollout in 0.0f64..=100.0,
        draw in 0.0f64..1.0,
    ) {
        let flag = FeatureFlag::new("sale")
            .with_enabled(enabled)
            .with_rollout(rollout)
            .with_window(None, Some(base() - Duration::minutes(minutes_ago)))
            .with_payload(json!({"discount": 20}));

        let eval = evaluate_flag(&flag, base(), &move || draw);

        prop_assert!(!eval.is_enabled);
        prop_assert!(eval.payload.is_empty());
        prop_assert_eq!(eval.decision, FlagDecision::Expired);
    }

    #[test]
    fn prop_full_rollout_is_always_on(draw in 0.0f64..1.0) {
        let flag = FeatureFlag::new("wishlist").with_rollout(100.0);
        prop_assert_eq!(decide(&flag, base(), &move || draw), FlagDecision::Active);
    }

    #[test]
    fn prop_zero_rollout_is_always_off(draw in 0.0f64..1.0) {
        let flag = FeatureFlag::new("wishlist").with_rollout(0.0);
        prop_assert_eq!(decide(&flag, base(), &move || draw), FlagDecision::RolloutExcluded);
    }

    #[test]
    fn prop_active_iff_draw_below_rollout(
        rollout in 0.0f64..=100.0,
        draw in 0.0f64..1.0,
    ) {
        let flag = FeatureFlag::new("quiz").with_rollout(rollout);
        let eval = evaluate_flag(&flag, base(), &move || draw);
        prop_assert_eq!(eval.is_enabled, draw * 100.0 < rollout);
    }

    #[test]
    fn prop_disabled_is_off_inside_window(
        rollout in 0.0f64..=100.0,
        draw in 0.0f64..1.0,
    ) {
        let flag = FeatureFlag::new("gift-cards")
            .with_enabled(false)
            .with_rollout(rollout)
            .with_window(Some(base() - Duration::days(1)), Some(base() + Duration::days(1)));

        prop_assert_eq!(decide(&flag, base(), &move || draw), FlagDecision::Disabled);
    }
}
