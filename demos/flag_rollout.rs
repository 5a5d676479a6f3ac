//! Flag Rollout Example
//!
//! Demonstrates feature flag evaluation against an in-memory store:
//! - Single flag evaluation with payloads
//! - Time-windowed campaigns
//! - How a percentage rollout behaves over many evaluations
//! - Batch evaluation for a page render
//! - Remembering a dismissed popup in a preference file

use chrono::{TimeZone, Utc};
use serde_json::json;
use storefront_core::preferences::{JsonFilePreferences, PreferenceStore};
use storefront_core::store::MemoryStore;
use storefront_core::testing::FixedClock;
use storefront_core::{FlagDecision, FlagEvaluator};

fn seed() -> MemoryStore {
    let store = MemoryStore::new();
    let rows = [
        json!({"key": "wishlist", "enabled": true, "payload": {"limit": 50}}),
        json!({"key": "skin-quiz", "enabled": true, "rollout": 30}),
        json!({"key": "gift-cards", "enabled": false}),
        json!({
            "key": "holiday-banner",
            "enabled": true,
            "start_at": "2026-12-01T00:00:00Z",
            "end_at": "2026-12-31T23:59:59Z",
            "payload": {"headline": "Gift sets are here"}
        }),
    ];
    for row in rows {
        store
            .insert_json("feature_flags", row)
            .expect("flag rows are objects");
    }
    store
}

// ==================== Single Flags ====================

/// Example 1: Evaluate one flag at a time
async fn example_single_flags(store: &MemoryStore) {
    println!("\n=== Example 1: Single Flags ===");

    let flags = FlagEvaluator::new(store);
    for key in ["wishlist", "gift-cards", "loyalty"] {
        let eval = flags.evaluate(key).await;
        println!(
            "{:>12}: enabled={} decision={} payload={:?}",
            key, eval.is_enabled, eval.decision, eval.payload
        );
    }
}

// ==================== Time Windows ====================

/// Example 2: A campaign seen from different days
async fn example_time_windows(store: &MemoryStore) {
    println!("\n=== Example 2: Time Windows ===");

    let days = [
        Utc.with_ymd_and_hms(2026, 11, 30, 12, 0, 0),
        Utc.with_ymd_and_hms(2026, 12, 15, 12, 0, 0),
        Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0),
    ];
    for day in days.into_iter().flat_map(|d| d.single()) {
        let flags = FlagEvaluator::new(store).with_clock(FixedClock::new(day));
        let eval = flags.evaluate("holiday-banner").await;
        println!("{}: {}", day.date_naive(), eval.decision);
    }
}

// ==================== Rollout ====================

/// Example 3: A 30% rollout re-rolls on every evaluation
async fn example_rollout(store: &MemoryStore) {
    println!("\n=== Example 3: Rollout ===");

    let flags = FlagEvaluator::new(store);
    let runs = 1000;
    let mut active = 0;
    for _ in 0..runs {
        if flags.evaluate("skin-quiz").await.decision == FlagDecision::Active {
            active += 1;
        }
    }
    println!(
        "skin-quiz active in {} of {} evaluations ({:.1}%)",
        active,
        runs,
        active as f64 * 100.0 / runs as f64
    );
}

// ==================== Batch ====================

/// Example 4: Everything a page needs in one query
async fn example_batch(store: &MemoryStore) {
    println!("\n=== Example 4: Batch ===");

    let flags = FlagEvaluator::new(store);
    let decisions = flags
        .evaluate_all(["wishlist", "gift-cards", "holiday-banner", "loyalty"])
        .await;

    let mut keys: Vec<_> = decisions.keys().collect();
    keys.sort();
    for key in keys {
        println!("{:>15}: {}", key, decisions[key]);
    }
    println!("loyalty present: {}", decisions.contains_key("loyalty"));
}

// ==================== Preferences ====================

/// Example 5: Show a popup until the visitor dismisses it
async fn example_dismissed_popup(store: &MemoryStore) {
    println!("\n=== Example 5: Dismissed Popup ===");

    let dir = std::env::temp_dir().join("storefront-flag-demo");
    if let Err(e) = std::fs::create_dir_all(&dir) {
        println!("Cannot create {}: {}", dir.display(), e);
        return;
    }
    let prefs = match JsonFilePreferences::open(dir.join("prefs.json")) {
        Ok(prefs) => prefs,
        Err(e) => {
            println!("Cannot open preferences: {}", e);
            return;
        }
    };

    let december = Utc
        .with_ymd_and_hms(2026, 12, 10, 9, 0, 0)
        .single()
        .expect("valid date");
    let flags = FlagEvaluator::new(store).with_clock(FixedClock::new(december));

    for visit in 1..=2 {
        let banner = flags.evaluate("holiday-banner").await;
        let dismissed = prefs.get("dismissed:holiday-banner").is_some();
        if banner.is_enabled && !dismissed {
            println!("Visit {}: showing \"{}\"", visit, banner.payload["headline"]);
            if let Err(e) = prefs.set("dismissed:holiday-banner", json!(true)) {
                println!("Could not save dismissal: {}", e);
            }
        } else {
            println!("Visit {}: banner hidden", visit);
        }
    }

    if let Err(e) = prefs.clear("dismissed:holiday-banner") {
        println!("Could not reset preferences: {}", e);
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().init();

    println!("======================================");
    println!("        Flag Rollout Example          ");
    println!("======================================");

    let store = seed();
    example_single_flags(&store).await;
    example_time_windows(&store).await;
    example_rollout(&store).await;
    example_batch(&store).await;
    example_dismissed_popup(&store).await;

    println!("\n======================================");
    println!("           Examples Complete           ");
    println!("======================================");
}
