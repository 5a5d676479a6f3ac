//! Retry Patterns Example
//!
//! Demonstrates retrying storefront backend calls:
//! - Basic retry with exponential backoff
//! - Comparing backoff schedules
//! - Conditional retry (retry_if)
//! - Retry with an observer hook
//! - Wrapping a whole data store so every query retries

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use storefront_core::prelude::*;
use storefront_core::store::{MemoryStore, RetryingStore};
use storefront_core::{retry_with_hooks, RetryEvent};

// ==================== Basic Retry ====================

/// Example 1: Basic retry with exponential backoff
///
/// Fetching the product list fails twice, then succeeds.
async fn example_basic_retry() {
    println!("\n=== Example 1: Basic Retry ===");

    let attempts = Arc::new(AtomicU32::new(0));

    let result = retry(
        {
            let attempts = attempts.clone();
            move || {
                let attempts = attempts.clone();
                async move {
                    let n = attempts.fetch_add(1, Ordering::SeqCst);
                    println!("  Attempt {}", n + 1);
                    if n < 2 {
                        Err("gateway timeout")
                    } else {
                        Ok(vec!["rose serum", "clay mask", "lip oil"])
                    }
                }
            }
        },
        &RetryPolicy::exponential(Duration::from_millis(100)).with_max_retries(5),
    )
    .await;

    match result {
        Ok(products) => println!(
            "Loaded {} products after {} attempts",
            products.len(),
            attempts.load(Ordering::SeqCst)
        ),
        Err(e) => println!("Gave up: {}", e),
    }
}

// ==================== Backoff Schedules ====================

/// Example 2: Delay schedules for a few policies
async fn example_backoff_schedules() {
    println!("\n=== Example 2: Backoff Schedules ===");

    let policies = [
        ("Default", RetryPolicy::default()),
        (
            "Constant",
            RetryPolicy::constant(Duration::from_millis(250)).with_max_retries(4),
        ),
        (
            "Capped",
            RetryPolicy::exponential(Duration::from_millis(200))
                .with_max_retries(6)
                .with_max_delay(Duration::from_secs(1)),
        ),
    ];

    for (name, policy) in policies {
        let delays: Vec<String> = (0..policy.max_retries())
            .filter_map(|i| policy.delay_for_attempt(i))
            .map(|d| format!("{:?}", d))
            .collect();
        println!("{:>9}: [{}]", name, delays.join(", "));
    }
}

// ==================== Conditional Retry ====================

#[derive(Debug, Clone, PartialEq)]
enum CheckoutError {
    Unavailable,
    CardDeclined,
}

impl std::fmt::Display for CheckoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable => write!(f, "payment service unavailable"),
            Self::CardDeclined => write!(f, "card declined"),
        }
    }
}

/// Example 3: Only retry errors that might go away
///
/// A declined card is final; an unavailable service is worth another try.
async fn example_conditional_retry() {
    println!("\n=== Example 3: Conditional Retry ===");

    let attempts = Arc::new(AtomicU32::new(0));
    let result: Result<&str, _> = retry_if(
        {
            let attempts = attempts.clone();
            move || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                println!("  Charge attempt {}", n + 1);
                async move {
                    if n == 0 {
                        Err(CheckoutError::Unavailable)
                    } else {
                        Err(CheckoutError::CardDeclined)
                    }
                }
            }
        },
        &RetryPolicy::constant(Duration::from_millis(100)).with_max_retries(5),
        |e: &CheckoutError| *e == CheckoutError::Unavailable,
    )
    .await;

    match result {
        Ok(receipt) => println!("Charged: {}", receipt),
        Err(e) => println!(
            "Checkout failed: {} (after {} attempts)",
            e,
            attempts.load(Ordering::SeqCst)
        ),
    }
}

// ==================== Observer Hook ====================

/// Example 4: Log each retry before waiting
async fn example_retry_with_hooks() {
    println!("\n=== Example 4: Retry With Hooks ===");

    let attempts = Arc::new(AtomicU32::new(0));
    let result = retry_with_hooks(
        {
            let attempts = attempts.clone();
            move || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(format!("wishlist sync failed ({})", n + 1))
                    } else {
                        Ok(12)
                    }
                }
            }
        },
        &RetryPolicy::exponential(Duration::from_millis(50)).with_max_retries(3),
        |event: &RetryEvent<'_, String>| {
            println!(
                "  retry {} in {:?} after {:?}: {}",
                event.attempt, event.delay, event.elapsed, event.error
            );
        },
    )
    .await;

    println!("Result: {:?}", result);
}

// ==================== Retrying Store ====================

/// Example 5: Every query through a retrying store
async fn example_retrying_store() {
    println!("\n=== Example 5: Retrying Store ===");

    let inner = MemoryStore::new();
    inner
        .insert_json("products", json!({"sku": "rose-serum", "price": 3200}))
        .expect("row is an object");

    let store = RetryingStore::new(
        inner,
        RetryPolicy::constant(Duration::from_millis(100)).with_max_retries(2),
    );
    let row = store
        .fetch_one(&Query::table("products").eq("sku", "rose-serum"))
        .await;

    match row {
        Ok(Some(row)) => println!("Found product priced {}", row["price"]),
        Ok(None) => println!("No such product"),
        Err(e) => println!("Lookup failed: {}", e),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("======================================");
    println!("       Retry Patterns Example         ");
    println!("======================================");

    example_basic_retry().await;
    example_backoff_schedules().await;
    example_conditional_retry().await;
    example_retry_with_hooks().await;
    example_retrying_store().await;

    println!("\n======================================");
    println!("           Examples Complete           ");
    println!("======================================");
}
