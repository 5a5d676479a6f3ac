//! Behavioural tests for the retry executor.

use super::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_test::traced_test;

/// An operation that fails with `"attempt N"` until call `succeed_on` (1-indexed).
fn flaky(
    calls: Arc<AtomicU32>,
    succeed_on: u32,
) -> impl FnMut() -> std::future::Ready<Result<&'static str, String>> {
    move || {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n >= succeed_on {
            std::future::ready(Ok("success"))
        } else {
            std::future::ready(Err(format!("attempt {}", n)))
        }
    }
}

type Seen = Arc<Mutex<Vec<(u32, Duration, String)>>>;

fn recorder(seen: Seen) -> impl Fn(&RetryEvent<'_, String>) + Send + Sync + 'static {
    move |event| {
        seen.lock()
            .unwrap()
            .push((event.attempt, event.delay, event.error.clone()))
    }
}

#[tokio::test(start_paused = true)]
async fn test_succeeds_on_third_attempt_with_growing_delays() {
    let calls = Arc::new(AtomicU32::new(0));
    let seen: Seen = Arc::default();
    let policy = RetryPolicy::exponential(Duration::from_millis(100))
        .with_max_retries(2)
        .with_backoff_multiplier(2.0);

    let started = tokio::time::Instant::now();
    let result = RetryExecutor::new(policy)
        .on_retry(recorder(seen.clone()))
        .execute(flaky(calls.clone(), 3))
        .await;

    assert_eq!(result, Ok("success"));
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let seen = seen.lock().unwrap();
    let attempts: Vec<u32> = seen.iter().map(|(a, _, _)| *a).collect();
    let delays: Vec<Duration> = seen.iter().map(|(_, d, _)| *d).collect();
    assert_eq!(attempts, vec![1, 2]);
    assert_eq!(
        delays,
        vec![Duration::from_millis(100), Duration::from_millis(200)]
    );
    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn test_always_failing_returns_last_error() {
    let calls = Arc::new(AtomicU32::new(0));
    let policy = RetryPolicy::exponential(Duration::from_millis(10)).with_max_retries(3);

    let result = retry(flaky(calls.clone(), u32::MAX), &policy).await;

    assert_eq!(result, Err("attempt 4".to_string()));
    assert_eq!(calls.load(Ordering::SeqCst), 4); // 1 initial + 3 retries
}

#[tokio::test(start_paused = true)]
async fn test_zero_retries_runs_once() {
    let calls = Arc::new(AtomicU32::new(0));
    let seen: Seen = Arc::default();
    let policy = RetryPolicy::default().with_max_retries(0);

    let result = retry_with_hooks(flaky(calls.clone(), 2), &policy, recorder(seen.clone())).await;

    assert_eq!(result, Err("attempt 1".to_string()));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_hook_not_called_after_exhaustion() {
    let calls = Arc::new(AtomicU32::new(0));
    let seen: Seen = Arc::default();
    let policy = RetryPolicy::exponential(Duration::from_millis(5)).with_max_retries(2);

    let result = retry_with_hooks(flaky(calls.clone(), u32::MAX), &policy, recorder(seen.clone()))
        .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].2, "attempt 1");
    assert_eq!(seen[1].2, "attempt 2");
}

#[tokio::test(start_paused = true)]
async fn test_success_first_time_does_not_wait() {
    let calls = Arc::new(AtomicU32::new(0));
    let started = tokio::time::Instant::now();

    let result = retry(flaky(calls.clone(), 1), &RetryPolicy::default()).await;

    assert_eq!(result, Ok("success"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_retry_if_rejects_first_error_without_delay() {
    let calls = Arc::new(AtomicU32::new(0));
    let seen: Seen = Arc::default();
    let started = tokio::time::Instant::now();

    let result = RetryExecutor::new(RetryPolicy::default())
        .when(|_: &String| false)
        .on_retry(recorder(seen.clone()))
        .execute(flaky(calls.clone(), 3))
        .await;

    assert_eq!(result, Err("attempt 1".to_string()));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_retry_if_uses_flat_delay() {
    let calls = Arc::new(AtomicU32::new(0));
    let seen: Seen = Arc::default();
    let policy = RetryPolicy::exponential(Duration::from_millis(100)).with_max_retries(3);

    let result = RetryExecutor::new(policy)
        .when(|e: &String| e.starts_with("attempt"))
        .on_retry(recorder(seen.clone()))
        .execute(flaky(calls.clone(), 4))
        .await;

    assert_eq!(result, Ok("success"));
    let delays: Vec<Duration> = seen.lock().unwrap().iter().map(|(_, d, _)| *d).collect();
    assert_eq!(delays, vec![Duration::from_millis(100); 3]);
}

#[tokio::test(start_paused = true)]
async fn test_retry_if_stops_on_permanent_error_mid_sequence() {
    #[derive(Debug, PartialEq, Clone)]
    enum CheckoutError {
        Timeout,
        CardDeclined,
    }

    let calls = Arc::new(AtomicU32::new(0));
    let result: Result<(), _> = retry_if(
        {
            let calls = calls.clone();
            move || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(CheckoutError::Timeout)
                    } else {
                        Err(CheckoutError::CardDeclined)
                    }
                }
            }
        },
        &RetryPolicy::constant(Duration::from_millis(10)).with_max_retries(5),
        |err| matches!(err, CheckoutError::Timeout),
    )
    .await;

    assert_eq!(result, Err(CheckoutError::CardDeclined));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_predicate_not_consulted_on_final_attempt() {
    let consulted = Arc::new(AtomicU32::new(0));
    let calls = Arc::new(AtomicU32::new(0));

    let policy = RetryPolicy::constant(Duration::from_millis(1)).with_max_retries(2);
    let result = RetryExecutor::new(policy)
        .when({
            let consulted = consulted.clone();
            move |_: &String| {
                consulted.fetch_add(1, Ordering::SeqCst);
                true
            }
        })
        .execute(flaky(calls.clone(), u32::MAX))
        .await;

    assert_eq!(result, Err("attempt 3".to_string()));
    assert_eq!(consulted.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_max_delay_caps_backoff() {
    let seen: Seen = Arc::default();
    let policy = RetryPolicy::exponential(Duration::from_millis(100))
        .with_max_retries(4)
        .with_max_delay(Duration::from_millis(250));

    let _ = retry_with_hooks(
        flaky(Arc::new(AtomicU32::new(0)), u32::MAX),
        &policy,
        recorder(seen.clone()),
    )
    .await;

    let delays: Vec<u128> = seen
        .lock()
        .unwrap()
        .iter()
        .map(|(_, d, _)| d.as_millis())
        .collect();
    assert_eq!(delays, vec![100, 200, 250, 250]);
}

#[tokio::test(start_paused = true)]
async fn test_hook_elapsed_tracks_waits() {
    let elapsed = Arc::new(Mutex::new(Vec::new()));
    let policy = RetryPolicy::constant(Duration::from_millis(50)).with_max_retries(2);

    let _ = RetryExecutor::new(policy)
        .on_retry({
            let elapsed = elapsed.clone();
            move |event: &RetryEvent<'_, String>| elapsed.lock().unwrap().push(event.elapsed)
        })
        .execute(flaky(Arc::new(AtomicU32::new(0)), u32::MAX))
        .await;

    let elapsed = elapsed.lock().unwrap();
    assert_eq!(elapsed.len(), 2);
    assert!(elapsed[1] >= elapsed[0] + Duration::from_millis(50));
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_exhaustion_is_logged() {
    let policy = RetryPolicy::constant(Duration::from_millis(1)).with_max_retries(1);

    let _ = retry(flaky(Arc::new(AtomicU32::new(0)), u32::MAX), &policy).await;

    assert!(logs_contain("retries exhausted"));
    assert!(logs_contain("operation failed, retrying"));
}
