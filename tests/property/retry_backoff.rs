//! Property-based tests for retry timing and attempt bounds

use proptest::prelude::*;
use proptest::test_runner::{Config, TestRunner};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tabrelay::error::ProviderError;
use tabrelay::retry::RetryPolicy;
use tokio::time::Instant;

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}

fn rate_limited() -> ProviderError {
    ProviderError::Status {
        status: 429,
        body: "rate limited".to_string(),
    }
}

/// Succeeding on attempt `k` costs exactly base * (2^(k-1) - 1) of waiting.
#[test]
fn test_total_delay_is_pure_exponential() {
    let mut runner = TestRunner::new(Config::with_cases(64));

    runner
        .run(
            &(1u32..=6, 1u64..=500).prop_flat_map(|(max, base)| (Just(max), Just(base), 1..=max)),
            |(max_attempts, base_ms, succeed_on)| {
                let rt = paused_runtime();
                let (calls, elapsed) = rt.block_on(async {
                    let calls = AtomicU32::new(0);
                    let policy = RetryPolicy::new(max_attempts, Duration::from_millis(base_ms));
                    let started = Instant::now();
                    let result = policy
                        .execute(|| {
                            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                            async move {
                                if n < succeed_on {
                                    Err(rate_limited())
                                } else {
                                    Ok(n)
                                }
                            }
                        })
                        .await;
                    assert_eq!(result.unwrap(), succeed_on);
                    (calls.load(Ordering::SeqCst), started.elapsed())
                });

                let expected = Duration::from_millis(base_ms * ((1u64 << (succeed_on - 1)) - 1));
                prop_assert_eq!(calls, succeed_on);
                prop_assert!(elapsed >= expected, "{:?} < {:?}", elapsed, expected);
                prop_assert!(
                    elapsed < expected + Duration::from_millis(5),
                    "{:?} too far past {:?}",
                    elapsed,
                    expected
                );
                Ok(())
            },
        )
        .unwrap();
}

/// A persistent retryable failure runs exactly `max_attempts` times.
#[test]
fn test_attempts_never_exceed_bound() {
    let mut runner = TestRunner::new(Config::with_cases(32));

    runner
        .run(&(1u32..=8), |max_attempts| {
            let rt = paused_runtime();
            let calls = rt.block_on(async {
                let calls = AtomicU32::new(0);
                let policy = RetryPolicy::new(max_attempts, Duration::from_millis(1));
                let result: Result<(), ProviderError> = policy
                    .execute(|| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        async { Err(rate_limited()) }
                    })
                    .await;
                assert!(result.is_err());
                calls.load(Ordering::SeqCst)
            });
            prop_assert_eq!(calls, max_attempts);
            Ok(())
        })
        .unwrap();
}
