//! Property-based tests for keyed store write ordering

use proptest::prelude::*;
use proptest::test_runner::{Config, TestRunner};
use std::sync::Arc;
use std::time::Duration;
use tabrelay::store::{MemoryArea, StoreContext};
use tokio::sync::mpsc::unbounded_channel;
use tokio::time::timeout;

/// Sequential writes: get() sees the last value, and a subscriber sees every
/// write in order, duplicates included.
#[test]
fn test_last_write_wins_and_notifications_follow_writes() {
    let mut runner = TestRunner::new(Config::with_cases(48));

    runner
        .run(&prop::collection::vec(0u8..4, 1..20), |writes| {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            let (last, seen) = rt.block_on(async {
                let ctx = StoreContext::open(Arc::new(MemoryArea::new()), "controller");
                let cell = ctx.live_cell("value", 0u8);
                let (tx, mut rx) = unbounded_channel();
                let _sub = cell.subscribe(move |v| {
                    let _ = tx.send(v);
                });

                for value in &writes {
                    cell.set(*value).await.unwrap();
                }

                let mut seen = Vec::new();
                for _ in 0..writes.len() {
                    let value = timeout(Duration::from_secs(1), rx.recv())
                        .await
                        .unwrap()
                        .unwrap();
                    seen.push(value);
                }
                (cell.get().await, seen)
            });

            prop_assert_eq!(Some(&last), writes.last());
            prop_assert_eq!(seen, writes);
            Ok(())
        })
        .unwrap();
}
