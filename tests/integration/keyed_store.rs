//! Integration tests for the keyed store on the durable area

use std::sync::Arc;
use std::time::Duration;
use tabrelay::store::{settings, SledArea, StorageArea, StoreContext};
use tempfile::TempDir;
use tokio::sync::mpsc::unbounded_channel;
use tokio::time::timeout;

#[tokio::test]
async fn test_durable_value_survives_restart() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("store");

    {
        let area: Arc<dyn StorageArea> = Arc::new(SledArea::open(&path).unwrap());
        let ctx = StoreContext::open(area, "controller");
        settings::active_model(&ctx)
            .set(Some("gemini-1.5-pro".to_string()))
            .await
            .unwrap();
    }

    let area: Arc<dyn StorageArea> = Arc::new(SledArea::open(&path).unwrap());
    let ctx = StoreContext::open(area, "controller");
    assert_eq!(
        settings::active_model(&ctx).get().await.as_deref(),
        Some("gemini-1.5-pro")
    );
    assert_eq!(settings::api_key(&ctx).get().await, None);
}

#[tokio::test]
async fn test_unconfigured_is_distinct_from_empty() {
    let temp_dir = TempDir::new().unwrap();
    let area: Arc<dyn StorageArea> = Arc::new(SledArea::open(temp_dir.path().join("s")).unwrap());
    let ctx = StoreContext::open(area, "controller");
    let key = settings::api_key(&ctx);

    assert_eq!(key.get().await, None);
    key.set(Some(String::new())).await.unwrap();
    assert_eq!(key.get().await, Some(String::new()));
}

#[tokio::test]
async fn test_live_setting_notifies_every_context_including_writer() {
    let temp_dir = TempDir::new().unwrap();
    let area: Arc<dyn StorageArea> = Arc::new(SledArea::open(temp_dir.path().join("s")).unwrap());
    let controller = StoreContext::open(area.clone(), "controller");
    let surface = StoreContext::open(area, "surface-3");

    let (tx, mut rx) = unbounded_channel();
    let controller_tx = tx.clone();
    let _own = settings::active_model(&controller).subscribe(move |v| {
        let _ = controller_tx.send(("controller", v));
    });
    let _remote = settings::active_model(&surface).subscribe(move |v| {
        let _ = tx.send(("surface", v));
    });

    settings::active_model(&controller)
        .set(Some("phi3".to_string()))
        .await
        .unwrap();

    let mut seen = Vec::new();
    for _ in 0..2 {
        let event = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("notification timed out")
            .expect("subscription closed");
        seen.push(event);
    }
    seen.sort();
    assert_eq!(
        seen,
        vec![
            ("controller", Some("phi3".to_string())),
            ("surface", Some("phi3".to_string())),
        ]
    );
}

#[tokio::test]
async fn test_concurrent_writers_last_commit_wins() {
    let temp_dir = TempDir::new().unwrap();
    let area: Arc<dyn StorageArea> = Arc::new(SledArea::open(temp_dir.path().join("s")).unwrap());
    let a = StoreContext::open(area.clone(), "a").live_cell("counter", 0u64);
    let b = StoreContext::open(area.clone(), "b").live_cell("counter", 0u64);
    let observer = StoreContext::open(area, "observer").live_cell("counter", 0u64);

    let (tx, mut rx) = unbounded_channel();
    let _sub = observer.subscribe(move |v| {
        let _ = tx.send(v);
    });

    let writes_a = async {
        for n in 0..25u64 {
            a.set(n * 2).await.unwrap();
        }
    };
    let writes_b = async {
        for n in 0..25u64 {
            b.set(n * 2 + 1).await.unwrap();
        }
    };
    tokio::join!(writes_a, writes_b);

    let mut last = None;
    for _ in 0..50 {
        last = Some(
            timeout(Duration::from_secs(1), rx.recv())
                .await
                .unwrap()
                .unwrap(),
        );
    }
    // The final notification is the final commit, and it is what get() sees.
    assert_eq!(last, Some(observer.get().await));
}
