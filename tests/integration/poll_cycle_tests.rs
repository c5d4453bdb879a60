use super::*;
use std::path::Path;
use tempfile::TempDir;
use tokio::sync::watch;
use vinted_watcher::store::{FileSnapshotStore, MemorySnapshotStore};
use vinted_watcher::utils::error::QueryError;
use vinted_watcher::{CoordinatorState, QueryOutcome};

async fn file_store(dir: &Path, queries: &[QuerySpec]) -> Arc<dyn SnapshotStore> {
    let store = FileSnapshotStore::new(dir);
    let names: Vec<String> = queries.iter().map(|q| q.name.clone()).collect();
    store.initialize(&names).await.unwrap();
    Arc::new(store)
}

#[tokio::test]
async fn test_first_cycle_is_a_silent_baseline() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let nike = spec("nike");
    let store = file_store(dir.path(), &[nike.clone()]).await;

    let current = listings(&[record("1", "Shoe", 50, true)]);
    let fetcher = ScriptedFetcher::new();
    fetcher.push(&nike, current.clone());

    let coordinator = coordinator(vec![nike.clone()], store.clone(), fetcher);
    let report = coordinator.run_once().await;

    assert!(matches!(
        report.results["nike"],
        Ok(QueryOutcome::Baseline { observed: 1, recovered_from: None })
    ));
    assert!(!report.has_new_items());
    assert_eq!(store.load("nike").await?, current);

    Ok(())
}

#[tokio::test]
async fn test_fresh_listing_is_reported_once() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let nike = spec("nike");
    let store = file_store(dir.path(), &[nike.clone()]).await;

    let rec1 = record("1", "Shoe", 50, false);
    let rec2 = record("2", "Air Max 90", 320, true);

    let fetcher = ScriptedFetcher::new();
    fetcher.push(&nike, listings(&[rec1.clone()]));
    fetcher.push(&nike, listings(&[rec1.clone(), rec2.clone()]));
    fetcher.push(&nike, listings(&[rec1.clone(), rec2.clone()]));

    let coordinator = coordinator(vec![nike.clone()], store.clone(), fetcher);
    coordinator.run_once().await;

    let second = coordinator.run_once().await;
    let new_items: Vec<_> = second.new_items().collect();
    assert_eq!(new_items.len(), 1);
    assert_eq!(new_items[0].0, "nike");
    assert_eq!(new_items[0].1.ids().collect::<Vec<_>>(), vec!["2"]);
    assert_eq!(new_items[0].1.get("2"), Some(&rec2));

    // Already in the snapshot, so not new any more.
    let third = coordinator.run_once().await;
    assert_eq!(third.total_new_items(), 0);

    Ok(())
}

#[tokio::test]
async fn test_stale_listing_is_stored_but_not_reported() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let nike = spec("nike");
    let store = file_store(dir.path(), &[nike.clone()]).await;

    let rec1 = record("1", "Shoe", 50, false);
    let bumped = record("2", "Old jacket", 90, false);

    let fetcher = ScriptedFetcher::new();
    fetcher.push(&nike, listings(&[rec1.clone()]));
    fetcher.push(&nike, listings(&[rec1.clone(), bumped.clone()]));

    let coordinator = coordinator(vec![nike.clone()], store.clone(), fetcher);
    coordinator.run_once().await;
    let report = coordinator.run_once().await;

    assert!(!report.has_new_items());
    assert!(store.load("nike").await?.contains("2"));

    Ok(())
}

#[tokio::test]
async fn test_failed_query_keeps_its_snapshot_and_spares_others() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let adidas = spec("adidas");
    let nike = spec("nike");
    let store = file_store(dir.path(), &[adidas.clone(), nike.clone()]).await;

    let adidas_before = listings(&[record("10", "Samba", 250, false)]);
    let nike_before = listings(&[record("20", "Dunk", 300, false)]);
    let nike_after = listings(&[record("20", "Dunk", 300, false), record("21", "Cortez", 180, true)]);

    let fetcher = ScriptedFetcher::new();
    fetcher.push(&adidas, adidas_before.clone());
    fetcher.push(&nike, nike_before);
    fetcher.push_failure(&adidas, 429);
    fetcher.push(&nike, nike_after.clone());

    let coordinator = coordinator(vec![adidas.clone(), nike.clone()], store.clone(), fetcher);
    coordinator.run_once().await;
    let report = coordinator.run_once().await;

    let failure = report.results["adidas"].as_ref().unwrap_err();
    assert!(matches!(failure.error, QueryError::Fetch(_)));
    assert!(failure.delta.is_none());

    let nike_delta = report.results["nike"].as_ref().unwrap().delta().unwrap();
    assert_eq!(nike_delta.ids().collect::<Vec<_>>(), vec!["21"]);

    assert_eq!(store.load("adidas").await?, adidas_before);
    assert_eq!(store.load("nike").await?, nike_after);
    assert_eq!(report.failure_count(), 1);
    assert_eq!(report.success_count(), 1);

    Ok(())
}

#[tokio::test]
async fn test_corrupt_snapshot_only_affects_its_own_query() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let adidas = spec("adidas");
    let nike = spec("nike");
    let store = file_store(dir.path(), &[adidas.clone(), nike.clone()]).await;

    store.save("nike", &listings(&[record("20", "Dunk", 300, false)])).await?;
    std::fs::write(dir.path().join("adidas.json"), b"{\"10\": {\"title\": ")?;

    let adidas_now = listings(&[record("10", "Samba", 250, true)]);
    let fetcher = ScriptedFetcher::new();
    fetcher.push(&adidas, adidas_now.clone());
    fetcher.push(&nike, listings(&[record("20", "Dunk", 300, false), record("22", "Blazer", 210, true)]));

    let coordinator = coordinator(vec![adidas.clone(), nike.clone()], store.clone(), fetcher);
    let report = coordinator.run_once().await;

    match &report.results["adidas"] {
        Ok(QueryOutcome::Baseline { recovered_from: Some(reason), .. }) => {
            assert!(reason.contains("adidas"));
        }
        other => panic!("expected a recovered baseline, got {:?}", other),
    }
    assert_eq!(report.results["nike"].as_ref().unwrap().delta().unwrap().len(), 1);

    // The slot is readable again after the cycle.
    assert_eq!(store.load("adidas").await?, adidas_now);

    Ok(())
}

#[tokio::test]
async fn test_run_stops_on_shutdown() {
    let nike = spec("nike");
    let store: Arc<dyn SnapshotStore> = Arc::new(MemorySnapshotStore::new());
    let fetcher = ScriptedFetcher::new();
    for _ in 0..50 {
        fetcher.push(&nike, listings(&[record("1", "Shoe", 50, false)]));
    }

    let coordinator = Arc::new(coordinator(vec![nike], store, fetcher.clone()));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn({
        let coordinator = Arc::clone(&coordinator);
        async move { coordinator.run(shutdown_rx).await }
    });

    assert!(wait_for_condition(|| fetcher.calls() >= 3, Duration::from_secs(5)).await);

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();

    assert_eq!(coordinator.state(), CoordinatorState::Stopped);
    assert!(coordinator.stats().await.cycles_completed >= 3);
}
