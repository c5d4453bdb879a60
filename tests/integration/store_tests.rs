use super::*;
use tempfile::TempDir;
use vinted_watcher::config::{StorageBackend, StorageConfig};
use vinted_watcher::store::{self, FileSnapshotStore};

#[tokio::test]
async fn test_snapshot_survives_restart() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let saved = listings(&[
        record("1", "Shoe", 50, true),
        ListingRecord::new("2", "Vest", Decimal::new(1250, 2), "https://www.vinted.pl/items/2", false),
    ]);

    {
        let store = FileSnapshotStore::new(dir.path());
        store.initialize(&["ralph".to_string()]).await?;
        store.save("ralph", &saved).await?;
    }

    let reopened = FileSnapshotStore::new(dir.path());
    reopened.initialize(&["ralph".to_string()]).await?;
    let loaded = reopened.load("ralph").await?;

    assert_eq!(loaded, saved);
    assert_eq!(loaded.get("2").unwrap().price, Decimal::new(1250, 2));
    assert_eq!(loaded.get("1").unwrap().currency.as_deref(), Some("PLN"));

    Ok(())
}

#[tokio::test]
async fn test_reads_snapshots_with_numeric_prices() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    std::fs::write(
        dir.path().join("adidas.json"),
        r#"{"4471": {"title": "Gazelle", "price": 120.0, "url": "https://www.vinted.pl/items/4471", "is_new": true}}"#,
    )?;

    let store = FileSnapshotStore::new(dir.path());
    let loaded = store.load("adidas").await?;

    let gazelle = loaded.get("4471").unwrap();
    assert_eq!(gazelle.price, Decimal::from(120));
    assert!(gazelle.is_fresh);
    assert!(gazelle.currency.is_none());

    Ok(())
}

#[tokio::test]
async fn test_sqlite_backend_round_trip_through_config() -> anyhow::Result<()> {
    let config = StorageConfig {
        backend: StorageBackend::Sqlite,
        path: "sqlite::memory:".to_string(),
    };
    let store = store::build(&config).await?;
    store.initialize(&["nike".to_string(), "adidas".to_string()]).await?;

    assert!(store.load("nike").await?.is_empty());

    let saved = listings(&[record("7", "Tech Fleece", 400, true)]);
    store.save("nike", &saved).await?;

    assert_eq!(store.load("nike").await?, saved);
    assert!(store.load("adidas").await?.is_empty());

    Ok(())
}
