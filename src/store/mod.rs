//! Durable per-query snapshot storage.
//!
//! Each configured query owns one slot holding the JSON encoding of its most
//! recent [`ListingSet`]. Backends only move bytes; encoding and the
//! empty-versus-corrupt distinction live here so every backend behaves the same.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::{StorageBackend, StorageConfig};
use crate::models::{ListingRecord, ListingSet, parse_price};
use crate::utils::error::StoreError;

pub mod file;
pub mod memory;
pub mod sqlite;

pub use file::FileSnapshotStore;
pub use memory::MemorySnapshotStore;
pub use sqlite::SqliteSnapshotStore;

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Backend name for logs.
    fn backend(&self) -> &str;

    /// Makes sure every named slot exists, creating empty ones where missing.
    /// Existing payloads are left alone.
    async fn initialize(&self, names: &[String]) -> Result<(), StoreError>;

    /// Raw payload for `name`, or `None` if the slot was never written.
    async fn load_raw(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Replaces the payload for `name`. Readers see either the old or the new
    /// payload, never a mix.
    async fn save_raw(&self, name: &str, payload: &[u8]) -> Result<(), StoreError>;

    /// Last saved snapshot for `name`. Missing or empty payloads decode to an
    /// empty set; undecodable ones are [`StoreError::Corrupt`].
    async fn load(&self, name: &str) -> Result<ListingSet, StoreError> {
        match self.load_raw(name).await? {
            Some(payload) => decode(name, &payload),
            None => Ok(ListingSet::new()),
        }
    }

    async fn save(&self, name: &str, listings: &ListingSet) -> Result<(), StoreError> {
        let payload = encode(listings)?;
        self.save_raw(name, &payload).await
    }
}

/// On-disk shape of one listing. The id is the map key.
#[derive(Debug, Serialize, Deserialize)]
struct StoredListing {
    title: String,
    #[serde(
        serialize_with = "rust_decimal::serde::str::serialize",
        deserialize_with = "deserialize_price"
    )]
    price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    currency: Option<String>,
    url: String,
    #[serde(rename = "is_new")]
    is_fresh: bool,
}

/// Prices are written as strings; bare JSON numbers are accepted on read.
fn deserialize_price<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPrice {
        Text(String),
        Number(serde_json::Number),
    }

    let text = match RawPrice::deserialize(deserializer)? {
        RawPrice::Text(text) => text,
        RawPrice::Number(number) => number.to_string(),
    };
    parse_price(&text).ok_or_else(|| serde::de::Error::custom(format!("invalid price: {}", text)))
}

pub fn encode(listings: &ListingSet) -> Result<Vec<u8>, StoreError> {
    let stored: BTreeMap<&str, StoredListing> = listings
        .iter()
        .map(|record| {
            (
                record.id.as_str(),
                StoredListing {
                    title: record.title.clone(),
                    price: record.price,
                    currency: record.currency.clone(),
                    url: record.url.clone(),
                    is_fresh: record.is_fresh,
                },
            )
        })
        .collect();

    serde_json::to_vec(&stored).map_err(StoreError::Encode)
}

pub fn decode(name: &str, payload: &[u8]) -> Result<ListingSet, StoreError> {
    if payload.iter().all(u8::is_ascii_whitespace) {
        return Ok(ListingSet::new());
    }

    let stored: BTreeMap<String, StoredListing> =
        serde_json::from_slice(payload).map_err(|source| StoreError::Corrupt {
            name: name.to_string(),
            source,
        })?;

    Ok(stored
        .into_iter()
        .map(|(id, item)| ListingRecord {
            id,
            title: item.title,
            price: item.price,
            currency: item.currency,
            url: item.url,
            is_fresh: item.is_fresh,
        })
        .collect())
}

/// Opens the backend selected in the storage configuration.
pub async fn build(config: &StorageConfig) -> Result<Arc<dyn SnapshotStore>, StoreError> {
    let store: Arc<dyn SnapshotStore> = match config.backend {
        StorageBackend::File => Arc::new(FileSnapshotStore::new(&config.path)),
        StorageBackend::Sqlite => Arc::new(SqliteSnapshotStore::connect(&config.path).await?),
        StorageBackend::Memory => Arc::new(MemorySnapshotStore::new()),
    };

    tracing::info!(backend = store.backend(), path = %config.path, "Opened snapshot store");
    Ok(store)
}
