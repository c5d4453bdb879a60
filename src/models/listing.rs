use std::collections::BTreeMap;
use std::collections::btree_map;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One listing observed for a query at fetch time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListingRecord {
    pub id: String,
    pub title: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    pub url: String,
    /// Whether the source considered the listing newly posted when it was fetched.
    /// Only meaningful for the snapshot that observed it.
    pub is_fresh: bool,
}

impl ListingRecord {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        price: Decimal,
        url: impl Into<String>,
        is_fresh: bool,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            price,
            currency: None,
            url: url.into(),
            is_fresh,
        }
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    /// Price with its currency code, e.g. `50 PLN`.
    pub fn formatted_price(&self) -> String {
        match &self.currency {
            Some(currency) => format!("{} {}", self.price.normalize(), currency),
            None => self.price.normalize().to_string(),
        }
    }
}

/// Parses a price as sent by the source or found in old snapshots: `"12.50"`, `"12"`, `"1.2e1"`.
pub fn parse_price(text: &str) -> Option<Decimal> {
    let text = text.trim();
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

/// Every listing currently returned for a query, keyed by id.
///
/// Ids are kept sorted so reports and persisted payloads come out in a stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingSet {
    items: BTreeMap<String, ListingRecord>,
}

impl ListingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record, replacing any earlier record with the same id.
    pub fn insert(&mut self, record: ListingRecord) -> Option<ListingRecord> {
        self.items.insert(record.id.clone(), record)
    }

    pub fn get(&self, id: &str) -> Option<&ListingRecord> {
        self.items.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Values<'_, String, ListingRecord> {
        self.items.values()
    }
}

impl FromIterator<ListingRecord> for ListingSet {
    fn from_iter<I: IntoIterator<Item = ListingRecord>>(iter: I) -> Self {
        let mut set = ListingSet::new();
        for record in iter {
            set.insert(record);
        }
        set
    }
}

impl IntoIterator for ListingSet {
    type Item = ListingRecord;
    type IntoIter = btree_map::IntoValues<String, ListingRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_values()
    }
}

impl<'a> IntoIterator for &'a ListingSet {
    type Item = &'a ListingRecord;
    type IntoIter = btree_map::Values<'a, String, ListingRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.values()
    }
}

/// The listings judged new in one cycle. Same shape as a snapshot.
pub type Delta = ListingSet;

/// A configured search: `name` keys storage and reports, `endpoint` goes to the fetcher untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct QuerySpec {
    pub name: String,
    pub endpoint: String,
}

impl QuerySpec {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
        }
    }
}
