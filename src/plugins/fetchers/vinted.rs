use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, COOKIE, SET_COOKIE};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::RwLock;
use tokio_retry::RetryIf;
use tokio_retry::strategy::FixedInterval;
use url::Url;

use crate::config::FetcherConfig;
use crate::models::{ListingRecord, ListingSet, parse_price};
use crate::plugins::traits::ListingFetcher;
use crate::utils::error::FetchError;

const CATALOG_PATH: &str = "/api/v2/catalog/items";

/// Catalog URL parameters copied to the API query as they are.
const PASSTHROUGH_PARAMS: &[&str] = &[
    "search_text",
    "order",
    "page",
    "currency",
    "price_from",
    "price_to",
    "is_for_swap",
];

/// Site-side array parameters and the comma-separated API field each one feeds.
const ARRAY_PARAMS: &[(&str, &str)] = &[
    ("catalog[]", "catalog_ids"),
    ("catalog_ids[]", "catalog_ids"),
    ("brand_id[]", "brand_ids"),
    ("brand_ids[]", "brand_ids"),
    ("size_id[]", "size_ids"),
    ("size_ids[]", "size_ids"),
    ("color_id[]", "color_ids"),
    ("color_ids[]", "color_ids"),
    ("material_id[]", "material_ids"),
    ("material_ids[]", "material_ids"),
    ("status[]", "status_ids"),
    ("status_ids[]", "status_ids"),
    ("country_id[]", "country_ids"),
    ("country_ids[]", "country_ids"),
    ("city_id[]", "city_ids"),
    ("city_ids[]", "city_ids"),
];

/// A catalog search URL translated into the JSON API call behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRequest {
    pub origin: String,
    pub api_url: Url,
}

impl CatalogRequest {
    pub fn from_endpoint(endpoint: &str, per_page: u32) -> Result<Self, FetchError> {
        let invalid = |message: String| FetchError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            message,
        };

        let url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
        if !url.has_host() {
            return Err(invalid("missing host".to_string()));
        }

        let origin = url.origin().ascii_serialization();
        let mut api_url =
            Url::parse(&format!("{}{}", origin, CATALOG_PATH)).map_err(|e| invalid(e.to_string()))?;

        let mut params: BTreeMap<String, String> = BTreeMap::new();
        let mut arrays: BTreeMap<&str, Vec<String>> = BTreeMap::new();

        for (key, value) in url.query_pairs() {
            let key: &str = &key;
            if PASSTHROUGH_PARAMS.contains(&key) {
                params.insert(key.to_string(), value.into_owned());
            } else if let Some(&(_, field)) = ARRAY_PARAMS.iter().find(|(param, _)| *param == key) {
                arrays.entry(field).or_default().push(value.into_owned());
            }
        }

        params.entry("page".to_string()).or_insert_with(|| "1".to_string());
        params.entry("order".to_string()).or_insert_with(|| "newest_first".to_string());
        params.insert("per_page".to_string(), per_page.to_string());
        for (field, values) in arrays {
            params.insert(field.to_string(), values.join(","));
        }

        api_url.query_pairs_mut().extend_pairs(params.iter());

        Ok(Self { origin, api_url })
    }
}

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    items: Vec<WireItem>,
}

#[derive(Debug, Deserialize)]
struct WireItem {
    id: WireValue,
    title: String,
    price: WirePrice,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    photo: Option<WirePhoto>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireValue {
    Text(String),
    Number(serde_json::Number),
}

impl WireValue {
    fn to_text(&self) -> String {
        match self {
            WireValue::Text(text) => text.clone(),
            WireValue::Number(number) => number.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WirePrice {
    Money {
        amount: WireValue,
        #[serde(default)]
        currency_code: Option<String>,
    },
    Plain(WireValue),
}

#[derive(Debug, Deserialize)]
struct WirePhoto {
    #[serde(default)]
    high_resolution: Option<WireHighResolution>,
}

#[derive(Debug, Deserialize)]
struct WireHighResolution {
    #[serde(default)]
    timestamp: Option<i64>,
}

impl WireItem {
    /// Upload time of the item's main photo, which is when the listing went up.
    fn posted_at(&self) -> Option<DateTime<Utc>> {
        let timestamp = self.photo.as_ref()?.high_resolution.as_ref()?.timestamp?;
        DateTime::from_timestamp(timestamp, 0)
    }

    fn into_record(self, origin: &str, now: DateTime<Utc>, fresh_window: Duration) -> Option<ListingRecord> {
        let id = self.id.to_text();
        let is_fresh = self.posted_at().is_some_and(|posted_at| {
            (now - posted_at).num_seconds() < fresh_window.as_secs() as i64
        });

        let (amount, currency) = match self.price {
            WirePrice::Money { amount, currency_code } => (amount.to_text(), currency_code.or(self.currency)),
            WirePrice::Plain(amount) => (amount.to_text(), self.currency),
        };
        let Some(price) = parse_price(&amount) else {
            tracing::warn!(item = %id, price = %amount, "Skipping item with unparseable price");
            return None;
        };

        let url = self.url.unwrap_or_else(|| format!("{}/items/{}", origin, id));
        let mut record = ListingRecord::new(id, self.title, price, url, is_fresh);
        record.currency = currency;
        Some(record)
    }
}

/// Fetches catalog searches from Vinted's JSON API.
///
/// The API only answers requests carrying the cookies the site hands out on a
/// normal page load, so each origin gets a session that is refreshed on 401.
pub struct VintedFetcher {
    client: Client,
    config: FetcherConfig,
    sessions: RwLock<HashMap<String, String>>,
}

impl VintedFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.request_timeout))
            .build()?;

        Ok(Self {
            client,
            config,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    async fn session(&self, origin: &str) -> Result<String, FetchError> {
        if let Some(cookies) = self.sessions.read().await.get(origin) {
            return Ok(cookies.clone());
        }

        let response = self.client.get(origin).send().await?;
        let cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| value.split(';').next())
            .map(str::trim)
            .filter(|pair| pair.contains('='))
            .collect::<Vec<_>>()
            .join("; ");

        if cookies.is_empty() {
            return Err(FetchError::Session(format!(
                "{} returned {} without session cookies",
                origin,
                response.status()
            )));
        }

        tracing::debug!(origin, "Started Vinted session");
        self.sessions.write().await.insert(origin.to_string(), cookies.clone());
        Ok(cookies)
    }

    async fn fetch_items(&self, request: &CatalogRequest) -> Result<Vec<WireItem>, FetchError> {
        let cookies = self.session(&request.origin).await?;

        let response = self
            .client
            .get(request.api_url.clone())
            .header(COOKIE, cookies)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            // Next attempt starts a fresh session.
            self.sessions.write().await.remove(&request.origin);
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: request.api_url.to_string(),
            });
        }

        let body = response.bytes().await?;
        let catalog: CatalogResponse =
            serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))?;
        Ok(catalog.items)
    }
}

#[async_trait]
impl ListingFetcher for VintedFetcher {
    async fn fetch(&self, endpoint: &str) -> Result<ListingSet, FetchError> {
        let request = CatalogRequest::from_endpoint(endpoint, self.config.per_page)?;

        let retries = self.config.retry_attempts.saturating_sub(1) as usize;
        let strategy = FixedInterval::from_millis(self.config.retry_delay_ms).take(retries);

        let items = RetryIf::start(
            strategy,
            || self.fetch_items(&request),
            |e: &FetchError| {
                let transient = e.is_transient();
                if transient {
                    tracing::debug!(error = %e, "Retrying Vinted request");
                }
                transient
            },
        )
        .await?;

        let now = Utc::now();
        let fresh_window = Duration::from_secs(self.config.fresh_window_secs);

        Ok(items
            .into_iter()
            .filter_map(|item| item.into_record(&request.origin, now, fresh_window))
            .collect())
    }
}
