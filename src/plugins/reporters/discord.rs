use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::config::DiscordConfig;
use crate::models::{CycleReport, Delta, ListingRecord};
use crate::plugins::traits::Reporter;
use crate::utils::error::ReportError;

/// Discord accepts at most this many embeds per webhook message.
const MAX_EMBEDS: usize = 10;
const EMBED_COLOR: u32 = 0x09b1ba;

#[derive(Debug, Clone)]
pub struct DiscordWebhook {
    pub webhook_url: String,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
}

impl DiscordWebhook {
    /// `None` when no webhook URL is configured.
    pub fn from_config(config: &DiscordConfig) -> Option<Self> {
        config.webhook_url.as_ref().map(|webhook_url| DiscordWebhook {
            webhook_url: webhook_url.clone(),
            username: Some(config.username.clone()),
            avatar_url: config.avatar_url.clone(),
        })
    }
}

/// Posts new listings to a Discord channel, one message per query.
/// Cycles without new listings send nothing.
pub struct DiscordReporter {
    client: Client,
    webhook: DiscordWebhook,
}

impl DiscordReporter {
    pub fn new(webhook: DiscordWebhook) -> Self {
        DiscordReporter {
            client: Client::new(),
            webhook,
        }
    }

    fn create_embed(&self, record: &ListingRecord) -> serde_json::Value {
        json!({
            "title": record.title,
            "url": record.url,
            "color": EMBED_COLOR,
            "fields": [
                {
                    "name": "💰 Price",
                    "value": record.formatted_price(),
                    "inline": true
                },
                {
                    "name": "🆔 Item",
                    "value": record.id,
                    "inline": true
                }
            ],
            "footer": {
                "text": "Vinted Watcher"
            }
        })
    }

    /// Webhook payloads for one query's delta, split to respect the embed limit.
    pub fn create_webhook_payloads(&self, query: &str, delta: &Delta) -> Vec<serde_json::Value> {
        let records: Vec<&ListingRecord> = delta.iter().collect();

        records
            .chunks(MAX_EMBEDS)
            .map(|chunk| {
                let mut payload = json!({
                    "content": format!("🆕 {} new listing(s) for **{}**", chunk.len(), query),
                    "embeds": chunk.iter().map(|record| self.create_embed(record)).collect::<Vec<_>>()
                });

                if let Some(username) = &self.webhook.username {
                    payload["username"] = json!(username);
                }
                if let Some(avatar_url) = &self.webhook.avatar_url {
                    payload["avatar_url"] = json!(avatar_url);
                }

                payload
            })
            .collect()
    }

    async fn send(&self, payload: &serde_json::Value) -> Result<(), ReportError> {
        let response = self
            .client
            .post(&self.webhook.webhook_url)
            .json(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ReportError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl Reporter for DiscordReporter {
    fn name(&self) -> &str {
        "Discord Reporter"
    }

    fn plugin_type(&self) -> &str {
        "discord"
    }

    /// A rejected post is logged and does not hold back the other queries;
    /// the last error is returned once every query has been tried.
    async fn report(&self, report: &CycleReport) -> Result<(), ReportError> {
        let mut last_error = None;

        for (query, delta) in report.new_items() {
            for payload in self.create_webhook_payloads(query, delta) {
                if let Err(e) = self.send(&payload).await {
                    tracing::warn!(query, error = %e, "Failed to post new listings to Discord");
                    last_error = Some(e);
                }
            }
            tracing::debug!(query, new_items = delta.len(), "Posted new listings to Discord");
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
