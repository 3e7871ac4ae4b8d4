use async_trait::async_trait;
use log::debug;
use std::time::Duration;
use thiserror::Error;

use crate::types::EventSnapshot;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("scrape request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("scrape target {target} returned status {status}")]
    BadStatus { target: String, status: u16 },
    #[error("scrape target {target} returned an unreadable payload: {message}")]
    BadPayload { target: String, message: String },
}

/// Promotion-specific scrapers implement this; the tracker only ever sees
/// the normalized snapshot.
#[async_trait]
pub trait EventScraper: Send + Sync {
    async fn scrape(&self, target: &str) -> Result<EventSnapshot, ScrapeError>;
}

/// Fetches a normalized snapshot as JSON over HTTP. The promotion-specific
/// markup handling lives behind whatever serves this endpoint; this client
/// is just the transport, with a hard request timeout.
pub struct HttpSnapshotScraper {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSnapshotScraper {
    pub fn new(base_url: &str) -> Self {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT_SECS)
    }

    pub fn with_timeout(base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url_for(&self, target: &str) -> String {
        if target.starts_with("http://") || target.starts_with("https://") {
            target.to_string()
        } else {
            format!("{}/live/{}", self.base_url, target)
        }
    }
}

#[async_trait]
impl EventScraper for HttpSnapshotScraper {
    async fn scrape(&self, target: &str) -> Result<EventSnapshot, ScrapeError> {
        let url = self.url_for(target);
        debug!("scraping live snapshot from {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::BadStatus {
                target: target.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .json::<EventSnapshot>()
            .await
            .map_err(|e| ScrapeError::BadPayload {
                target: target.to_string(),
                message: e.to_string(),
            })
    }
}
