use scraper_client::ScrapeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LiveError {
    #[error("live tracker is already running for event {0}")]
    TrackerAlreadyRunning(i64),
    #[error("live tracker is not initialized")]
    TrackerNotInitialized,
    #[error("event {0} not found")]
    EventNotFound(i64),
    #[error("event {0} is in manual tracker mode; automatic writers must not touch it")]
    ManualMode(i64),
    #[error("scrape of {0} timed out")]
    ScrapeTimeout(String),
    #[error("scrape failed: {0}")]
    Scrape(#[from] ScrapeError),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}
