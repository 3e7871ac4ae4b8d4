pub mod scraper;
pub mod target;
pub mod types;

pub use scraper::{EventScraper, HttpSnapshotScraper, ScrapeError};
pub use target::resolve_scrape_target;
pub use types::{EventSnapshot, FightSnapshot, SnapshotResult};
