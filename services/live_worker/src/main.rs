mod delta;
mod error;
mod matching;
mod models;
mod notifier;
mod reconciler;
mod scheduler;
mod status_server;
mod store;
mod tracker;

use std::env;
use std::sync::Arc;

use dotenvy::dotenv;
use log::{info, warn};
use redis_client::RedisManager;
use scraper_client::HttpSnapshotScraper;
use sqlx::postgres::PgPoolOptions;

use crate::tracker::LiveTracker;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::init();

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set in .env");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to create Postgres pool");

    info!("Connected to Postgres Database");

    let redis_url =
        env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

    // Notifications are fire-and-forget; a missing Redis degrades them to
    // warnings instead of keeping the worker down.
    match RedisManager::init_global(&redis_url) {
        Ok(redis_manager) => {
            if let Err(e) = redis_manager.connect().await {
                warn!("Redis unavailable, next-fight notifications disabled: {:?}", e);
            }
        }
        Err(e) => warn!(
            "Failed to initialize Redis manager, next-fight notifications disabled: {:?}",
            e
        ),
    }

    let scrape_base_url =
        env::var("SCRAPE_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:9000".to_string());
    let scraper = Arc::new(HttpSnapshotScraper::new(&scrape_base_url));
    LiveTracker::init_global(pool.clone(), scraper);

    let pool_clone = pool.clone();
    tokio::spawn(async move {
        scheduler::run_live_scheduler(pool_clone).await;
    });

    let pool_clone = pool.clone();
    tokio::spawn(async move {
        reconciler::run_failsafe_reconciler(pool_clone).await;
    });

    let status_port = env::var("STATUS_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8090);
    status_server::run_status_server(pool, status_port).await?;

    Ok(())
}
