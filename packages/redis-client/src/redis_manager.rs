use fred::prelude::*;
use log::info;
use once_cell::sync::OnceCell;

/// Process-wide Redis handle used for publishing live-tracking side effects
/// (next-fight notifications). Publishing is fire-and-forget for callers:
/// they log failures and move on.
#[derive(Clone)]
pub struct RedisManager {
    client: RedisClient,
}

static INSTANCE: OnceCell<RedisManager> = OnceCell::new();

impl RedisManager {
    pub fn new(redis_url: &str) -> Result<Self, RedisError> {
        let config = RedisConfig::from_url(redis_url)?;
        let client = RedisClient::new(config, None, None, None);

        Ok(Self { client })
    }

    pub fn init_global(redis_url: &str) -> Result<&'static RedisManager, RedisError> {
        INSTANCE.get_or_try_init(|| Self::new(redis_url))
    }

    pub fn global() -> Option<&'static RedisManager> {
        INSTANCE.get()
    }

    pub fn client(&self) -> RedisClient {
        self.client.clone()
    }

    pub async fn connect(&self) -> Result<(), RedisError> {
        self.client.connect();
        self.client.wait_for_connect().await?;
        info!("Connected to Redis");
        Ok(())
    }

    pub async fn publish(&self, channel: &str, payload: &str) -> Result<(), RedisError> {
        self.client.publish::<(), _, _>(channel, payload).await
    }

    pub async fn stream_add(&self, stream: &str, pairs: &[(&str, &str)]) -> Result<(), RedisError> {
        let mut fields: Vec<(String, String)> = Vec::with_capacity(pairs.len());
        for (field, value) in pairs {
            fields.push(((*field).to_owned(), (*value).to_owned()));
        }

        self.client
            .xadd::<(), _, _, _, _>(stream, false, None, "*", fields)
            .await
    }
}
