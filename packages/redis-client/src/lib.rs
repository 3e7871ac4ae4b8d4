pub mod redis_manager;

pub use redis_manager::RedisManager;
