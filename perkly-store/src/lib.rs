pub mod app_config;
pub mod database;
pub mod events;
pub mod memory_cache;
pub mod memory_repo;
pub mod offer_repo;
pub mod redis_repo;
pub mod transaction_repo;

pub use database::DbClient;
pub use events::EventPublisher;
pub use memory_cache::InMemoryCache;
pub use memory_repo::InMemoryRecordStore;
pub use offer_repo::PostgresRecordStore;
pub use redis_repo::RedisClient;
