pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod locks;
pub mod middleware;
pub mod models;
pub mod redis_client;
pub mod services;

use std::sync::Arc;

use crate::locks::{LockReclaimer, LockStore, SeatLockManager};
use crate::services::confirmation::ConfirmationService;

// Shared state for the whole application. Connections are opened once at
// startup and handed around as cloneable handles.
#[derive(Clone)]
pub struct AppState {
    pub db: database::Database,
    pub redis: redis_client::RedisClient,
    pub lock_store: LockStore,
    pub locks: SeatLockManager,
    pub reclaimer: LockReclaimer,
    pub confirmations: ConfirmationService,
    pub config: config::Config,
}

impl AppState {
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let db = database::Database::new(&config.database.url, config.database.pool_size).await?;

        db.run_migrations().await?;

        let redis = redis_client::RedisClient::new(&config.redis.url).await?;
        let lock_store = LockStore::new(redis.clone());
        let locks = SeatLockManager::new(db.clone(), lock_store.clone(), config.locks.clone());
        let reclaimer = LockReclaimer::new(db.clone(), lock_store.clone(), config.locks.clone());
        let confirmations = ConfirmationService::new(db.clone(), lock_store.clone());

        Ok(Arc::new(Self {
            db,
            redis,
            lock_store,
            locks,
            reclaimer,
            confirmations,
            config,
        }))
    }
}
