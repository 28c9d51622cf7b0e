use std::sync::Arc;
use std::time::Duration;

use diesel::{
    pg::PgConnection,
    r2d2::{ConnectionManager, PooledConnection},
};

use crate::{
    config::AppConfig,
    db::PgPool,
    error::{AppError, AppResult},
    storage::ObjectStorage,
    validation::UploadPolicy,
};

pub type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn ObjectStorage>,
    pub policy: Arc<UploadPolicy>,
}

impl AppState {
    pub fn new(pool: PgPool, config: AppConfig, storage: Arc<dyn ObjectStorage>) -> Self {
        let policy = config.upload_policy();
        Self {
            pool,
            config: Arc::new(config),
            storage,
            policy: Arc::new(policy),
        }
    }

    pub fn db(&self) -> AppResult<PgPooledConnection> {
        self.pool
            .get()
            .map_err(|err| AppError::persistence(format!("database pool error: {err}")))
    }

    pub fn presigned_url_ttl(&self) -> Duration {
        Duration::from_secs(self.config.presigned_url_ttl_seconds)
    }
}
