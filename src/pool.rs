use deadpool::{managed, Runtime};
use std::time::Duration;
use tracing::debug;

use crate::error::GatewayError;
use crate::surreal_client::SurrealClient;

#[derive(Debug, Clone)]
pub struct SurrealConnectionConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    pub namespace: String,
    pub database: String,
}

impl SurrealConnectionConfig {
    /// Embedded engines (`mem://`, `surrealkv://`) have no root user to sign in as.
    pub fn is_embedded(&self) -> bool {
        self.url.starts_with("mem:") || self.url.starts_with("surrealkv:")
    }
}

#[derive(Debug)]
pub struct SurrealConnectionManager {
    config: SurrealConnectionConfig,
}

impl SurrealConnectionManager {
    pub fn new(config: SurrealConnectionConfig) -> Self {
        Self { config }
    }
}

impl managed::Manager for SurrealConnectionManager {
    type Type = SurrealClient;
    type Error = GatewayError;

    async fn create(&self) -> Result<Self::Type, Self::Error> {
        debug!(url = %self.config.url, "Opening SurrealDB connection");
        SurrealClient::connect(&self.config).await
    }

    async fn recycle(
        &self,
        conn: &mut Self::Type,
        _: &managed::Metrics,
    ) -> managed::RecycleResult<Self::Error> {
        conn.ping().await.map_err(|e| {
            managed::RecycleError::Backend(GatewayError::PoolError(format!(
                "Stale SurrealDB connection: {}",
                e
            )))
        })
    }
}

pub type SurrealPool = managed::Pool<SurrealConnectionManager>;

#[derive(Clone)]
pub struct PoolConfig {
    pub max_size: usize,
    pub idle_timeout: Option<Duration>,
    pub connection_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 10,
            idle_timeout: Some(Duration::from_secs(600)), // 10 minutes
            connection_timeout: Duration::from_secs(30),
        }
    }
}

/// Builds the connection pool. Embedded engines are capped at one connection
/// because every `mem://` connection opens a separate datastore.
pub fn create_pool(
    connection_config: SurrealConnectionConfig,
    pool_config: PoolConfig,
) -> Result<SurrealPool, GatewayError> {
    let max_size = if connection_config.is_embedded() {
        1
    } else {
        pool_config.max_size
    };
    let manager = SurrealConnectionManager::new(connection_config);

    managed::Pool::builder(manager)
        .max_size(max_size)
        .runtime(Runtime::Tokio1)
        .create_timeout(Some(pool_config.connection_timeout))
        .recycle_timeout(pool_config.idle_timeout)
        .build()
        .map_err(|e| GatewayError::PoolError(format!("Failed to create connection pool: {}", e)))
}
