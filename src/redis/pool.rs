//! Redis connection pool for persistent storage backends.
//!
//! Provides a managed Redis connection pool with circuit breaker
//! integration for resilient data operations (queue substrate, token
//! registry, distributed rate limiting).

use std::sync::Arc;

use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisError, RedisResult};
use tokio::sync::RwLock;

use crate::config::RedisConfig;

use super::{CircuitBreaker, CircuitState, RedisHealth};

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    #[error("Circuit breaker is open")]
    CircuitOpen,

    #[error("Connection not available: {0}")]
    ConnectionUnavailable(String),
}

/// Redis connection pool for data operations.
///
/// Unlike the Pub/Sub subscriber which uses a dedicated connection, this
/// pool uses multiplexed connections suitable for commands.
pub struct RedisPool {
    client: Client,
    connection: RwLock<Option<MultiplexedConnection>>,
    circuit_breaker: Arc<CircuitBreaker>,
    health: Arc<RedisHealth>,
    config: RedisConfig,
}

impl RedisPool {
    pub fn new(
        config: RedisConfig,
        circuit_breaker: Arc<CircuitBreaker>,
        health: Arc<RedisHealth>,
    ) -> Result<Self, PoolError> {
        let client = Client::open(config.url.as_str())?;

        Ok(Self {
            client,
            connection: RwLock::new(None),
            circuit_breaker,
            health,
            config,
        })
    }

    pub async fn get_connection(&self) -> Result<MultiplexedConnection, PoolError> {
        if !self.circuit_breaker.allow_request() {
            self.health.set_circuit_open();
            return Err(PoolError::CircuitOpen);
        }

        {
            let conn = self.connection.read().await;
            if let Some(ref c) = *conn {
                return Ok(c.clone());
            }
        }

        self.connect().await
    }

    async fn connect(&self) -> Result<MultiplexedConnection, PoolError> {
        let mut conn_guard = self.connection.write().await;

        if let Some(ref c) = *conn_guard {
            return Ok(c.clone());
        }

        self.health.set_reconnecting();

        match self.client.get_multiplexed_tokio_connection().await {
            Ok(conn) => {
                *conn_guard = Some(conn.clone());
                self.circuit_breaker.record_success();
                self.health.set_connected();
                tracing::info!("Redis pool connection established");
                Ok(conn)
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                tracing::error!(error = %e, "Failed to connect to Redis");
                Err(PoolError::Redis(e))
            }
        }
    }

    pub async fn execute<F, T, Fut>(&self, f: F) -> Result<T, PoolError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: std::future::Future<Output = RedisResult<T>>,
    {
        let conn = self.get_connection().await?;

        match f(conn).await {
            Ok(result) => {
                self.circuit_breaker.record_success();
                Ok(result)
            }
            Err(e) => {
                if e.is_connection_dropped() || e.is_io_error() {
                    let mut conn_guard = self.connection.write().await;
                    *conn_guard = None;
                }
                self.circuit_breaker.record_failure();
                Err(PoolError::Redis(e))
            }
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.health.is_healthy() && self.circuit_breaker.state() == CircuitState::Closed
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state()
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    pub async fn ping(&self) -> Result<(), PoolError> {
        let mut conn = self.get_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

/// Typed helper methods for the common Redis commands used by the queue
/// substrate, token registry, and distributed rate limiter.
#[async_trait::async_trait]
pub trait RedisPoolExt {
    async fn xadd_maxlen(
        &self,
        key: &str,
        maxlen: usize,
        fields: &[(&str, &str)],
    ) -> Result<String, PoolError>;

    async fn xrange_all(&self, key: &str) -> Result<Vec<(String, Vec<(String, String)>)>, PoolError>;

    async fn del(&self, key: &str) -> Result<(), PoolError>;

    async fn exists(&self, key: &str) -> Result<bool, PoolError>;

    async fn hset_multiple(&self, key: &str, fields: &[(&str, &str)]) -> Result<(), PoolError>;

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, PoolError>;

    async fn hgetall(&self, key: &str) -> Result<Vec<(String, String)>, PoolError>;

    async fn hdel(&self, key: &str) -> Result<(), PoolError>;

    async fn hincrby(&self, key: &str, field: &str, increment: i64) -> Result<i64, PoolError>;

    async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<(), PoolError>;

    async fn zrem(&self, key: &str, member: &str) -> Result<(), PoolError>;

    async fn zrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<Vec<String>, PoolError>;

    async fn expire(&self, key: &str, seconds: i64) -> Result<(), PoolError>;
}

#[async_trait::async_trait]
impl RedisPoolExt for RedisPool {
    async fn xadd_maxlen(
        &self,
        key: &str,
        maxlen: usize,
        fields: &[(&str, &str)],
    ) -> Result<String, PoolError> {
        let mut conn = self.get_connection().await?;
        let mut cmd = redis::cmd("XADD");
        cmd.arg(key).arg("MAXLEN").arg("~").arg(maxlen).arg("*");
        for (field, value) in fields {
            cmd.arg(*field).arg(*value);
        }
        match cmd.query_async(&mut conn).await {
            Ok(id) => {
                self.circuit_breaker.record_success();
                Ok(id)
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                Err(PoolError::Redis(e))
            }
        }
    }

    async fn xrange_all(&self, key: &str) -> Result<Vec<(String, Vec<(String, String)>)>, PoolError> {
        let mut conn = self.get_connection().await?;
        match redis::cmd("XRANGE")
            .arg(key)
            .arg("-")
            .arg("+")
            .query_async(&mut conn)
            .await
        {
            Ok(result) => {
                self.circuit_breaker.record_success();
                Ok(result)
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                Err(PoolError::Redis(e))
            }
        }
    }

    async fn del(&self, key: &str) -> Result<(), PoolError> {
        let mut conn = self.get_connection().await?;
        match conn.del::<_, ()>(key).await {
            Ok(_) => {
                self.circuit_breaker.record_success();
                Ok(())
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                Err(PoolError::Redis(e))
            }
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, PoolError> {
        let mut conn = self.get_connection().await?;
        match conn.exists(key).await {
            Ok(result) => {
                self.circuit_breaker.record_success();
                Ok(result)
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                Err(PoolError::Redis(e))
            }
        }
    }

    async fn hset_multiple(&self, key: &str, fields: &[(&str, &str)]) -> Result<(), PoolError> {
        let mut conn = self.get_connection().await?;
        match conn.hset_multiple::<_, _, _, ()>(key, fields).await {
            Ok(_) => {
                self.circuit_breaker.record_success();
                Ok(())
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                Err(PoolError::Redis(e))
            }
        }
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, PoolError> {
        let mut conn = self.get_connection().await?;
        match conn.hget(key, field).await {
            Ok(result) => {
                self.circuit_breaker.record_success();
                Ok(result)
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                Err(PoolError::Redis(e))
            }
        }
    }

    async fn hgetall(&self, key: &str) -> Result<Vec<(String, String)>, PoolError> {
        let mut conn = self.get_connection().await?;
        match conn.hgetall(key).await {
            Ok(result) => {
                self.circuit_breaker.record_success();
                Ok(result)
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                Err(PoolError::Redis(e))
            }
        }
    }

    async fn hdel(&self, key: &str) -> Result<(), PoolError> {
        self.del(key).await
    }

    async fn hincrby(&self, key: &str, field: &str, increment: i64) -> Result<i64, PoolError> {
        let mut conn = self.get_connection().await?;
        match conn.hincr(key, field, increment).await {
            Ok(result) => {
                self.circuit_breaker.record_success();
                Ok(result)
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                Err(PoolError::Redis(e))
            }
        }
    }

    async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<(), PoolError> {
        let mut conn = self.get_connection().await?;
        match conn.zadd::<_, _, _, ()>(key, member, score).await {
            Ok(_) => {
                self.circuit_breaker.record_success();
                Ok(())
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                Err(PoolError::Redis(e))
            }
        }
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<(), PoolError> {
        let mut conn = self.get_connection().await?;
        match conn.zrem::<_, _, ()>(key, member).await {
            Ok(_) => {
                self.circuit_breaker.record_success();
                Ok(())
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                Err(PoolError::Redis(e))
            }
        }
    }

    async fn zrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<Vec<String>, PoolError> {
        let mut conn = self.get_connection().await?;
        match conn.zrangebyscore(key, min, max).await {
            Ok(result) => {
                self.circuit_breaker.record_success();
                Ok(result)
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                Err(PoolError::Redis(e))
            }
        }
    }

    async fn expire(&self, key: &str, seconds: i64) -> Result<(), PoolError> {
        let mut conn = self.get_connection().await?;
        match conn.expire::<_, ()>(key, seconds).await {
            Ok(_) => {
                self.circuit_breaker.record_success();
                Ok(())
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                Err(PoolError::Redis(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> RedisConfig {
        RedisConfig {
            url: "redis://localhost:6379".to_string(),
            channels: vec![],
            circuit_breaker_failure_threshold: 5,
            circuit_breaker_success_threshold: 2,
            circuit_breaker_reset_timeout_seconds: 30,
            backoff_initial_delay_ms: 100,
            backoff_max_delay_ms: 30000,
        }
    }

    #[test]
    fn test_pool_creation() {
        let config = create_test_config();
        let cb = Arc::new(CircuitBreaker::new());
        let health = Arc::new(RedisHealth::new());

        let pool = RedisPool::new(config, cb.clone(), health.clone());
        assert!(pool.is_ok());

        let pool = pool.unwrap();
        assert_eq!(pool.url(), "redis://localhost:6379");
    }

    #[test]
    fn test_pool_circuit_breaker_integration() {
        let config = create_test_config();
        let cb = Arc::new(CircuitBreaker::new());
        let health = Arc::new(RedisHealth::new());

        let pool = RedisPool::new(config, cb.clone(), health.clone()).unwrap();

        assert_eq!(pool.circuit_state(), CircuitState::Closed);

        for _ in 0..5 {
            cb.record_failure();
        }

        assert_eq!(pool.circuit_state(), CircuitState::Open);
        assert!(!pool.is_healthy());
    }

    #[test]
    fn test_pool_error_display() {
        let circuit_err = PoolError::CircuitOpen;
        assert_eq!(format!("{}", circuit_err), "Circuit breaker is open");

        let unavail_err = PoolError::ConnectionUnavailable("test".to_string());
        assert!(format!("{}", unavail_err).contains("test"));
    }
}
