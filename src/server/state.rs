use std::sync::Arc;

use crate::auth::JwtValidator;
use crate::cluster::{create_session_store, ClusterRouter, SessionStore};
use crate::config::{QueueSubstrateKind, Settings};
use crate::orchestrator::Orchestrator;
use crate::postgres::PostgresPool;
use crate::queue::{InMemoryQueueSubstrate, QueueSubstrate, RedisQueueSubstrate};
use crate::ratelimit::{RateLimitConfig as RateLimiterConfig, RateLimiter};
use crate::redis::{CircuitBreaker, RedisHealth, RedisPool};
use crate::socket::ConnectionManager;
use crate::store::{NotificationStore, PostgresStore};
use crate::telemetry::StageLog;
use crate::token_registry::{PostgresTokenRegistry, TokenRegistry};

/// Shared application state handed to every HTTP/WS handler and background
/// task. Every backing store is wired up eagerly so a bad connection string
/// fails fast at startup instead of on first request.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub jwt_validator: Arc<JwtValidator>,
    pub connection_manager: Arc<ConnectionManager>,
    pub session_store: Arc<dyn SessionStore>,
    pub router: Arc<ClusterRouter>,
    pub store: Arc<dyn NotificationStore>,
    pub token_registry: Arc<dyn TokenRegistry>,
    pub queue_substrate: Arc<dyn QueueSubstrate>,
    pub orchestrator: Arc<Orchestrator>,
    pub postgres_pool: PostgresPool,
    pub redis_health: Arc<RedisHealth>,
    pub redis_circuit_breaker: Arc<CircuitBreaker>,
    pub rate_limiter: Arc<RateLimiter>,
    pub stage_log: Arc<StageLog>,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub async fn new(settings: Settings) -> anyhow::Result<Self> {
        let redis_circuit_breaker = Arc::new(CircuitBreaker::new());
        let redis_health = Arc::new(RedisHealth::new());

        let postgres_pool =
            PostgresPool::new(&settings.database, redis_circuit_breaker.clone()).await?;

        let store: Arc<dyn NotificationStore> =
            Arc::new(PostgresStore::new(postgres_pool.clone()));
        let token_registry: Arc<dyn TokenRegistry> =
            Arc::new(PostgresTokenRegistry::new(postgres_pool.clone()));

        let queue_substrate: Arc<dyn QueueSubstrate> = match settings.queue.substrate {
            QueueSubstrateKind::Memory => {
                Arc::new(InMemoryQueueSubstrate::new(settings.queue.enabled))
            }
            QueueSubstrateKind::Redis => {
                let client = redis::Client::open(settings.redis.url.as_str())?;
                let conn = client.get_connection_manager().await?;
                Arc::new(RedisQueueSubstrate::new(
                    conn,
                    settings.queue.enabled,
                    settings.queue.key_prefix.clone(),
                ))
            }
        };

        let redis_pool = if settings.cluster.enabled {
            Some(Arc::new(RedisPool::new(
                settings.redis.clone(),
                redis_circuit_breaker.clone(),
                redis_health.clone(),
            )?))
        } else {
            None
        };
        let session_store = create_session_store(&settings.cluster, redis_pool);

        let connection_manager = Arc::new(ConnectionManager::new());
        let router = Arc::new(ClusterRouter::new(
            connection_manager.clone(),
            session_store.clone(),
        ));

        let orchestrator = Arc::new(Orchestrator::new(store.clone(), queue_substrate.clone()));

        let jwt_validator = Arc::new(JwtValidator::new(&settings.jwt));
        let rate_limiter = Arc::new(RateLimiter::new(adapt_rate_limit_config(
            &settings.rate_limit,
        )));

        Ok(Self {
            settings: Arc::new(settings),
            jwt_validator,
            connection_manager,
            session_store,
            router,
            store,
            token_registry,
            queue_substrate,
            orchestrator,
            postgres_pool,
            redis_health,
            redis_circuit_breaker,
            rate_limiter,
            stage_log: Arc::new(StageLog::default()),
            start_time: std::time::Instant::now(),
        })
    }
}

/// Maps the coarse config-file rate limit knobs onto the token-bucket
/// module's richer per-surface configuration. The config file only exposes
/// one capacity/refill pair, which is applied to the HTTP surface; the
/// WebSocket knobs keep their own built-in defaults.
fn adapt_rate_limit_config(config: &crate::config::RateLimitConfig) -> RateLimiterConfig {
    RateLimiterConfig {
        enabled: config.enabled,
        http_requests_per_second: config.refill_per_second,
        http_burst_size: config.capacity,
        ..RateLimiterConfig::default()
    }
}
