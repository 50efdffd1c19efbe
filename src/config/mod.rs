mod settings;

pub use settings::{
    ApiConfig, BalancerConfig, CleanupConfig, DatabaseConfig, FcmConfig, JwtConfig, OtelConfig,
    QueueSettings, QueueSubstrateKind, RateLimitConfig, RedisConfig, ServerConfig, Settings,
    SmtpConfig, WebSocketConfig,
};
