//! Sticky-session load balancer: round-robin for plain HTTP requests,
//! hash-pinned affinity for duplex-socket upgrades so a reconnecting client
//! lands back on the instance holding its session. Health is polled on a
//! background interval, following the same `tokio::select!`-against-shutdown
//! shape as the socket heartbeat sweep; unhealthy instances are excluded
//! from new placements but existing sticky sessions are left to drain
//! naturally rather than force-evicted.

mod affinity;
mod health;
mod service;

pub use affinity::{AffinityTable, SessionKey};
pub use health::{BackendHealth, HealthPoller};
pub use service::{Backend, BalancerService, InstanceId};
