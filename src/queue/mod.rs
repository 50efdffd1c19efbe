//! Queue substrate: a uniform enqueue/consume/stats abstraction layered
//! under the per-channel tiered topology

pub mod memory_substrate;
pub mod redis_substrate;
pub mod substrate;
pub mod topology;

pub use memory_substrate::InMemoryQueueSubstrate;
pub use redis_substrate::RedisQueueSubstrate;
pub use substrate::{
    EnqueueOptions, JobEnvelope, QueueSubstrate, QueueSubstrateError, SubstrateQueueStats,
};
pub use topology::{ChannelFamily, QueueTopology, Tier, TierPolicy};
