//! Redis integration for cachesync: a shared L2 tier and a pub/sub
//! transport for invalidation messages.

pub mod bus;
pub mod listener;
pub mod pool;
pub mod tier;

pub use bus::RedisBus;
pub use listener::InvalidationListener;
pub use pool::{RedisPoolSettings, RedisSetupError, connect};
pub use tier::{RedisTier, RedisTierProvider, redis_key};
