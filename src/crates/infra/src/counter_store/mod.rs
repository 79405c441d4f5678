mod in_memory;
mod redis_backed;
mod timeout;

pub use in_memory::InMemoryCounterStore;
pub(crate) use redis_backed::unavailable;
pub use redis_backed::RedisCounterStore;
pub use timeout::TimeoutCounterStore;
