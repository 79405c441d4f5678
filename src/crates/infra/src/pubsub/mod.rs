mod in_memory;
mod redis_backed;

pub use in_memory::InMemoryPubSub;
pub use redis_backed::RedisPubSub;
