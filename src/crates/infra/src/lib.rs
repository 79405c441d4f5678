pub mod cache;
pub use cache::MokaSongListCache;

pub mod config;
pub use config::AppConfigImpl;

pub mod counter_store;
pub use counter_store::{InMemoryCounterStore, RedisCounterStore, TimeoutCounterStore};

pub mod pubsub;
pub use pubsub::{InMemoryPubSub, RedisPubSub};

pub mod repository;

pub mod signer;
pub use signer::HmacUrlSigner;
