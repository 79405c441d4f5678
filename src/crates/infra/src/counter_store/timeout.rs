use application::store::{CounterStore, StoreError};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Duration;

/// 给每次存储调用加上超时上限，超时返回 `StoreError::Timeout`
pub struct TimeoutCounterStore<S> {
    inner: S,
    limit: Duration,
}

impl<S: CounterStore> TimeoutCounterStore<S> {
    pub fn new(inner: S, limit: Duration) -> Self {
        Self { inner, limit }
    }

    async fn bounded<T>(
        &self,
        op: &str,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(format!(
                "{} exceeded {}ms",
                op,
                self.limit.as_millis()
            ))),
        }
    }
}

#[async_trait]
impl<S: CounterStore> CounterStore for TimeoutCounterStore<S> {
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        self.bounded("incr_by", self.inner.incr_by(key, delta)).await
    }

    async fn get_int(&self, key: &str) -> Result<Option<i64>, StoreError> {
        self.bounded("get_int", self.inner.get_int(key)).await
    }

    async fn set_int(&self, key: &str, value: i64) -> Result<(), StoreError> {
        self.bounded("set_int", self.inner.set_int(key, value)).await
    }

    async fn hash_incr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64, StoreError> {
        self.bounded("hash_incr_by", self.inner.hash_incr_by(key, field, delta))
            .await
    }

    async fn hash_set(&self, key: &str, field: &str, value: i64) -> Result<(), StoreError> {
        self.bounded("hash_set", self.inner.hash_set(key, field, value))
            .await
    }

    async fn hash_entries(&self, key: &str) -> Result<HashMap<String, i64>, StoreError> {
        self.bounded("hash_entries", self.inner.hash_entries(key))
            .await
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.bounded("set_add", self.inner.set_add(key, member)).await
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.bounded("set_remove", self.inner.set_remove(key, member))
            .await
    }

    async fn set_move(&self, src: &str, dst: &str, member: &str) -> Result<bool, StoreError> {
        self.bounded("set_move", self.inner.set_move(src, dst, member))
            .await
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.bounded("set_contains", self.inner.set_contains(key, member))
            .await
    }

    async fn set_size(&self, key: &str) -> Result<u64, StoreError> {
        self.bounded("set_size", self.inner.set_size(key)).await
    }

    async fn set_members(&self, key: &str) -> Result<HashSet<String>, StoreError> {
        self.bounded("set_members", self.inner.set_members(key)).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.bounded("delete", self.inner.delete(key)).await
    }
}
