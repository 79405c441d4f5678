use application::store::{CounterStore, StoreError};
use async_trait::async_trait;
use log::info;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use std::collections::{HashMap, HashSet};

pub(crate) fn unavailable(e: RedisError) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

/// 多进程共用的 Redis 计数存储
///
/// `ConnectionManager` 断线后自动重连，克隆开销很小，每次调用各取一份。
#[derive(Clone)]
pub struct RedisCounterStore {
    conn: ConnectionManager,
}

impl RedisCounterStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url).map_err(unavailable)?;
        let conn = ConnectionManager::new(client).await.map_err(unavailable)?;
        info!("Redis counter store connected");
        Ok(Self { conn })
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();
        conn.incr(key, delta).await.map_err(unavailable)
    }

    async fn get_int(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(unavailable)
    }

    async fn set_int(&self, key: &str, value: i64) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.set(key, value).await.map_err(unavailable)
    }

    async fn hash_incr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();
        conn.hincr(key, field, delta).await.map_err(unavailable)
    }

    async fn hash_set(&self, key: &str, field: &str, value: i64) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.hset(key, field, value).await.map_err(unavailable)?;
        Ok(())
    }

    async fn hash_entries(&self, key: &str) -> Result<HashMap<String, i64>, StoreError> {
        let mut conn = self.conn.clone();
        conn.hgetall(key).await.map_err(unavailable)
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let added: i64 = conn.sadd(key, member).await.map_err(unavailable)?;
        Ok(added > 0)
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.srem(key, member).await.map_err(unavailable)?;
        Ok(removed > 0)
    }

    /// SMOVE 在源集合里没有成员时不会写入目标集合，这里用 MULTI 包住 SREM + SADD
    async fn set_move(&self, src: &str, dst: &str, member: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let (removed, _added): (i64, i64) = redis::pipe()
            .atomic()
            .srem(src, member)
            .sadd(dst, member)
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(removed > 0)
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        conn.sismember(key, member).await.map_err(unavailable)
    }

    async fn set_size(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        conn.scard(key).await.map_err(unavailable)
    }

    async fn set_members(&self, key: &str) -> Result<HashSet<String>, StoreError> {
        let mut conn = self.conn.clone();
        conn.smembers(key).await.map_err(unavailable)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.del(key).await.map_err(unavailable)?;
        Ok(())
    }
}
