//! 共享易失存储的能力接口
//!
//! 所有进程共用同一个计数存储和同一个发布订阅通道。这里只描述原语，
//! 每个原语在存储侧都是原子的；跨原语没有事务。

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store call timed out: {0}")]
    Timeout(String),
    #[error("channel closed: {0}")]
    Closed(String),
}

/// 原子计数 / 集合存储
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// 整数键加上 delta（可为负），返回新值；键不存在时按 0 处理
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError>;
    async fn get_int(&self, key: &str) -> Result<Option<i64>, StoreError>;
    async fn set_int(&self, key: &str, value: i64) -> Result<(), StoreError>;

    /// 哈希字段加上 delta，返回新值
    async fn hash_incr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64, StoreError>;
    async fn hash_set(&self, key: &str, field: &str, value: i64) -> Result<(), StoreError>;
    async fn hash_entries(&self, key: &str) -> Result<HashMap<String, i64>, StoreError>;

    /// 返回成员是否是新加入的
    async fn set_add(&self, key: &str, member: &str) -> Result<bool, StoreError>;
    /// 返回成员是否原本存在
    async fn set_remove(&self, key: &str, member: &str) -> Result<bool, StoreError>;
    /// 把成员从 src 原子地移动到 dst，src 中不存在时仍会加入 dst
    async fn set_move(&self, src: &str, dst: &str, member: &str) -> Result<bool, StoreError>;
    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, StoreError>;
    async fn set_size(&self, key: &str) -> Result<u64, StoreError>;
    async fn set_members(&self, key: &str) -> Result<HashSet<String>, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// 发布订阅通道，每条消息对每个订阅者至多投递一次
#[async_trait]
pub trait PubSubChannel: Send + Sync {
    /// 返回收到消息的订阅者数量
    async fn publish(&self, channel: &str, message: String) -> Result<usize, StoreError>;
    async fn subscribe(&self, channel: &str) -> Result<BoxStream<'static, String>, StoreError>;
}
