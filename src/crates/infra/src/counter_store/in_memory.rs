use application::store::{CounterStore, StoreError};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// 键空间：整数、哈希、集合三类值各占一张表
#[derive(Default)]
struct Keyspace {
    ints: HashMap<String, i64>,
    hashes: HashMap<String, HashMap<String, i64>>,
    sets: HashMap<String, HashSet<String>>,
}

/// 进程内的计数存储
///
/// 每个原语在一次加锁内完成，因此对同一个实例的所有调用者都是原子的。
/// 多个注册表共用一个实例即可模拟多进程共享同一个存储。
#[derive(Clone, Default)]
pub struct InMemoryCounterStore {
    keyspace: Arc<Mutex<Keyspace>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Keyspace>, StoreError> {
        self.keyspace
            .lock()
            .map_err(|_| StoreError::Unavailable("keyspace lock poisoned".to_string()))
    }

    /// 清空所有键，相当于易失存储整体丢失
    pub fn flush_all(&self) -> Result<(), StoreError> {
        let mut ks = self.lock()?;
        ks.ints.clear();
        ks.hashes.clear();
        ks.sets.clear();
        Ok(())
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        let mut ks = self.lock()?;
        let value = ks.ints.entry(key.to_string()).or_insert(0);
        *value += delta;
        Ok(*value)
    }

    async fn get_int(&self, key: &str) -> Result<Option<i64>, StoreError> {
        Ok(self.lock()?.ints.get(key).copied())
    }

    async fn set_int(&self, key: &str, value: i64) -> Result<(), StoreError> {
        self.lock()?.ints.insert(key.to_string(), value);
        Ok(())
    }

    async fn hash_incr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64, StoreError> {
        let mut ks = self.lock()?;
        let value = ks
            .hashes
            .entry(key.to_string())
            .or_default()
            .entry(field.to_string())
            .or_insert(0);
        *value += delta;
        Ok(*value)
    }

    async fn hash_set(&self, key: &str, field: &str, value: i64) -> Result<(), StoreError> {
        self.lock()?
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value);
        Ok(())
    }

    async fn hash_entries(&self, key: &str) -> Result<HashMap<String, i64>, StoreError> {
        Ok(self.lock()?.hashes.get(key).cloned().unwrap_or_default())
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        Ok(self
            .lock()?
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string()))
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut ks = self.lock()?;
        let Some(set) = ks.sets.get_mut(key) else {
            return Ok(false);
        };
        let removed = set.remove(member);
        if set.is_empty() {
            ks.sets.remove(key);
        }
        Ok(removed)
    }

    async fn set_move(&self, src: &str, dst: &str, member: &str) -> Result<bool, StoreError> {
        let mut ks = self.lock()?;
        let moved = match ks.sets.get_mut(src) {
            Some(set) => {
                let removed = set.remove(member);
                if set.is_empty() {
                    ks.sets.remove(src);
                }
                removed
            }
            None => false,
        };
        ks.sets
            .entry(dst.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(moved)
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        Ok(self
            .lock()?
            .sets
            .get(key)
            .map(|s| s.contains(member))
            .unwrap_or(false))
    }

    async fn set_size(&self, key: &str) -> Result<u64, StoreError> {
        Ok(self
            .lock()?
            .sets
            .get(key)
            .map(|s| s.len() as u64)
            .unwrap_or(0))
    }

    async fn set_members(&self, key: &str) -> Result<HashSet<String>, StoreError> {
        Ok(self.lock()?.sets.get(key).cloned().unwrap_or_default())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut ks = self.lock()?;
        ks.ints.remove(key);
        ks.hashes.remove(key);
        ks.sets.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_incr_by_starts_from_zero() {
        let store = InMemoryCounterStore::new();
        assert_eq!(store.incr_by("n", 1).await.unwrap(), 1);
        assert_eq!(store.incr_by("n", -3).await.unwrap(), -2);
        assert_eq!(store.get_int("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_hash_fields_are_independent() {
        let store = InMemoryCounterStore::new();
        store.hash_incr_by("h", "A", 2).await.unwrap();
        store.hash_incr_by("h", "B", 1).await.unwrap();
        store.hash_incr_by("h", "A", -1).await.unwrap();
        let entries = store.hash_entries("h").await.unwrap();
        assert_eq!(entries.get("A"), Some(&1));
        assert_eq!(entries.get("B"), Some(&1));
    }

    #[tokio::test]
    async fn test_set_move_is_a_single_step() {
        let store = InMemoryCounterStore::new();
        store.set_add("likes:1", "9").await.unwrap();
        assert!(store.set_move("likes:1", "dislikes:1", "9").await.unwrap());
        assert_eq!(store.set_size("likes:1").await.unwrap(), 0);
        assert!(store.set_contains("dislikes:1", "9").await.unwrap());

        // src 中不存在时仍然加入 dst
        assert!(!store.set_move("likes:1", "dislikes:1", "8").await.unwrap());
        assert_eq!(store.set_size("dislikes:1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_set_add_reports_new_members_only() {
        let store = InMemoryCounterStore::new();
        assert!(store.set_add("s", "1").await.unwrap());
        assert!(!store.set_add("s", "1").await.unwrap());
        assert!(store.set_remove("s", "1").await.unwrap());
        assert!(!store.set_remove("s", "1").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_and_flush() {
        let store = InMemoryCounterStore::new();
        store.set_int("total", 5).await.unwrap();
        store.hash_set("h", "A", 1).await.unwrap();
        store.delete("total").await.unwrap();
        assert_eq!(store.get_int("total").await.unwrap(), None);

        store.flush_all().unwrap();
        assert!(store.hash_entries("h").await.unwrap().is_empty());
    }
}
