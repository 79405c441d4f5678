use application::query::song_list_cache::{SongListCache, SongListKey};
use async_trait::async_trait;
use domain::song::Song;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// 合集数量有限，缓存条目上限只是兜底
const MAX_ENTRIES: u64 = 1024;

/// 基于 moka 的歌曲列表缓存，条目写入后按 TTL 过期
#[derive(Clone)]
pub struct MokaSongListCache {
    cache: Cache<SongListKey, Arc<Vec<Song>>>,
}

impl MokaSongListCache {
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(MAX_ENTRIES)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }
}

#[async_trait]
impl SongListCache for MokaSongListCache {
    async fn get(&self, key: &SongListKey) -> Option<Arc<Vec<Song>>> {
        self.cache.get(key).await
    }

    async fn put(&self, key: SongListKey, songs: Arc<Vec<Song>>) {
        self.cache.insert(key, songs).await;
    }

    async fn invalidate_collection(&self, collection: &str) {
        for key in SongListKey::variants(collection) {
            self.cache.invalidate(&key).await;
        }
    }

    async fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}
