use async_trait::async_trait;
use domain::song::Song;
use std::sync::Arc;

/// 歌曲列表缓存键：合集 + 是否包含已删除
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SongListKey {
    pub collection: String,
    pub include_deleted: bool,
}

impl SongListKey {
    pub fn new(collection: impl Into<String>, include_deleted: bool) -> Self {
        Self {
            collection: collection.into(),
            include_deleted,
        }
    }

    /// 同一合集的两种变体
    pub fn variants(collection: &str) -> [SongListKey; 2] {
        [
            SongListKey::new(collection, false),
            SongListKey::new(collection, true),
        ]
    }
}

/// 歌曲列表缓存 trait
///
/// 缓存的列表不带访问 URL，写入后不可变；变更只能先失效再重新加载。
#[async_trait]
pub trait SongListCache: Send + Sync {
    async fn get(&self, key: &SongListKey) -> Option<Arc<Vec<Song>>>;

    async fn put(&self, key: SongListKey, songs: Arc<Vec<Song>>);

    /// 使某个合集的所有变体失效
    async fn invalidate_collection(&self, collection: &str);

    async fn invalidate_all(&self);
}
