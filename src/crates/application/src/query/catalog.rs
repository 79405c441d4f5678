use super::song_list_cache::{SongListCache, SongListKey};
use super::url_signer::UrlSigner;
use crate::error::AppError;
use domain::song::{Song, SongRepository};
use log::{debug, info};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// 合集：配置里的 key 对应一个展示名，歌曲按对象 key 前缀归属
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub key: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Collections {
    root: String,
    entries: Vec<Collection>,
}

impl Collections {
    pub fn new(root: impl Into<String>, mut entries: Vec<Collection>) -> Self {
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Self {
            root: root.into(),
            entries,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Collection> {
        self.entries.iter()
    }

    pub fn get(&self, key: &str) -> Option<&Collection> {
        self.entries.iter().find(|c| c.key == key)
    }

    /// `{root}/{展示名}/`
    pub fn key_prefix(&self, collection: &Collection) -> String {
        format!("{}/{}/", self.root, collection.name)
    }

    pub fn owner_of(&self, object_key: &str) -> Option<&Collection> {
        self.entries
            .iter()
            .find(|c| object_key.starts_with(&self.key_prefix(c)))
    }
}

/// 带访问 URL 的歌曲
#[derive(Debug, Clone, PartialEq)]
pub struct SongListing {
    pub song: Song,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionCount {
    pub key: String,
    pub name: String,
    pub active_songs: usize,
}

/// 歌曲列表的 cache-aside 读路径
///
/// 每次失效都会推进 `generation`。未命中时先记下代数再读库，回填之后代数变了
/// 就撤掉自己刚写入的条目，读到旧数据的回填不会在失效之后留下来。
pub struct CatalogService {
    songs: Arc<dyn SongRepository>,
    cache: Arc<dyn SongListCache>,
    signer: Arc<dyn UrlSigner>,
    collections: Collections,
    generation: AtomicU64,
}

impl CatalogService {
    pub fn new(
        songs: Arc<dyn SongRepository>,
        cache: Arc<dyn SongListCache>,
        signer: Arc<dyn UrlSigner>,
        collections: Collections,
    ) -> Self {
        Self {
            songs,
            cache,
            signer,
            collections,
            generation: AtomicU64::new(0),
        }
    }

    pub fn collections(&self) -> &Collections {
        &self.collections
    }

    /// 读取合集歌曲。无论是否命中缓存，访问 URL 每次都重新签发，
    /// 因为 URL 的有效期比缓存短。
    pub async fn get(
        &self,
        collection: &str,
        include_deleted: bool,
    ) -> Result<Vec<SongListing>, AppError> {
        let start = Instant::now();
        let entry = self
            .collections
            .get(collection)
            .ok_or_else(|| AppError::InvalidInput(format!("unknown collection: {}", collection)))?;

        let key = SongListKey::new(collection, include_deleted);
        let songs = match self.cache.get(&key).await {
            Some(songs) => {
                debug!("Cache hit for key: {:?}", key);
                songs
            }
            None => {
                debug!("Cache miss for key: {:?}", key);
                let seen = self.generation.load(Ordering::Acquire);
                let prefix = self.collections.key_prefix(entry);
                let mut songs = self.songs.find_by_key_prefix(&prefix).await?;
                if !include_deleted {
                    songs.retain(|s| !s.deleted);
                }
                let songs = Arc::new(songs);
                self.cache.put(key, Arc::clone(&songs)).await;
                if self.generation.load(Ordering::Acquire) != seen {
                    debug!("Invalidated while loading {}, dropping refill", collection);
                    self.cache.invalidate_collection(collection).await;
                }
                songs
            }
        };

        let listings: Vec<SongListing> = songs
            .iter()
            .map(|song| SongListing {
                url: self.signer.sign(&song.object_key),
                song: song.clone(),
            })
            .collect();
        debug!(
            "Served {} songs of {} in {}ms",
            listings.len(),
            collection,
            start.elapsed().as_millis()
        );
        Ok(listings)
    }

    pub async fn invalidate(&self, collection: &str) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.cache.invalidate_collection(collection).await;
        debug!("Song list cache invalidated for {}", collection);
    }

    /// 使歌曲所属合集的缓存失效；找不到所属合集时全部失效
    pub async fn invalidate_owner_of(&self, song: &Song) {
        match self.collections.owner_of(&song.object_key) {
            Some(collection) => self.invalidate(&collection.key).await,
            None => {
                self.generation.fetch_add(1, Ordering::AcqRel);
                self.cache.invalidate_all().await;
                info!(
                    "Song {} belongs to no configured collection, all song lists invalidated",
                    song.id
                );
            }
        }
    }

    /// 每个合集中未删除的歌曲数量
    pub async fn collection_counts(&self) -> Result<Vec<CollectionCount>, AppError> {
        let mut counts = Vec::new();
        for collection in self.collections.iter() {
            let prefix = self.collections.key_prefix(collection);
            let songs = self.songs.find_by_key_prefix(&prefix).await?;
            counts.push(CollectionCount {
                key: collection.key.clone(),
                name: collection.name.clone(),
                active_songs: songs.iter().filter(|s| !s.deleted).count(),
            });
        }
        Ok(counts)
    }
}
