use crate::error::AppError;
use crate::query::catalog::CatalogService;
use domain::song::SongRepository;
use domain::value::SongId;
use log::info;
use std::sync::Arc;

/// 软删除 / 恢复 / 播放计数
pub struct SongService {
    songs: Arc<dyn SongRepository>,
    catalog: Arc<CatalogService>,
}

impl SongService {
    pub fn new(songs: Arc<dyn SongRepository>, catalog: Arc<CatalogService>) -> Self {
        Self { songs, catalog }
    }

    pub async fn delete_song(&self, song_id: SongId) -> Result<(), AppError> {
        if self.set_deleted(song_id, true).await? {
            info!("Song {} soft-deleted", song_id);
        }
        Ok(())
    }

    pub async fn restore_song(&self, song_id: SongId) -> Result<(), AppError> {
        if self.set_deleted(song_id, false).await? {
            info!("Song {} restored", song_id);
        }
        Ok(())
    }

    /// 只改 deleted 列，票数等其它列由各自的写入方维护
    async fn set_deleted(&self, song_id: SongId, deleted: bool) -> Result<bool, AppError> {
        let song = self
            .songs
            .find_by_id(song_id)
            .await?
            .ok_or(AppError::SongNotFound(song_id.as_i64()))?;
        let changed = self.songs.set_deleted(song_id, deleted).await?;
        if changed {
            self.catalog.invalidate_owner_of(&song).await;
        }
        Ok(changed)
    }

    pub async fn record_play(&self, song_id: SongId) -> Result<(), AppError> {
        if self.songs.find_by_id(song_id).await?.is_none() {
            return Err(AppError::SongNotFound(song_id.as_i64()));
        }
        self.songs.increment_play_count(song_id).await?;
        Ok(())
    }
}
