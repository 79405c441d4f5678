use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use domain::song::{Song, SongError, SongRepository, VoteCounts};
use domain::value::SongId;
use std::sync::Arc;

/// 未配置数据库时使用，也用于测试
#[derive(Clone, Default)]
pub struct InMemorySongRepository {
    store: Arc<DashMap<SongId, Song>>,
}

impl InMemorySongRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_songs(songs: impl IntoIterator<Item = Song>) -> Self {
        let repo = Self::new();
        for song in songs {
            repo.store.insert(song.id, song);
        }
        repo
    }

    fn sorted(mut songs: Vec<Song>) -> Vec<Song> {
        songs.sort_by_key(|s| s.id.as_i64());
        songs
    }
}

#[async_trait]
impl SongRepository for InMemorySongRepository {
    async fn find_by_id(&self, id: SongId) -> Result<Option<Song>, SongError> {
        Ok(self.store.get(&id).map(|s| s.clone()))
    }

    async fn find_all(&self) -> Result<Vec<Song>, SongError> {
        Ok(Self::sorted(
            self.store.iter().map(|e| e.value().clone()).collect(),
        ))
    }

    async fn find_by_key_prefix(&self, prefix: &str) -> Result<Vec<Song>, SongError> {
        Ok(Self::sorted(
            self.store
                .iter()
                .filter(|e| e.value().is_under(prefix))
                .map(|e| e.value().clone())
                .collect(),
        ))
    }

    async fn save(&self, song: &Song) -> Result<(), SongError> {
        self.store.insert(song.id, song.clone());
        Ok(())
    }

    async fn save_vote_counts(&self, counts: &[VoteCounts]) -> Result<(), SongError> {
        for item in counts {
            if let Some(mut song) = self.store.get_mut(&item.song_id) {
                song.apply_vote_tally(item.like_count, item.dislike_count);
            }
        }
        Ok(())
    }

    async fn save_vote_count(&self, counts: &VoteCounts) -> Result<(), SongError> {
        let mut song = self
            .store
            .get_mut(&counts.song_id)
            .ok_or(SongError::NotFound(counts.song_id))?;
        song.apply_vote_tally(counts.like_count, counts.dislike_count);
        Ok(())
    }

    async fn set_deleted(&self, id: SongId, deleted: bool) -> Result<bool, SongError> {
        let mut song = self.store.get_mut(&id).ok_or(SongError::NotFound(id))?;
        Ok(if deleted {
            song.soft_delete()
        } else {
            song.restore()
        })
    }

    async fn increment_play_count(&self, id: SongId) -> Result<(), SongError> {
        let mut song = self.store.get_mut(&id).ok_or(SongError::NotFound(id))?;
        song.play_count += 1;
        song.updated_at = Utc::now().naive_utc();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_prefix_lookup_is_sorted_by_id() {
        let repo = InMemorySongRepository::with_songs([
            Song::new(SongId::from(3), "c", "music/哲学/c.mp3"),
            Song::new(SongId::from(1), "a", "music/哲学/a.mp3"),
            Song::new(SongId::from(2), "b", "music/丁真/b.mp3"),
        ]);
        let songs = repo.find_by_key_prefix("music/哲学/").await.unwrap();
        let ids: Vec<i64> = songs.iter().map(|s| s.id.as_i64()).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_narrow_writes_leave_other_columns_alone() {
        let mut song = Song::new(SongId::from(1), "a", "music/哲学/a.mp3");
        song.play_count = 4;
        let repo = InMemorySongRepository::with_songs([song]);

        assert!(repo.set_deleted(SongId::from(1), true).await.unwrap());
        assert!(!repo.set_deleted(SongId::from(1), true).await.unwrap());
        repo.save_vote_counts(&[VoteCounts {
            song_id: SongId::from(1),
            like_count: 3,
            dislike_count: 1,
        }])
        .await
        .unwrap();

        let stored = repo.find_by_id(SongId::from(1)).await.unwrap().unwrap();
        assert_eq!((stored.like_count, stored.dislike_count), (3, 1));
        assert_eq!(stored.play_count, 4);
        assert!(stored.deleted);
    }

    #[tokio::test]
    async fn test_vote_count_for_missing_song() {
        let repo = InMemorySongRepository::new();
        let counts = VoteCounts {
            song_id: SongId::from(9),
            like_count: 1,
            dislike_count: 0,
        };
        repo.save_vote_counts(&[counts]).await.unwrap();
        let err = repo.save_vote_count(&counts).await.unwrap_err();
        assert!(matches!(err, SongError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_increment_play_count_on_missing_song() {
        let repo = InMemorySongRepository::new();
        let err = repo.increment_play_count(SongId::from(9)).await.unwrap_err();
        assert!(matches!(err, SongError::NotFound(_)));
    }
}
