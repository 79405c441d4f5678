use async_trait::async_trait;
use dashmap::DashMap;
use domain::value::{SongId, UserId};
use domain::vote::{SongVote, SongVoteRepository, VoteError};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct InMemorySongVoteRepository {
    store: Arc<DashMap<(UserId, SongId), SongVote>>,
}

impl InMemorySongVoteRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[async_trait]
impl SongVoteRepository for InMemorySongVoteRepository {
    async fn find_by_user_and_song(
        &self,
        user_id: UserId,
        song_id: SongId,
    ) -> Result<Option<SongVote>, VoteError> {
        Ok(self.store.get(&(user_id, song_id)).map(|v| v.clone()))
    }

    async fn find_by_song(&self, song_id: SongId) -> Result<Vec<SongVote>, VoteError> {
        Ok(self
            .store
            .iter()
            .filter(|e| e.key().1 == song_id)
            .map(|e| e.value().clone())
            .collect())
    }

    async fn save(&self, vote: &SongVote) -> Result<(), VoteError> {
        self.store
            .insert((vote.user_id, vote.song_id), vote.clone());
        Ok(())
    }

    async fn delete(&self, user_id: UserId, song_id: SongId) -> Result<(), VoteError> {
        self.store.remove(&(user_id, song_id));
        Ok(())
    }
}
