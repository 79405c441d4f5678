use crate::error::AppError;
use crate::store::CounterStore;
use domain::song::SongRepository;
use domain::value::{SongId, UserId};
use domain::vote::{
    SongVote, SongVoteRepository, VoteAction, VoteKind, VoteState, VoteTransition,
};
use log::{debug, warn};
use std::sync::Arc;

/// 点赞 / 点踩集合的键名
#[derive(Debug, Clone)]
pub struct VoteKeys {
    pub likes_prefix: String,
    pub dislikes_prefix: String,
}

impl Default for VoteKeys {
    fn default() -> Self {
        Self {
            likes_prefix: "likes:".to_string(),
            dislikes_prefix: "dislikes:".to_string(),
        }
    }
}

impl VoteKeys {
    pub fn likes(&self, song_id: SongId) -> String {
        format!("{}{}", self.likes_prefix, song_id)
    }

    pub fn dislikes(&self, song_id: SongId) -> String {
        format!("{}{}", self.dislikes_prefix, song_id)
    }

    pub fn set_for(&self, kind: VoteKind, song_id: SongId) -> String {
        match kind {
            VoteKind::Like => self.likes(song_id),
            VoteKind::Dislike => self.dislikes(song_id),
        }
    }
}

/// 一首歌的实时票数，来自 CounterStore
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteTally {
    pub likes: u64,
    pub dislikes: u64,
    /// 只有带用户身份查询时才有值
    pub user_vote: Option<VoteState>,
}

/// 投票账本
///
/// 持久层的 song_votes 是“谁投了什么”的唯一事实来源；CounterStore 里的两个集合
/// 只是镜像，用来快速读数。写入顺序固定为先持久层、后集合，集合写失败只记日志，
/// 由对账任务修复。
pub struct VoteLedger {
    songs: Arc<dyn SongRepository>,
    votes: Arc<dyn SongVoteRepository>,
    counters: Arc<dyn CounterStore>,
    keys: VoteKeys,
}

impl VoteLedger {
    pub fn new(
        songs: Arc<dyn SongRepository>,
        votes: Arc<dyn SongVoteRepository>,
        counters: Arc<dyn CounterStore>,
        keys: VoteKeys,
    ) -> Self {
        Self {
            songs,
            votes,
            counters,
            keys,
        }
    }

    pub async fn like(&self, song_id: SongId, user_id: UserId) -> Result<VoteTally, AppError> {
        self.apply(song_id, user_id, VoteAction::Cast(VoteKind::Like))
            .await
    }

    pub async fn dislike(&self, song_id: SongId, user_id: UserId) -> Result<VoteTally, AppError> {
        self.apply(song_id, user_id, VoteAction::Cast(VoteKind::Dislike))
            .await
    }

    pub async fn cancel(&self, song_id: SongId, user_id: UserId) -> Result<VoteTally, AppError> {
        self.apply(song_id, user_id, VoteAction::Cancel).await
    }

    /// 读取实时票数，不访问持久层
    pub async fn counts(
        &self,
        song_id: SongId,
        user_id: Option<UserId>,
    ) -> Result<VoteTally, AppError> {
        let likes_key = self.keys.likes(song_id);
        let dislikes_key = self.keys.dislikes(song_id);
        let likes = self.counters.set_size(&likes_key).await?;
        let dislikes = self.counters.set_size(&dislikes_key).await?;

        let user_vote = match user_id {
            None => None,
            Some(user_id) => {
                let member = user_id.to_string();
                if self.counters.set_contains(&likes_key, &member).await? {
                    Some(VoteState::Liked)
                } else if self.counters.set_contains(&dislikes_key, &member).await? {
                    Some(VoteState::Disliked)
                } else {
                    Some(VoteState::None)
                }
            }
        };

        Ok(VoteTally {
            likes,
            dislikes,
            user_vote,
        })
    }

    async fn apply(
        &self,
        song_id: SongId,
        user_id: UserId,
        action: VoteAction,
    ) -> Result<VoteTally, AppError> {
        if self.songs.find_by_id(song_id).await?.is_none() {
            return Err(AppError::SongNotFound(song_id.as_i64()));
        }

        let existing = self.votes.find_by_user_and_song(user_id, song_id).await?;
        let current = VoteState::from(existing.as_ref().map(|v| v.kind));
        let transition = VoteTransition::plan(current, action);
        debug!(
            "Vote {:?} by user {} on song {}: {:?}",
            action, user_id, song_id, transition
        );

        match transition {
            VoteTransition::Unchanged => {}
            VoteTransition::Created(kind) => {
                self.votes
                    .save(&SongVote::new(user_id, song_id, kind))
                    .await?;
                self.mirror_add(song_id, user_id, kind).await;
            }
            VoteTransition::Switched { from, to } => {
                let mut vote = existing.unwrap_or_else(|| SongVote::new(user_id, song_id, from));
                vote.switch_to(to);
                self.votes.save(&vote).await?;
                self.mirror_move(song_id, user_id, from, to).await;
            }
            VoteTransition::Removed(kind) => {
                self.votes.delete(user_id, song_id).await?;
                self.mirror_remove(song_id, user_id, kind).await;
            }
        }

        self.counts(song_id, Some(user_id)).await
    }

    async fn mirror_add(&self, song_id: SongId, user_id: UserId, kind: VoteKind) {
        let key = self.keys.set_for(kind, song_id);
        if let Err(e) = self.counters.set_add(&key, &user_id.to_string()).await {
            warn!(
                "Failed to add user {} to {}, left for reconciliation: {}",
                user_id, key, e
            );
        }
    }

    async fn mirror_move(&self, song_id: SongId, user_id: UserId, from: VoteKind, to: VoteKind) {
        let src = self.keys.set_for(from, song_id);
        let dst = self.keys.set_for(to, song_id);
        if let Err(e) = self
            .counters
            .set_move(&src, &dst, &user_id.to_string())
            .await
        {
            warn!(
                "Failed to move user {} from {} to {}, left for reconciliation: {}",
                user_id, src, dst, e
            );
        }
    }

    async fn mirror_remove(&self, song_id: SongId, user_id: UserId, kind: VoteKind) {
        let key = self.keys.set_for(kind, song_id);
        if let Err(e) = self.counters.set_remove(&key, &user_id.to_string()).await {
            warn!(
                "Failed to remove user {} from {}, left for reconciliation: {}",
                user_id, key, e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_keys_layout() {
        let keys = VoteKeys::default();
        let song = SongId::from(7);
        assert_eq!(keys.likes(song), "likes:7");
        assert_eq!(keys.set_for(VoteKind::Dislike, song), "dislikes:7");
    }
}
