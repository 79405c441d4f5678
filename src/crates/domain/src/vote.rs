use crate::value::{SongId, UserId};
use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoteError {
    #[error("Invalid vote code: {0}")]
    InvalidCode(i32),
    #[error("Repository error: {0}")]
    RepositoryError(String),
    #[error("Database error: {0}")]
    DbErr(String),
}

/// 投票类型，持久化时 1 = like，-1 = dislike
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteKind {
    Like,
    Dislike,
}

impl VoteKind {
    pub fn code(&self) -> i32 {
        match self {
            VoteKind::Like => 1,
            VoteKind::Dislike => -1,
        }
    }

    pub fn from_code(code: i32) -> Result<Self, VoteError> {
        match code {
            1 => Ok(VoteKind::Like),
            -1 => Ok(VoteKind::Dislike),
            _ => Err(VoteError::InvalidCode(code)),
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            VoteKind::Like => VoteKind::Dislike,
            VoteKind::Dislike => VoteKind::Like,
        }
    }
}

/// 某个用户对某首歌的当前投票状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoteState {
    #[default]
    None,
    Liked,
    Disliked,
}

impl VoteState {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteState::None => "none",
            VoteState::Liked => "like",
            VoteState::Disliked => "dislike",
        }
    }

    pub fn kind(&self) -> Option<VoteKind> {
        match self {
            VoteState::None => None,
            VoteState::Liked => Some(VoteKind::Like),
            VoteState::Disliked => Some(VoteKind::Dislike),
        }
    }
}

impl From<Option<VoteKind>> for VoteState {
    fn from(kind: Option<VoteKind>) -> Self {
        match kind {
            None => VoteState::None,
            Some(VoteKind::Like) => VoteState::Liked,
            Some(VoteKind::Dislike) => VoteState::Disliked,
        }
    }
}

impl fmt::Display for VoteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteAction {
    Cast(VoteKind),
    Cancel,
}

/// 状态机迁移结果，调用方据此决定对持久层和计数存储做什么
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteTransition {
    Unchanged,
    Created(VoteKind),
    Switched { from: VoteKind, to: VoteKind },
    Removed(VoteKind),
}

impl VoteTransition {
    pub fn plan(current: VoteState, action: VoteAction) -> Self {
        match (current.kind(), action) {
            (None, VoteAction::Cast(kind)) => VoteTransition::Created(kind),
            (Some(old), VoteAction::Cast(kind)) if old == kind => VoteTransition::Unchanged,
            (Some(old), VoteAction::Cast(kind)) => VoteTransition::Switched { from: old, to: kind },
            (Some(old), VoteAction::Cancel) => VoteTransition::Removed(old),
            (None, VoteAction::Cancel) => VoteTransition::Unchanged,
        }
    }

    pub fn resulting_state(&self, before: VoteState) -> VoteState {
        match self {
            VoteTransition::Unchanged => before,
            VoteTransition::Created(kind) => Some(*kind).into(),
            VoteTransition::Switched { to, .. } => Some(*to).into(),
            VoteTransition::Removed(_) => VoteState::None,
        }
    }
}

/// 投票关系，(user_id, song_id) 唯一
#[derive(Debug, Clone, PartialEq)]
pub struct SongVote {
    pub user_id: UserId,
    pub song_id: SongId,
    pub kind: VoteKind,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl SongVote {
    pub fn new(user_id: UserId, song_id: SongId, kind: VoteKind) -> Self {
        let now = Utc::now().naive_utc();
        Self {
            user_id,
            song_id,
            kind,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn switch_to(&mut self, kind: VoteKind) {
        if self.kind != kind {
            self.kind = kind;
            self.updated_at = Utc::now().naive_utc();
        }
    }
}

// 仓储接口
#[async_trait]
pub trait SongVoteRepository: Send + Sync {
    async fn find_by_user_and_song(
        &self,
        user_id: UserId,
        song_id: SongId,
    ) -> Result<Option<SongVote>, VoteError>;
    async fn find_by_song(&self, song_id: SongId) -> Result<Vec<SongVote>, VoteError>;
    /// 按 (user_id, song_id) upsert
    async fn save(&self, vote: &SongVote) -> Result<(), VoteError>;
    async fn delete(&self, user_id: UserId, song_id: SongId) -> Result<(), VoteError>;
}
