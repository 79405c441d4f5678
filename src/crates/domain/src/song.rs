use crate::value::SongId;
use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SongError {
    #[error("Song not found: {0}")]
    NotFound(SongId),
    #[error("Repository error: {0}")]
    RepositoryError(String),
    #[error("Database error: {0}")]
    DbErr(String),
}

/// 歌曲聚合
///
/// `like_count` / `dislike_count` 只是持久化的汇总值，由票数对账任务整体覆盖写入，
/// 投票路径不会直接修改它们。
#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    pub id: SongId,
    pub name: String,
    /// 对象存储中的 key，例如 `music/<合集名>/xxx.mp3`
    pub object_key: String,
    pub like_count: i32,
    pub dislike_count: i32,
    pub play_count: i32,
    pub deleted: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Song {
    pub fn new(id: SongId, name: impl Into<String>, object_key: impl Into<String>) -> Self {
        let now = Utc::now().naive_utc();
        Self {
            id,
            name: name.into(),
            object_key: object_key.into(),
            like_count: 0,
            dislike_count: 0,
            play_count: 0,
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now().naive_utc();
    }

    /// 软删除，返回状态是否发生变化
    pub fn soft_delete(&mut self) -> bool {
        if self.deleted {
            return false;
        }
        self.deleted = true;
        self.touch();
        true
    }

    /// 恢复软删除，返回状态是否发生变化
    pub fn restore(&mut self) -> bool {
        if !self.deleted {
            return false;
        }
        self.deleted = false;
        self.touch();
        true
    }

    /// 任一汇总值与实际票数不同时整体覆盖，返回记录是否变脏
    pub fn apply_vote_tally(&mut self, likes: i32, dislikes: i32) -> bool {
        if self.like_count == likes && self.dislike_count == dislikes {
            return false;
        }
        self.like_count = likes;
        self.dislike_count = dislikes;
        self.touch();
        true
    }

    pub fn is_under(&self, key_prefix: &str) -> bool {
        self.object_key.starts_with(key_prefix)
    }

    pub fn vote_counts(&self) -> VoteCounts {
        VoteCounts {
            song_id: self.id,
            like_count: self.like_count,
            dislike_count: self.dislike_count,
        }
    }
}

/// 对账写回的票数汇总，只覆盖 like_count / dislike_count 两列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteCounts {
    pub song_id: SongId,
    pub like_count: i32,
    pub dislike_count: i32,
}

// 仓储接口
#[async_trait]
pub trait SongRepository: Send + Sync {
    async fn find_by_id(&self, id: SongId) -> Result<Option<Song>, SongError>;
    async fn find_all(&self) -> Result<Vec<Song>, SongError>;
    async fn find_by_key_prefix(&self, prefix: &str) -> Result<Vec<Song>, SongError>;
    async fn save(&self, song: &Song) -> Result<(), SongError>;
    /// 批量写回票数汇总，单个事务；其它列保持不变，不存在的歌曲被忽略
    async fn save_vote_counts(&self, counts: &[VoteCounts]) -> Result<(), SongError>;
    /// 单条写回票数汇总，歌曲不存在时返回 NotFound
    async fn save_vote_count(&self, counts: &VoteCounts) -> Result<(), SongError>;
    /// 只修改 deleted 列，返回状态是否发生变化
    async fn set_deleted(&self, id: SongId, deleted: bool) -> Result<bool, SongError>;
    async fn increment_play_count(&self, id: SongId) -> Result<(), SongError>;
}
