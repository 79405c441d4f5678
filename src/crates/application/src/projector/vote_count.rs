use crate::command::vote::VoteKeys;
use crate::error::AppError;
use crate::store::CounterStore;
use domain::song::{SongRepository, VoteCounts};
use domain::value::{SongId, UserId};
use domain::vote::{SongVoteRepository, VoteKind};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// 一次对账的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// 扫描的歌曲数
    pub scanned: usize,
    /// 票数发生变化的歌曲数
    pub dirty: usize,
    /// 实际写入成功的歌曲数
    pub written: usize,
    /// 读或写失败被跳过的歌曲数
    pub failed: usize,
}

/// 票数对账：把持久层的 like_count / dislike_count 整体覆盖为 CounterStore 集合大小。
/// 写回只触碰这两列，同一轮里发生的播放计数和软删除不会被覆盖。
///
/// 集合大小之前先按持久层的投票记录修补集合，这样易失存储被清空或者
/// 投票写入中途崩溃之后，集合和汇总值都能回到持久层的事实。
/// 无状态、幂等，可以随时重跑。
pub struct VoteCountReconciler {
    songs: Arc<dyn SongRepository>,
    votes: Arc<dyn SongVoteRepository>,
    counters: Arc<dyn CounterStore>,
    keys: VoteKeys,
}

impl VoteCountReconciler {
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

    pub async fn reconcile_once(&self) -> Result<ReconcileReport, AppError> {
        info!("Vote count reconciliation started");
        let mut report = ReconcileReport::default();

        let songs = self.songs.find_all().await?;
        if songs.is_empty() {
            info!("No songs, vote count reconciliation skipped");
            return Ok(report);
        }

        let mut dirty: Vec<VoteCounts> = Vec::new();
        for mut song in songs {
            report.scanned += 1;
            match self.tally(song.id).await {
                Ok((likes, dislikes)) => {
                    if song.apply_vote_tally(likes, dislikes) {
                        dirty.push(song.vote_counts());
                    }
                }
                Err(e) => {
                    error!("Failed to reconcile votes of song {}: {}", song.id, e);
                    report.failed += 1;
                }
            }
        }

        report.dirty = dirty.len();
        if dirty.is_empty() {
            info!(
                "Vote count reconciliation finished, {} songs already up to date",
                report.scanned
            );
            return Ok(report);
        }

        self.persist(&dirty, &mut report).await;
        info!(
            "Vote count reconciliation finished: scanned={}, updated={}, failed={}",
            report.scanned, report.written, report.failed
        );
        Ok(report)
    }

    async fn persist(&self, dirty: &[VoteCounts], report: &mut ReconcileReport) {
        match self.songs.save_vote_counts(dirty).await {
            Ok(()) => report.written += dirty.len(),
            Err(e) => {
                warn!(
                    "Batch write of {} vote counts failed, retrying one by one: {}",
                    dirty.len(),
                    e
                );
                for counts in dirty {
                    match self.songs.save_vote_count(counts).await {
                        Ok(()) => report.written += 1,
                        Err(e) => {
                            error!(
                                "Failed to write vote counts of song {}: {}",
                                counts.song_id, e
                            );
                            report.failed += 1;
                        }
                    }
                }
            }
        }
    }

    async fn tally(&self, song_id: SongId) -> Result<(i32, i32), AppError> {
        self.repair_sets(song_id).await?;
        let likes = self.counters.set_size(&self.keys.likes(song_id)).await?;
        let dislikes = self.counters.set_size(&self.keys.dislikes(song_id)).await?;
        Ok((saturate(likes), saturate(dislikes)))
    }

    /// 让两个集合与持久层的投票记录一致
    async fn repair_sets(&self, song_id: SongId) -> Result<(), AppError> {
        let votes = self.votes.find_by_song(song_id).await?;
        let mut want_likes = HashSet::new();
        let mut want_dislikes = HashSet::new();
        for vote in votes {
            match vote.kind {
                VoteKind::Like => want_likes.insert(vote.user_id.to_string()),
                VoteKind::Dislike => want_dislikes.insert(vote.user_id.to_string()),
            };
        }

        self.sync_set(song_id, VoteKind::Like, &want_likes).await?;
        self.sync_set(song_id, VoteKind::Dislike, &want_dislikes)
            .await
    }

    async fn sync_set(
        &self,
        song_id: SongId,
        kind: VoteKind,
        wanted: &HashSet<String>,
    ) -> Result<(), AppError> {
        let key = self.keys.set_for(kind, song_id);
        let present = self.counters.set_members(&key).await?;

        for member in wanted.difference(&present) {
            // 读取投票记录之后可能又有新的投票，写之前再确认一次
            if self.still_voted(song_id, member, kind).await? {
                debug!("Restoring {} into {}", member, key);
                self.counters.set_add(&key, member).await?;
            }
        }
        for member in present.difference(wanted) {
            if !self.still_voted(song_id, member, kind).await? {
                debug!("Removing stale {} from {}", member, key);
                self.counters.set_remove(&key, member).await?;
            }
        }
        Ok(())
    }

    async fn still_voted(
        &self,
        song_id: SongId,
        member: &str,
        kind: VoteKind,
    ) -> Result<bool, AppError> {
        let Ok(user_id) = member.parse::<i64>() else {
            return Ok(false);
        };
        let vote = self
            .votes
            .find_by_user_and_song(UserId::from(user_id), song_id)
            .await?;
        Ok(vote.map(|v| v.kind == kind).unwrap_or(false))
    }
}

fn saturate(size: u64) -> i32 {
    i32::try_from(size).unwrap_or(i32::MAX)
}

/// 启动时执行一次，之后按固定间隔执行
pub struct ReconciliationScheduler {
    reconciler: Arc<VoteCountReconciler>,
    interval: Duration,
}

impl ReconciliationScheduler {
    pub fn new(reconciler: Arc<VoteCountReconciler>, interval: Duration) -> Self {
        Self {
            reconciler,
            interval,
        }
    }

    /// 启动时的强制对账，完成之后进程才算就绪
    pub async fn run_startup(&self) -> Option<ReconcileReport> {
        warn!("Process starting, forcing one vote count reconciliation");
        self.run_pass().await
    }

    /// 执行一轮，失败只记日志
    pub async fn run_pass(&self) -> Option<ReconcileReport> {
        match self.reconciler.reconcile_once().await {
            Ok(report) => Some(report),
            Err(e) => {
                error!("Vote count reconciliation failed: {}", e);
                None
            }
        }
    }

    /// 在后台按固定间隔执行；上一轮结束后才开始计时下一轮
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.run_pass().await;
            }
        })
    }
}
