use super::registry::PresenceRegistry;
use super::snapshot::PresenceSnapshot;
use crate::error::AppError;
use crate::store::{CounterStore, PubSubChannel};
use futures::StreamExt;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// 在线计数相关的键名和频道名
#[derive(Debug, Clone)]
pub struct PresenceKeys {
    pub online_total: String,
    pub song_listeners: String,
    pub channel: String,
}

impl Default for PresenceKeys {
    fn default() -> Self {
        Self {
            online_total: "music:online:total".to_string(),
            song_listeners: "music:online:song:listeners".to_string(),
            channel: "online-count-channel".to_string(),
        }
    }
}

/// 读取全局计数并发布快照。任何进程改动计数后都通过它发布。
pub struct SnapshotPublisher {
    counters: Arc<dyn CounterStore>,
    channel: Arc<dyn PubSubChannel>,
    keys: PresenceKeys,
}

impl SnapshotPublisher {
    pub fn new(
        counters: Arc<dyn CounterStore>,
        channel: Arc<dyn PubSubChannel>,
        keys: PresenceKeys,
    ) -> Self {
        Self {
            counters,
            channel,
            keys,
        }
    }

    pub fn keys(&self) -> &PresenceKeys {
        &self.keys
    }

    /// 读取当前快照，负数会被修正为 0 并写回存储
    pub async fn read_snapshot(&self) -> Result<PresenceSnapshot, AppError> {
        let mut online_total = self
            .counters
            .get_int(&self.keys.online_total)
            .await?
            .unwrap_or(0);
        if online_total < 0 {
            warn!("Online total was negative ({}), resetting to 0", online_total);
            self.counters.set_int(&self.keys.online_total, 0).await?;
            online_total = 0;
        }

        let entries = self.counters.hash_entries(&self.keys.song_listeners).await?;
        let mut song_listeners = BTreeMap::new();
        for (song_id, count) in entries {
            if count < 0 {
                warn!(
                    "Listener count for song {} was negative ({}), resetting to 0",
                    song_id, count
                );
                self.counters
                    .hash_set(&self.keys.song_listeners, &song_id, 0)
                    .await?;
                song_listeners.insert(song_id, 0);
            } else {
                song_listeners.insert(song_id, count);
            }
        }

        Ok(PresenceSnapshot {
            online_total,
            song_listeners,
        })
    }

    pub async fn publish_snapshot(&self) -> Result<PresenceSnapshot, AppError> {
        let snapshot = self.read_snapshot().await?;
        let message = snapshot.encode()?;
        let receivers = self.channel.publish(&self.keys.channel, message).await?;
        debug!(
            "Published presence snapshot (online={}, songs={}) to {} subscriber(s)",
            snapshot.online_total,
            snapshot.song_listeners.len(),
            receivers
        );
        Ok(snapshot)
    }

    /// 清空在线总数和每首歌的听众计数
    pub async fn reset_counters(&self) -> Result<(), AppError> {
        self.counters.delete(&self.keys.online_total).await?;
        self.counters.delete(&self.keys.song_listeners).await?;
        info!("Online total and song listener counts reset to 0");
        Ok(())
    }
}

/// 订阅快照频道，并把收到的每条快照转发给本进程的所有连接。
///
/// 订阅在返回前完成，之后发布的快照都不会漏掉。
pub async fn subscribe_snapshot_relay(
    registry: Arc<PresenceRegistry>,
    channel: Arc<dyn PubSubChannel>,
    channel_name: &str,
) -> Result<JoinHandle<()>, AppError> {
    let mut stream = channel.subscribe(channel_name).await?;
    let channel_name = channel_name.to_string();
    info!("Subscribed to presence channel {}", channel_name);

    Ok(tokio::spawn(async move {
        while let Some(message) = stream.next().await {
            registry.on_snapshot_received(&message).await;
        }
        info!("Presence channel {} closed, relay stopped", channel_name);
    }))
}
