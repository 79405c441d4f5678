use super::broadcaster::{PresenceKeys, SnapshotPublisher};
use super::connection::{Connection, ConnectionId, ConnectionSink};
use super::snapshot::PresenceSnapshot;
use crate::error::AppError;
use crate::store::CounterStore;
use dashmap::DashMap;
use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

struct LocalConnection {
    /// 同一连接上的操作通过这把锁串行
    state: Mutex<Connection>,
    sink: Arc<dyn ConnectionSink>,
    /// 上一次投递失败，下一轮投递前清理
    stale: AtomicBool,
}

impl LocalConnection {
    fn new(id: ConnectionId, sink: Arc<dyn ConnectionSink>) -> Self {
        Self {
            state: Mutex::new(Connection::new(id)),
            sink,
            stale: AtomicBool::new(false),
        }
    }
}

/// 客户端上报的消息，songId 可能是字符串也可能是数字
#[derive(Debug, Deserialize)]
struct SongSelectMessage {
    #[serde(rename = "songId", default)]
    song_id: Option<Value>,
}

fn parse_song_selector(payload: &str) -> Result<Option<String>, AppError> {
    let message: SongSelectMessage = serde_json::from_str(payload)
        .map_err(|e| AppError::InvalidInput(format!("malformed presence message: {}", e)))?;
    match message.song_id {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(AppError::InvalidInput(format!(
            "unsupported songId value: {}",
            other
        ))),
    }
}

/// 本进程的在线连接表
///
/// 连接只属于创建它的进程；全局计数放在共享的 CounterStore 里，
/// 每次状态变化后都会发布一次全量快照。
pub struct PresenceRegistry {
    connections: DashMap<ConnectionId, Arc<LocalConnection>>,
    counters: Arc<dyn CounterStore>,
    publisher: Arc<SnapshotPublisher>,
}

impl PresenceRegistry {
    pub fn new(counters: Arc<dyn CounterStore>, publisher: Arc<SnapshotPublisher>) -> Self {
        Self {
            connections: DashMap::new(),
            counters,
            publisher,
        }
    }

    fn keys(&self) -> &PresenceKeys {
        self.publisher.keys()
    }

    /// 本进程持有的连接数
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub async fn current_song(&self, id: &ConnectionId) -> Option<String> {
        let entry = self.connections.get(id).map(|e| Arc::clone(e.value()))?;
        let conn = entry.state.lock().await;
        conn.current_song.clone()
    }

    pub async fn snapshot(&self) -> Result<PresenceSnapshot, AppError> {
        self.publisher.read_snapshot().await
    }

    pub async fn on_connect(&self, id: ConnectionId, sink: Arc<dyn ConnectionSink>) {
        let entry = Arc::clone(
            &*self
                .connections
                .entry(id.clone())
                .or_insert_with(|| Arc::new(LocalConnection::new(id.clone(), sink))),
        );

        {
            let mut conn = entry.state.lock().await;
            // 重复的 connect 不会再次计数
            if conn.open && conn.mark_counted() {
                if let Err(e) = self.counters.incr_by(&self.keys().online_total, 1).await {
                    warn!("Failed to count connection {} as online: {}", id, e);
                    conn.counted = false;
                }
            }
        }

        self.broadcast().await;
    }

    pub async fn on_disconnect(&self, id: &ConnectionId) {
        let Some((_, entry)) = self.connections.remove(id) else {
            debug!("Disconnect for unknown connection {}", id);
            return;
        };

        {
            let mut conn = entry.state.lock().await;
            let (song_id, counted) = conn.close();
            if let Some(song_id) = song_id {
                self.release_listener(&song_id).await;
            }
            if counted {
                self.release_online().await;
            }
        }

        self.broadcast().await;
    }

    /// 切换连接当前收听的歌曲，返回计数是否发生变化
    pub async fn on_song_change(&self, id: &ConnectionId, song_id: Option<String>) -> bool {
        let Some(entry) = self.connections.get(id).map(|e| Arc::clone(e.value())) else {
            debug!("Song change for unknown connection {}", id);
            return false;
        };

        {
            let mut conn = entry.state.lock().await;
            if !conn.open {
                return false;
            }
            let Some(previous) = conn.select_song(song_id.clone()) else {
                return false;
            };
            if let Some(old) = previous {
                self.release_listener(&old).await;
            }
            if let Some(new) = &song_id {
                match self
                    .counters
                    .hash_incr_by(&self.keys().song_listeners, new, 1)
                    .await
                {
                    Ok(_) => conn.listener_counted = true,
                    Err(e) => {
                        warn!("Failed to add listener of song {} for {}: {}", new, id, e)
                    }
                }
            }
        }

        self.broadcast().await;
        true
    }

    /// 处理客户端消息，只关心其中的 songId 字段
    pub async fn on_message(&self, id: &ConnectionId, payload: &str) -> Result<bool, AppError> {
        let song_id = parse_song_selector(payload)?;
        Ok(self.on_song_change(id, song_id).await)
    }

    /// 把收到的快照转发给本进程所有打开的连接，返回成功投递的数量。
    ///
    /// 单个连接投递失败只会被标记，下一轮再清理，不影响其它连接。
    pub async fn on_snapshot_received(&self, message: &str) -> usize {
        let payload = match PresenceSnapshot::decode(message).and_then(|s| s.encode()) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Dropping malformed presence snapshot: {}", e);
                return 0;
            }
        };

        let stale: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|e| e.value().stale.load(Ordering::Acquire))
            .map(|e| e.key().clone())
            .collect();
        for id in stale {
            debug!("Pruning stale connection {}", id);
            self.on_disconnect(&id).await;
        }

        let targets: Vec<(ConnectionId, Arc<LocalConnection>)> = self
            .connections
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();

        let mut delivered = 0;
        for (id, conn) in targets {
            if !conn.sink.is_open() {
                conn.stale.store(true, Ordering::Release);
                continue;
            }
            match conn.sink.send(&payload) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    debug!("Failed to deliver snapshot to {}: {}", id, e);
                    conn.stale.store(true, Ordering::Release);
                }
            }
        }
        delivered
    }

    async fn release_listener(&self, song_id: &str) {
        let key = &self.keys().song_listeners;
        match self.counters.hash_incr_by(key, song_id, -1).await {
            Ok(count) if count < 0 => {
                if let Err(e) = self.counters.hash_set(key, song_id, 0).await {
                    warn!("Failed to reset listener count of song {}: {}", song_id, e);
                }
            }
            Ok(_) => {}
            Err(e) => warn!("Failed to remove listener of song {}: {}", song_id, e),
        }
    }

    async fn release_online(&self) {
        let key = &self.keys().online_total;
        match self.counters.incr_by(key, -1).await {
            Ok(total) if total < 0 => {
                if let Err(e) = self.counters.set_int(key, 0).await {
                    warn!("Failed to reset online total: {}", e);
                }
            }
            Ok(_) => {}
            Err(e) => warn!("Failed to decrement online total: {}", e),
        }
    }

    async fn broadcast(&self) {
        if let Err(e) = self.publisher.publish_snapshot().await {
            warn!("Failed to publish presence snapshot: {}", e);
        }
    }
}
