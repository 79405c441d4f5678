use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;

/// 连接的不透明标识，由网络层分配
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ConnectionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("connection closed")]
    Closed,
    #[error("send failed: {0}")]
    Other(String),
}

/// 出站通道：fire-and-forget，实现不得阻塞
pub trait ConnectionSink: Send + Sync {
    fn send(&self, payload: &str) -> Result<(), SendError>;
    fn is_open(&self) -> bool;
}

/// 基于无界 mpsc 的出站通道，由网络层的写任务负责真正发送
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ConnectionSink for ChannelSink {
    fn send(&self, payload: &str) -> Result<(), SendError> {
        self.tx
            .send(payload.to_string())
            .map_err(|_| SendError::Closed)
    }

    fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// 单个在线连接的状态，只由所属进程的 PresenceRegistry 修改
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub id: ConnectionId,
    pub open: bool,
    pub current_song: Option<String>,
    /// 是否已经计入在线总数，一个连接生命周期内最多计一次
    pub counted: bool,
    /// current_song 是否已经计入该歌曲的收听人数
    pub listener_counted: bool,
}

impl Connection {
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            open: true,
            current_song: None,
            counted: false,
            listener_counted: false,
        }
    }

    /// 首次调用返回 true，之后都返回 false
    pub fn mark_counted(&mut self) -> bool {
        if self.counted {
            return false;
        }
        self.counted = true;
        true
    }

    /// 切换当前歌曲；相同歌曲返回 None，否则返回需要回退收听人数的旧歌曲。
    /// 旧歌曲没有计入时返回 Some(None)。
    pub fn select_song(&mut self, song_id: Option<String>) -> Option<Option<String>> {
        if self.current_song == song_id {
            return None;
        }
        let previous = std::mem::replace(&mut self.current_song, song_id);
        let listening = std::mem::take(&mut self.listener_counted);
        Some(previous.filter(|_| listening))
    }

    /// 关闭连接，取出需要回退的歌曲和计数标记
    pub fn close(&mut self) -> (Option<String>, bool) {
        self.open = false;
        let counted = std::mem::take(&mut self.counted);
        let listening = std::mem::take(&mut self.listener_counted);
        (self.current_song.take().filter(|_| listening), counted)
    }
}
