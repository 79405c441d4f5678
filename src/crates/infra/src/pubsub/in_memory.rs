use application::store::{PubSubChannel, StoreError};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::{self, BoxStream, StreamExt};
use log::warn;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

/// 每个频道缓存的消息数，订阅者落后超过这个数量会丢掉最旧的消息
const CHANNEL_CAPACITY: usize = 1024;

/// 进程内的发布订阅通道，每个频道一个 broadcast
#[derive(Clone)]
pub struct InMemoryPubSub {
    channels: Arc<DashMap<String, broadcast::Sender<String>>>,
    capacity: usize,
}

impl Default for InMemoryPubSub {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPubSub {
    pub fn new() -> Self {
        Self::with_capacity(CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    fn sender(&self, channel: &str) -> broadcast::Sender<String> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// 关闭频道，所有订阅流随之结束
    pub fn close(&self, channel: &str) {
        self.channels.remove(channel);
    }
}

#[async_trait]
impl PubSubChannel for InMemoryPubSub {
    async fn publish(&self, channel: &str, message: String) -> Result<usize, StoreError> {
        // 没有订阅者时 send 返回错误，这不是故障
        Ok(self.sender(channel).send(message).unwrap_or(0))
    }

    async fn subscribe(&self, channel: &str) -> Result<BoxStream<'static, String>, StoreError> {
        let rx = self.sender(channel).subscribe();
        let name = channel.to_string();
        let stream = stream::unfold((rx, name), |(mut rx, name)| async move {
            loop {
                match rx.recv().await {
                    Ok(message) => return Some((message, (rx, name))),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Subscriber of {} lagged, {} messages dropped", name, skipped);
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        });
        Ok(stream.boxed())
    }
}
