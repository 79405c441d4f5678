use crate::counter_store::unavailable;
use application::store::{PubSubChannel, StoreError};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use log::{info, warn};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

/// 基于 Redis PUBLISH / SUBSCRIBE 的跨进程通道
///
/// 发布走共享的 `ConnectionManager`；每个订阅独占一条连接，连接断开时订阅流结束。
#[derive(Clone)]
pub struct RedisPubSub {
    client: Client,
    conn: ConnectionManager,
}

impl RedisPubSub {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url).map_err(unavailable)?;
        let conn = ConnectionManager::new(client.clone())
            .await
            .map_err(unavailable)?;
        info!("Redis pub/sub connected");
        Ok(Self { client, conn })
    }
}

#[async_trait]
impl PubSubChannel for RedisPubSub {
    async fn publish(&self, channel: &str, message: String) -> Result<usize, StoreError> {
        let mut conn = self.conn.clone();
        let receivers: i64 = conn.publish(channel, message).await.map_err(unavailable)?;
        Ok(usize::try_from(receivers).unwrap_or(0))
    }

    async fn subscribe(&self, channel: &str) -> Result<BoxStream<'static, String>, StoreError> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(unavailable)?;
        pubsub.subscribe(channel).await.map_err(unavailable)?;

        let name = channel.to_string();
        let stream = pubsub.into_on_message().filter_map(move |msg| {
            let payload = match msg.get_payload::<String>() {
                Ok(payload) => Some(payload),
                Err(e) => {
                    warn!("Dropping undecodable message on {}: {}", name, e);
                    None
                }
            };
            async move { payload }
        });
        Ok(stream.boxed())
    }
}
