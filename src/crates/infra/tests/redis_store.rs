//! 需要一个真实的 Redis，设置 `PULSE_TEST_REDIS_URL` 后才会执行

use application::presence::{
    subscribe_snapshot_relay, ChannelSink, ConnectionId, ConnectionSink, PresenceKeys,
    PresenceRegistry, PresenceSnapshot, SnapshotPublisher,
};
use application::store::{CounterStore, PubSubChannel};
use infra::{RedisCounterStore, RedisPubSub};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

fn redis_url() -> Option<String> {
    std::env::var("PULSE_TEST_REDIS_URL")
        .ok()
        .filter(|url| !url.is_empty())
}

/// 每个测试进程独立的键前缀
fn scoped(name: &str) -> String {
    format!("pulse-test:{}:{}", std::process::id(), name)
}

#[tokio::test]
async fn test_counter_primitives_against_redis() {
    let Some(url) = redis_url() else {
        return;
    };
    let store = RedisCounterStore::connect(&url).await.unwrap();
    let total = scoped("total");
    let hash = scoped("listeners");
    let likes = scoped("likes");
    let dislikes = scoped("dislikes");

    assert_eq!(store.incr_by(&total, 2).await.unwrap(), 2);
    assert_eq!(store.incr_by(&total, -3).await.unwrap(), -1);
    store.set_int(&total, 0).await.unwrap();
    assert_eq!(store.get_int(&total).await.unwrap(), Some(0));

    assert_eq!(store.hash_incr_by(&hash, "A", 1).await.unwrap(), 1);
    store.hash_set(&hash, "B", 4).await.unwrap();
    let entries = store.hash_entries(&hash).await.unwrap();
    assert_eq!(entries.get("B"), Some(&4));

    assert!(store.set_add(&likes, "1").await.unwrap());
    assert!(!store.set_add(&likes, "1").await.unwrap());
    assert!(store.set_move(&likes, &dislikes, "1").await.unwrap());
    // 源集合里没有也会加入目标集合
    assert!(!store.set_move(&likes, &dislikes, "2").await.unwrap());
    assert_eq!(store.set_size(&likes).await.unwrap(), 0);
    assert_eq!(store.set_size(&dislikes).await.unwrap(), 2);
    assert!(store.set_contains(&dislikes, "2").await.unwrap());

    for key in [&total, &hash, &likes, &dislikes] {
        store.delete(key).await.unwrap();
    }
    assert_eq!(store.get_int(&total).await.unwrap(), None);
}

#[tokio::test]
async fn test_two_processes_share_presence_through_redis() {
    let Some(url) = redis_url() else {
        return;
    };
    let keys = PresenceKeys {
        online_total: scoped("online"),
        song_listeners: scoped("song-listeners"),
        channel: scoped("channel"),
    };

    let mut nodes = Vec::new();
    for _ in 0..2 {
        let counters: Arc<dyn CounterStore> =
            Arc::new(RedisCounterStore::connect(&url).await.unwrap());
        let channel: Arc<dyn PubSubChannel> = Arc::new(RedisPubSub::connect(&url).await.unwrap());
        let publisher = Arc::new(SnapshotPublisher::new(
            Arc::clone(&counters),
            Arc::clone(&channel),
            keys.clone(),
        ));
        publisher.reset_counters().await.unwrap();
        let registry = Arc::new(PresenceRegistry::new(counters, publisher));
        let relay = subscribe_snapshot_relay(Arc::clone(&registry), channel, &keys.channel)
            .await
            .unwrap();
        nodes.push((registry, relay));
    }

    let (sink, mut rx) = ChannelSink::new();
    let sink: Arc<dyn ConnectionSink> = Arc::new(sink);
    nodes[1].0.on_connect(ConnectionId::from("watcher"), sink).await;

    let (other, _other_rx) = ChannelSink::new();
    nodes[0]
        .0
        .on_connect(ConnectionId::from("listener"), Arc::new(other))
        .await;
    nodes[0]
        .0
        .on_song_change(&ConnectionId::from("listener"), Some("A".into()))
        .await;

    let seen = timeout(Duration::from_secs(5), async {
        loop {
            let message = rx.recv().await.unwrap();
            let snapshot = PresenceSnapshot::decode(&message).unwrap();
            if snapshot.online_total == 2 && snapshot.listeners_of("A") == 1 {
                return snapshot;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(seen.online_total, 2);

    for (_, relay) in nodes {
        relay.abort();
    }
    let store = RedisCounterStore::connect(&url).await.unwrap();
    store.delete(&keys.online_total).await.unwrap();
    store.delete(&keys.song_listeners).await.unwrap();
}
