use application::command::vote::{VoteKeys, VoteLedger};
use application::presence::{
    ChannelSink, ConnectionId, ConnectionSink, PresenceKeys, PresenceRegistry, SnapshotPublisher,
};
use application::projector::vote_count::VoteCountReconciler;
use application::store::{CounterStore, PubSubChannel, StoreError};
use async_trait::async_trait;
use domain::song::{Song, SongRepository};
use domain::value::{SongId, UserId};
use domain::vote::{SongVoteRepository, VoteKind};
use infra::repository::in_memory::{InMemorySongRepository, InMemorySongVoteRepository};
use infra::{InMemoryCounterStore, InMemoryPubSub};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedReceiver;

/// 可以按原语或按键注入失败的存储
#[derive(Default)]
struct FailingStore {
    inner: InMemoryCounterStore,
    down: AtomicBool,
    ops: Mutex<HashSet<&'static str>>,
    keys: Mutex<HashSet<String>>,
}

impl FailingStore {
    fn fail_op(&self, op: &'static str) {
        self.ops.lock().unwrap().insert(op);
    }

    fn fail_key(&self, key: &str) {
        self.keys.lock().unwrap().insert(key.to_string());
    }

    fn heal(&self) {
        self.down.store(false, Ordering::SeqCst);
        self.ops.lock().unwrap().clear();
        self.keys.lock().unwrap().clear();
    }

    fn check(&self, op: &'static str, key: &str) -> Result<(), StoreError> {
        if self.down.load(Ordering::SeqCst)
            || self.ops.lock().unwrap().contains(op)
            || self.keys.lock().unwrap().contains(key)
        {
            return Err(StoreError::Unavailable(format!("{} {}", op, key)));
        }
        Ok(())
    }
}

#[async_trait]
impl CounterStore for FailingStore {
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        self.check("incr_by", key)?;
        self.inner.incr_by(key, delta).await
    }

    async fn get_int(&self, key: &str) -> Result<Option<i64>, StoreError> {
        self.check("get_int", key)?;
        self.inner.get_int(key).await
    }

    async fn set_int(&self, key: &str, value: i64) -> Result<(), StoreError> {
        self.check("set_int", key)?;
        self.inner.set_int(key, value).await
    }

    async fn hash_incr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64, StoreError> {
        self.check("hash_incr_by", key)?;
        self.inner.hash_incr_by(key, field, delta).await
    }

    async fn hash_set(&self, key: &str, field: &str, value: i64) -> Result<(), StoreError> {
        self.check("hash_set", key)?;
        self.inner.hash_set(key, field, value).await
    }

    async fn hash_entries(&self, key: &str) -> Result<HashMap<String, i64>, StoreError> {
        self.check("hash_entries", key)?;
        self.inner.hash_entries(key).await
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.check("set_add", key)?;
        self.inner.set_add(key, member).await
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.check("set_remove", key)?;
        self.inner.set_remove(key, member).await
    }

    async fn set_move(&self, src: &str, dst: &str, member: &str) -> Result<bool, StoreError> {
        self.check("set_move", src)?;
        self.check("set_move", dst)?;
        self.inner.set_move(src, dst, member).await
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.check("set_contains", key)?;
        self.inner.set_contains(key, member).await
    }

    async fn set_size(&self, key: &str) -> Result<u64, StoreError> {
        self.check("set_size", key)?;
        self.inner.set_size(key).await
    }

    async fn set_members(&self, key: &str) -> Result<HashSet<String>, StoreError> {
        self.check("set_members", key)?;
        self.inner.set_members(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check("delete", key)?;
        self.inner.delete(key).await
    }
}

fn presence(store: &Arc<FailingStore>) -> PresenceRegistry {
    let counters: Arc<dyn CounterStore> = Arc::clone(store) as Arc<dyn CounterStore>;
    let channel: Arc<dyn PubSubChannel> = Arc::new(InMemoryPubSub::new());
    let publisher = Arc::new(SnapshotPublisher::new(
        Arc::clone(&counters),
        channel,
        PresenceKeys::default(),
    ));
    PresenceRegistry::new(counters, publisher)
}

async fn connect(registry: &PresenceRegistry, id: &str) -> UnboundedReceiver<String> {
    let (sink, rx) = ChannelSink::new();
    let sink: Arc<dyn ConnectionSink> = Arc::new(sink);
    registry.on_connect(ConnectionId::from(id), sink).await;
    rx
}

#[tokio::test]
async fn test_connect_and_switch_complete_locally_when_store_is_down() {
    let store = Arc::new(FailingStore::default());
    let registry = presence(&store);
    store.down.store(true, Ordering::SeqCst);

    let _c1 = connect(&registry, "c1").await;
    assert_eq!(registry.len(), 1);
    let changed = registry
        .on_message(&ConnectionId::from("c1"), r#"{"songId":"A"}"#)
        .await
        .unwrap();
    assert!(changed);
    assert_eq!(
        registry.current_song(&ConnectionId::from("c1")).await,
        Some("A".to_string())
    );

    // 存储恢复后断开，没有计入的值也不会被减掉
    store.heal();
    registry.on_disconnect(&ConnectionId::from("c1")).await;
    let snapshot = registry.snapshot().await.unwrap();
    assert_eq!(snapshot.online_total, 0);
    assert_eq!(snapshot.listeners_of("A"), 0);
}

#[tokio::test]
async fn test_failed_listener_add_does_not_release_other_listener() {
    let store = Arc::new(FailingStore::default());
    let registry = presence(&store);
    let _c1 = connect(&registry, "c1").await;
    let _c2 = connect(&registry, "c2").await;
    registry
        .on_song_change(&ConnectionId::from("c2"), Some("A".into()))
        .await;

    store.fail_op("hash_incr_by");
    registry
        .on_song_change(&ConnectionId::from("c1"), Some("A".into()))
        .await;
    store.heal();

    registry.on_disconnect(&ConnectionId::from("c1")).await;
    let snapshot = registry.snapshot().await.unwrap();
    assert_eq!(snapshot.online_total, 1);
    assert_eq!(snapshot.listeners_of("A"), 1);

    // c2 换歌时照常回退自己的计数
    registry
        .on_song_change(&ConnectionId::from("c2"), Some("B".into()))
        .await;
    let snapshot = registry.snapshot().await.unwrap();
    assert_eq!(snapshot.listeners_of("A"), 0);
    assert_eq!(snapshot.listeners_of("B"), 1);
}

struct VoteFixture {
    store: Arc<FailingStore>,
    songs: InMemorySongRepository,
    votes: InMemorySongVoteRepository,
    ledger: VoteLedger,
    reconciler: VoteCountReconciler,
}

fn vote_fixture(ids: &[i64]) -> VoteFixture {
    let store = Arc::new(FailingStore::default());
    let songs = InMemorySongRepository::with_songs(ids.iter().map(|&id| {
        Song::new(
            SongId::from(id),
            format!("song {}", id),
            format!("music/哲学/{}.mp3", id),
        )
    }));
    let votes = InMemorySongVoteRepository::new();
    let counters = Arc::clone(&store) as Arc<dyn CounterStore>;
    let ledger = VoteLedger::new(
        Arc::new(songs.clone()) as Arc<dyn SongRepository>,
        Arc::new(votes.clone()) as Arc<dyn SongVoteRepository>,
        Arc::clone(&counters),
        VoteKeys::default(),
    );
    let reconciler = VoteCountReconciler::new(
        Arc::new(songs.clone()) as Arc<dyn SongRepository>,
        Arc::new(votes.clone()) as Arc<dyn SongVoteRepository>,
        counters,
        VoteKeys::default(),
    );
    VoteFixture {
        store,
        songs,
        votes,
        ledger,
        reconciler,
    }
}

#[tokio::test]
async fn test_mirror_failure_is_repaired_by_reconciliation() {
    let f = vote_fixture(&[7]);
    let song = SongId::from(7);
    let user = UserId::from(1);

    f.store.fail_op("set_add");
    let tally = f.ledger.like(song, user).await.unwrap();
    // 持久层已经记下，集合还差一票
    assert_eq!(tally.likes, 0);
    let stored = f.votes.find_by_user_and_song(user, song).await.unwrap();
    assert_eq!(stored.map(|v| v.kind), Some(VoteKind::Like));

    f.store.heal();
    let report = f.reconciler.reconcile_once().await.unwrap();
    assert_eq!(report.written, 1);

    let live = f.ledger.counts(song, Some(user)).await.unwrap();
    assert_eq!((live.likes, live.dislikes), (1, 0));
    let seven = f.songs.find_by_id(song).await.unwrap().unwrap();
    assert_eq!(seven.like_count, 1);
}

#[tokio::test]
async fn test_set_read_failure_skips_only_that_song() {
    let f = vote_fixture(&[1, 2]);
    f.ledger.like(SongId::from(1), UserId::from(1)).await.unwrap();
    f.ledger.like(SongId::from(2), UserId::from(1)).await.unwrap();

    f.store.fail_key("likes:1");
    let report = f.reconciler.reconcile_once().await.unwrap();
    assert_eq!(report.scanned, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.written, 1);

    let first = f.songs.find_by_id(SongId::from(1)).await.unwrap().unwrap();
    assert_eq!(first.like_count, 0);
    let second = f.songs.find_by_id(SongId::from(2)).await.unwrap().unwrap();
    assert_eq!(second.like_count, 1);

    // 故障消失后的下一轮补上
    f.store.heal();
    let report = f.reconciler.reconcile_once().await.unwrap();
    assert_eq!(report.written, 1);
    let first = f.songs.find_by_id(SongId::from(1)).await.unwrap().unwrap();
    assert_eq!(first.like_count, 1);
}
