pub mod consts;
pub mod middleware;
pub mod native_api;
pub mod presence_ws;

use application::command::song::SongService;
use application::command::vote::VoteLedger;
use application::presence::{subscribe_snapshot_relay, PresenceRegistry, SnapshotPublisher};
use application::projector::vote_count::{ReconciliationScheduler, VoteCountReconciler};
use application::query::catalog::CatalogService;
use application::store::{CounterStore, PubSubChannel};
use domain::song::SongRepository;
use domain::vote::SongVoteRepository;
use infra::config::AppConfigImpl;
use infra::repository::in_memory::{InMemorySongRepository, InMemorySongVoteRepository};
use infra::repository::postgres::command::{SongRepositoryImpl, SongVoteRepositoryImpl};
use infra::{
    HmacUrlSigner, InMemoryCounterStore, InMemoryPubSub, MokaSongListCache, RedisCounterStore,
    RedisPubSub, TimeoutCounterStore,
};
use log::{info, warn};
use sea_orm::DatabaseConnection;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DbBackend, DbErr, Statement};
use std::sync::Arc;
use tokio::task::JoinHandle;

pub struct AppState {
    pub app_cfg: AppConfigImpl,
    pub channel: Arc<dyn PubSubChannel>,
    pub publisher: Arc<SnapshotPublisher>,
    pub presence: Arc<PresenceRegistry>,
    pub votes: Arc<VoteLedger>,
    pub catalog: Arc<CatalogService>,
    pub songs: Arc<SongService>,
    pub reconciliation: Arc<ReconciliationScheduler>,
}

impl AppState {
    pub async fn init_db(db_url: &str) -> Result<DatabaseConnection, DbErr> {
        use std::time::Duration;

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(32)
            .min_connections(4)
            .connect_timeout(Duration::from_secs(3))
            .acquire_timeout(Duration::from_secs(8))
            .idle_timeout(Duration::from_secs(60))
            .max_lifetime(Duration::from_secs(300))
            .sqlx_logging(false)
            .sqlx_logging_level(log::LevelFilter::Info);

        let db = Database::connect(opt).await?;

        let backend = DbBackend::Postgres;
        db.execute(Statement::from_string(backend, "SELECT 1".to_owned()))
            .await?;

        info!("Database connection pool initialized successfully");
        Ok(db)
    }

    /// 有数据库连接时使用 Postgres 仓储，否则退回内存仓储；
    /// 配置了 store.url 时计数和频道走 Redis，否则只在本进程内有效
    pub async fn new(
        app_cfg: AppConfigImpl,
        db: Option<DatabaseConnection>,
    ) -> anyhow::Result<Self> {
        let (songs, votes): (Arc<dyn SongRepository>, Arc<dyn SongVoteRepository>) = match db {
            Some(db) => (
                Arc::new(SongRepositoryImpl::new(db.clone())),
                Arc::new(SongVoteRepositoryImpl::new(db)),
            ),
            None => {
                warn!("No database configured, songs and votes are kept in memory only");
                (
                    Arc::new(InMemorySongRepository::new()),
                    Arc::new(InMemorySongVoteRepository::new()),
                )
            }
        };
        let (counters, channel) = Self::init_stores(&app_cfg).await?;
        Self::with_stores(app_cfg, songs, votes, counters, channel)
    }

    async fn init_stores(
        app_cfg: &AppConfigImpl,
    ) -> anyhow::Result<(Arc<dyn CounterStore>, Arc<dyn PubSubChannel>)> {
        if app_cfg.uses_shared_store() {
            let counters = RedisCounterStore::connect(&app_cfg.store_url).await?;
            let channel = RedisPubSub::connect(&app_cfg.store_url).await?;
            info!("Presence counters and vote sets are shared through Redis");
            return Ok((
                Arc::new(TimeoutCounterStore::new(counters, app_cfg.store_op_timeout)),
                Arc::new(channel),
            ));
        }

        warn!("No shared store configured, presence and vote sets are local to this process");
        Ok((
            Arc::new(TimeoutCounterStore::new(
                InMemoryCounterStore::new(),
                app_cfg.store_op_timeout,
            )),
            Arc::new(InMemoryPubSub::new()),
        ))
    }

    /// 进程内存储，测试用
    pub fn with_repositories(
        app_cfg: AppConfigImpl,
        songs: Arc<dyn SongRepository>,
        votes: Arc<dyn SongVoteRepository>,
    ) -> anyhow::Result<Self> {
        let counters: Arc<dyn CounterStore> = Arc::new(TimeoutCounterStore::new(
            InMemoryCounterStore::new(),
            app_cfg.store_op_timeout,
        ));
        let channel: Arc<dyn PubSubChannel> = Arc::new(InMemoryPubSub::new());
        Self::with_stores(app_cfg, songs, votes, counters, channel)
    }

    pub fn with_stores(
        app_cfg: AppConfigImpl,
        songs: Arc<dyn SongRepository>,
        votes: Arc<dyn SongVoteRepository>,
        counters: Arc<dyn CounterStore>,
        channel: Arc<dyn PubSubChannel>,
    ) -> anyhow::Result<Self> {
        // 在线人数
        let publisher = Arc::new(SnapshotPublisher::new(
            Arc::clone(&counters),
            Arc::clone(&channel),
            app_cfg.presence.keys.clone(),
        ));
        let presence = Arc::new(PresenceRegistry::new(
            Arc::clone(&counters),
            Arc::clone(&publisher),
        ));

        // 投票
        let vote_ledger = Arc::new(VoteLedger::new(
            Arc::clone(&songs),
            Arc::clone(&votes),
            Arc::clone(&counters),
            app_cfg.vote.keys.clone(),
        ));
        let reconciler = Arc::new(VoteCountReconciler::new(
            Arc::clone(&songs),
            votes,
            counters,
            app_cfg.vote.keys.clone(),
        ));
        let reconciliation = Arc::new(ReconciliationScheduler::new(
            reconciler,
            app_cfg.vote.reconcile_interval,
        ));

        // 歌曲列表
        let catalog_cfg = &app_cfg.catalog;
        let signer = HmacUrlSigner::new(
            &catalog_cfg.media_base_url,
            &catalog_cfg.signing_key,
            catalog_cfg.url_ttl_secs,
        )?;
        let catalog = Arc::new(CatalogService::new(
            Arc::clone(&songs),
            Arc::new(MokaSongListCache::new(catalog_cfg.ttl)),
            Arc::new(signer),
            catalog_cfg.collections(),
        ));
        let song_service = Arc::new(SongService::new(songs, Arc::clone(&catalog)));

        Ok(Self {
            app_cfg,
            channel,
            publisher,
            presence,
            votes: vote_ledger,
            catalog,
            songs: song_service,
            reconciliation,
        })
    }
}

/// 进程就绪前的启动流程：可选的在线计数清零、一次强制对账、订阅快照频道、启动定时对账
pub async fn start_background_tasks(state: &AppState) -> anyhow::Result<Vec<JoinHandle<()>>> {
    if state.app_cfg.presence.reset_on_startup {
        if let Err(e) = state.publisher.reset_counters().await {
            warn!("Failed to reset presence counters on startup: {}", e);
        }
    }

    state.reconciliation.run_startup().await;

    let relay = subscribe_snapshot_relay(
        Arc::clone(&state.presence),
        Arc::clone(&state.channel),
        &state.app_cfg.presence.keys.channel,
    )
    .await?;
    let scheduler = Arc::clone(&state.reconciliation).spawn();
    info!(
        "Background tasks started, vote counts reconciled every {}s",
        state.app_cfg.vote.reconcile_interval.as_secs()
    );
    Ok(vec![relay, scheduler])
}
