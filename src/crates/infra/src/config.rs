use application::command::vote::VoteKeys;
use application::presence::PresenceKeys;
use application::query::catalog::{Collection, Collections};
use config::{Config, Environment, File};
use dotenvy::dotenv;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawConfig {
    /// 为空时使用内存仓储
    database_url: String,
    server: RawServerConfig,
    presence: RawPresenceConfig,
    vote: RawVoteConfig,
    catalog: RawCatalogConfig,
    store: RawStoreConfig,
}

/// 服务器配置（原始配置）
#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawServerConfig {
    /// 监听地址
    host: String,
    /// 监听端口
    port: u16,
}

impl Default for RawServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// 在线人数配置（原始配置）
#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawPresenceConfig {
    channel: String,
    online_total_key: String,
    song_listeners_key: String,
    /// 进程就绪时清空在线计数，只适合单进程部署
    reset_on_startup: bool,
}

impl Default for RawPresenceConfig {
    fn default() -> Self {
        let keys = PresenceKeys::default();
        Self {
            channel: keys.channel,
            online_total_key: keys.online_total,
            song_listeners_key: keys.song_listeners,
            reset_on_startup: false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawVoteConfig {
    /// 票数对账间隔（秒），默认 5 分钟
    reconcile_interval_secs: u64,
    likes_key_prefix: String,
    dislikes_key_prefix: String,
}

impl Default for RawVoteConfig {
    fn default() -> Self {
        let keys = VoteKeys::default();
        Self {
            reconcile_interval_secs: 300,
            likes_key_prefix: keys.likes_prefix,
            dislikes_key_prefix: keys.dislikes_prefix,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawCatalogConfig {
    /// 歌曲列表缓存过期时间（秒），默认 10 分钟
    ttl_secs: u64,
    /// 访问 URL 有效期（秒）
    url_ttl_secs: u64,
    media_base_url: String,
    signing_key: String,
    key_root: String,
    /// 合集 key -> 显示名
    collections: BTreeMap<String, String>,
}

impl Default for RawCatalogConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 600,
            url_ttl_secs: 3600,
            media_base_url: "http://127.0.0.1:9000/media/".to_string(),
            signing_key: "change-me".to_string(),
            key_root: "music".to_string(),
            collections: BTreeMap::from([
                ("ha_ji_mi".to_string(), "哈基米".to_string()),
                ("dian_gun".to_string(), "溜冰场".to_string()),
                ("da_si_ma".to_string(), "大司马".to_string()),
                ("ding_zhen".to_string(), "丁真".to_string()),
                ("dxl".to_string(), "东洋雪莲".to_string()),
                ("DDF".to_string(), "哲学".to_string()),
                ("true_music".to_string(), "真正的音乐".to_string()),
            ]),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawStoreConfig {
    /// Redis 地址，例如 `redis://127.0.0.1:6379/0`；为空时使用进程内存储
    url: String,
    /// 单次存储调用超时（毫秒）
    op_timeout_ms: u64,
}

impl Default for RawStoreConfig {
    fn default() -> Self {
        Self {
            url: "".to_string(),
            op_timeout_ms: 2000,
        }
    }
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            database_url: "".to_string(),
            server: RawServerConfig::default(),
            presence: RawPresenceConfig::default(),
            vote: RawVoteConfig::default(),
            catalog: RawCatalogConfig::default(),
            store: RawStoreConfig::default(),
        }
    }
}

/// 服务器配置
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct PresenceConfig {
    pub keys: PresenceKeys,
    pub reset_on_startup: bool,
}

#[derive(Debug, Clone)]
pub struct VoteConfig {
    pub keys: VoteKeys,
    pub reconcile_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub ttl: Duration,
    pub url_ttl_secs: u64,
    pub media_base_url: String,
    pub signing_key: String,
    pub key_root: String,
    pub collections: Vec<Collection>,
}

impl CatalogConfig {
    pub fn collections(&self) -> Collections {
        Collections::new(self.key_root.clone(), self.collections.clone())
    }
}

#[derive(Debug, Clone)]
pub struct AppConfigImpl {
    pub database_url: String,
    pub server: ServerConfig,
    pub presence: PresenceConfig,
    pub vote: VoteConfig,
    pub catalog: CatalogConfig,
    pub store_url: String,
    pub store_op_timeout: Duration,
}

impl AppConfigImpl {
    fn new(data: RawConfig) -> Self {
        AppConfigImpl {
            database_url: data.database_url,
            server: ServerConfig {
                host: data.server.host,
                port: data.server.port,
            },
            presence: PresenceConfig {
                keys: PresenceKeys {
                    online_total: data.presence.online_total_key,
                    song_listeners: data.presence.song_listeners_key,
                    channel: data.presence.channel,
                },
                reset_on_startup: data.presence.reset_on_startup,
            },
            vote: VoteConfig {
                keys: VoteKeys {
                    likes_prefix: data.vote.likes_key_prefix,
                    dislikes_prefix: data.vote.dislikes_key_prefix,
                },
                // 0 会让定时器立即空转
                reconcile_interval: Duration::from_secs(data.vote.reconcile_interval_secs.max(1)),
            },
            catalog: CatalogConfig {
                ttl: Duration::from_secs(data.catalog.ttl_secs),
                url_ttl_secs: data.catalog.url_ttl_secs,
                media_base_url: data.catalog.media_base_url,
                signing_key: data.catalog.signing_key,
                key_root: data.catalog.key_root,
                collections: data
                    .catalog
                    .collections
                    .into_iter()
                    .map(|(key, name)| Collection { key, name })
                    .collect(),
            },
            store_url: data.store.url,
            store_op_timeout: Duration::from_millis(data.store.op_timeout_ms),
        }
    }

    pub fn load() -> Result<AppConfigImpl, Box<dyn Error>> {
        dotenv().ok();

        let config = Config::builder()
            .add_source(File::with_name("config").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        let raw: RawConfig = config.try_deserialize()?; // serde 自动填充默认值
        Ok(AppConfigImpl::new(raw))
    }

    pub fn uses_database(&self) -> bool {
        !self.database_url.trim().is_empty()
    }

    /// 配置了 Redis 时多个进程共享计数和频道
    pub fn uses_shared_store(&self) -> bool {
        !self.store_url.trim().is_empty()
    }
}

impl Default for AppConfigImpl {
    fn default() -> Self {
        Self::new(RawConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_original_key_layout() {
        let cfg = AppConfigImpl::new(RawConfig::default());
        assert_eq!(cfg.presence.keys.online_total, "music:online:total");
        assert_eq!(cfg.presence.keys.song_listeners, "music:online:song:listeners");
        assert_eq!(cfg.presence.keys.channel, "online-count-channel");
        assert_eq!(cfg.vote.keys.likes(domain::value::SongId::from(7)), "likes:7");
        assert_eq!(cfg.vote.reconcile_interval, Duration::from_secs(300));
        assert_eq!(cfg.catalog.ttl, Duration::from_secs(600));
        assert!(!cfg.uses_database());
        assert!(!cfg.uses_shared_store());
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config = Config::builder()
            .add_source(config::File::from_str(
                r#"
                database_url = "postgres://localhost/pulse"
                [server]
                port = 9000
                [store]
                url = "redis://127.0.0.1:6379/0"
                [catalog.collections]
                DDF = "哲学"
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let raw: RawConfig = config.try_deserialize().unwrap();
        let cfg = AppConfigImpl::new(raw);

        assert!(cfg.uses_database());
        assert!(cfg.uses_shared_store());
        assert_eq!(cfg.store_op_timeout, Duration::from_millis(2000));
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.catalog.collections.len(), 1);
        assert_eq!(
            cfg.catalog.collections()
                .key_prefix(&cfg.catalog.collections[0]),
            "music/哲学/"
        );
    }
}
