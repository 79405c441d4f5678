use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};

use infra::config::AppConfigImpl;
use log::{info, warn};
use log4rs::{
    append::console::ConsoleAppender,
    append::file::FileAppender,
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
};

use server::middleware::other;

const LOG_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {m}{n}";

fn init_logging() -> anyhow::Result<()> {
    // 配置日志同时输出到控制台和文件
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    let file_appender = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build("app.log")?;

    let config = Config::builder()
        .appender(Appender::builder().build("file", Box::new(file_appender)))
        .appender(Appender::builder().build(
            "stdout",
            Box::new(
                ConsoleAppender::builder()
                    .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
                    .build(),
            ),
        ))
        .build(
            Root::builder()
                .appender("file")
                .appender("stdout")
                .build(log_level.parse().unwrap_or(log::LevelFilter::Info)),
        )?;

    log4rs::init_config(config)?;
    Ok(())
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;
    let cfg = AppConfigImpl::load().map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
    let server_cfg = cfg.server.clone();

    let db = if cfg.uses_database() {
        Some(server::AppState::init_db(&cfg.database_url).await?)
    } else {
        warn!("database_url is empty");
        None
    };

    let app_state = server::AppState::new(cfg, db).await?;
    // 启动对账完成、频道订阅成功之后才开始接受请求
    let background = server::start_background_tasks(&app_state).await?;
    let app_state = web::Data::new(app_state);

    info!("Listening on {}:{}", server_cfg.host, server_cfg.port);
    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(Logger::default())
            .configure(server::presence_ws::configure_service)
            .configure(server::native_api::configure_service)
            .wrap(other::cors())
    })
    .bind((server_cfg.host.as_str(), server_cfg.port))?
    .run()
    .await?;

    for task in background {
        task.abort();
    }
    Ok(())
}
