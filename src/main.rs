use actix_web::middleware::Logger;
use actix_web::{middleware::from_fn, web, App, HttpServer};
use anyhow::Context;
use domain::user::UserRepository;
use infra::config::AppConfigImpl;
use infra::repository::{InMemoryUserRepository, UserRepositoryImpl};
use log::{info, warn};
use log4rs::{
    append::{console::ConsoleAppender, file::FileAppender},
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
};
use migration::{Migrator, MigratorTrait};
use server::middleware::{cors, enforce_policy, SecurityContextResolver};
use std::sync::Arc;

const LOG_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {m}{n}";

fn init_logging() -> anyhow::Result<()> {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    let file_appender = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build("app.log")
        .context("cannot open app.log")?;
    let console_appender = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();

    // 同时输出到控制台和文件
    let config = Config::builder()
        .appender(Appender::builder().build("file", Box::new(file_appender)))
        .appender(Appender::builder().build("stdout", Box::new(console_appender)))
        .build(
            Root::builder()
                .appender("file")
                .appender("stdout")
                .build(log_level.parse().unwrap_or(log::LevelFilter::Info)),
        )?;

    log4rs::init_config(config)?;
    Ok(())
}

async fn user_repository(cfg: &AppConfigImpl) -> anyhow::Result<Arc<dyn UserRepository>> {
    if cfg.database_url().is_empty() {
        warn!("database_url is empty, identities are kept in memory only");
        return Ok(Arc::new(InMemoryUserRepository::new()));
    }

    let db = server::AppState::init_db(cfg.database_url())
        .await
        .context("cannot connect to database")?;
    Migrator::up(&db, None).await.context("migration failed")?;
    Ok(Arc::new(UserRepositoryImpl::new(db)))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;

    let cfg = AppConfigImpl::load().map_err(|e| anyhow::anyhow!("cannot load config: {}", e))?;
    let server_cfg = cfg.server().clone();

    let user_repo = user_repository(&cfg).await?;
    let app_state = server::AppState::new(cfg, user_repo)?;
    server::init_admin_user(&app_state).await?;

    let uploads_path = app_state.storage.base_path().to_string();
    let app_state = web::Data::new(app_state);

    info!("listening on {}:{}", server_cfg.host, server_cfg.port);
    let allowed_origins = server_cfg.allowed_origins.clone();
    HttpServer::new(move || {
        let uploads_path = uploads_path.clone();
        // 最后注册的最先执行：cors -> 访问日志 -> 身份解析 -> 策略
        App::new()
            .app_data(app_state.clone())
            .configure(move |cfg| server::configure_app(cfg, &uploads_path))
            .wrap(from_fn(enforce_policy))
            .wrap(SecurityContextResolver)
            .wrap(Logger::new("%a \"%r\" %s %b %T"))
            .wrap(cors(&allowed_origins))
    })
    .bind((server_cfg.host.as_str(), server_cfg.port))?
    .run()
    .await?;
    Ok(())
}
