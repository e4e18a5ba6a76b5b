pub mod auth;
pub mod consts;
pub mod error;
pub mod files;
pub mod middleware;
pub mod song_api;
pub mod user_api;

use actix_web::web;
use application::auth::{AuthService, PasswordHasher, TokenService};
use application::command::like::LikeAppService;
use application::command::shared::IdGenerator;
use application::command::song::SongAppService;
use application::command::user::UserAppService;
use application::error::AppError;
use application::policy::PolicyTable;
use application::security::SecurityPipeline;
use auth::RateLimiter;
use error::ApiError;
use domain::song::{LikeRepository, SongRepository};
use domain::user::UserRepository;
use infra::auth::{AuthConfig, BcryptPasswordHasher, JwtTokenService};
use infra::config::AppConfigImpl;
use infra::id_generator::SnowflakeIdGenerator;
use infra::repository::{InMemoryLikeRepository, InMemorySongRepository};
use infra::storage::LocalFileStorage;
use parking_lot::Mutex;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, DbErr, Statement};
use std::sync::Arc;

pub struct AppState {
    pub app_cfg: AppConfigImpl,
    pub user_repo: Arc<dyn UserRepository>,
    pub song_repo: Arc<dyn SongRepository>,
    pub like_repo: Arc<dyn LikeRepository>,
    pub id_generator: Arc<dyn IdGenerator>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub token_svc: Arc<dyn TokenService>,
    pub storage: Arc<LocalFileStorage>,
    pub policy: PolicyTable,
    pub pipeline: SecurityPipeline,
    pub login_limiter: Mutex<RateLimiter>,
}

impl AppState {
    pub async fn init_db(db_url: &str) -> Result<DatabaseConnection, DbErr> {
        use log::info;
        use std::time::Duration;

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(20)
            .min_connections(2)
            .connect_timeout(Duration::from_secs(3))
            .acquire_timeout(Duration::from_secs(8))
            .idle_timeout(Duration::from_secs(60))
            .max_lifetime(Duration::from_secs(300))
            .sqlx_logging(false)
            .sqlx_logging_level(log::LevelFilter::Info);

        let db = Database::connect(opt).await?;
        db.execute(Statement::from_string(DbBackend::Postgres, "SELECT 1".to_owned()))
            .await?;

        info!("Database connection pool initialized successfully");
        Ok(db)
    }

    pub fn new(app_cfg: AppConfigImpl, user_repo: Arc<dyn UserRepository>) -> Result<Self, AppError> {
        let id_generator: Arc<dyn IdGenerator> = Arc::new(SnowflakeIdGenerator::new(1)?);
        let hasher: Arc<dyn PasswordHasher> =
            Arc::new(BcryptPasswordHasher::new(app_cfg.salt_cost()));
        let token_svc: Arc<dyn TokenService> = Arc::new(JwtTokenService::from_config(&app_cfg));

        let upload = app_cfg.upload();
        let storage = Arc::new(LocalFileStorage::new(&upload.root_dir, &upload.base_url)?);
        let policy = PolicyTable::melodymix(storage.base_path())
            .map_err(|e| AppError::UnknownError(e.to_string()))?;
        let pipeline = SecurityPipeline::new(token_svc.clone(), user_repo.clone());
        let login_limiter = Mutex::new(RateLimiter::new(app_cfg.login_rate_limit()));

        Ok(Self {
            app_cfg,
            user_repo,
            song_repo: Arc::new(InMemorySongRepository::new()),
            like_repo: Arc::new(InMemoryLikeRepository::new()),
            id_generator,
            hasher,
            token_svc,
            storage,
            policy,
            pipeline,
            login_limiter,
        })
    }

    pub fn auth_service(&self) -> AuthService {
        AuthService::new(
            self.user_repo.clone(),
            self.hasher.clone(),
            self.token_svc.clone(),
            self.id_generator.clone(),
        )
    }

    pub fn user_service(&self) -> UserAppService {
        UserAppService::new(self.user_repo.clone(), self.hasher.clone())
    }

    pub fn song_service(&self) -> SongAppService {
        SongAppService::new(
            self.song_repo.clone(),
            self.storage.clone(),
            self.id_generator.clone(),
        )
    }

    pub fn like_service(&self) -> LikeAppService {
        LikeAppService::new(self.like_repo.clone(), self.song_repo.clone())
    }
}

/// 首次启动时创建管理员账号，随机密码只在日志里出现这一次
pub async fn init_admin_user(state: &AppState) -> Result<(), AppError> {
    use log::info;
    use rand::Rng;

    let password: String = rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(16)
        .map(char::from)
        .collect();

    let created = state
        .auth_service()
        .create_admin(
            consts::DEFAULT_ADMIN_USERNAME,
            consts::DEFAULT_ADMIN_EMAIL,
            &password,
        )
        .await?;

    if created {
        info!("===========================================");
        info!("  Admin user created successfully!");
        info!("  Username: {}", consts::DEFAULT_ADMIN_USERNAME);
        info!("  Password: {}", password);
        info!("  Please change the password after login!");
        info!("===========================================");
    } else {
        info!("Admin user already exists, skipping creation");
    }
    Ok(())
}

/// 注册所有路由。`/api/songs/upload/file` 必须在 `/api/songs/{songId}` 之前。
pub fn configure_app(cfg: &mut web::ServiceConfig, uploads_path: &str) {
    // 请求体/查询串解析失败也走统一的错误响应
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _| {
        ApiError(AppError::InvalidInput(err.to_string())).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _| {
        ApiError(AppError::InvalidInput(err.to_string())).into()
    }))
    .service(auth::configure_service())
    .service(user_api::configure_service())
    .service(song_api::configure_service())
    .service(files::configure_service(uploads_path));
}
