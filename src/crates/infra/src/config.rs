use crate::auth::AuthConfig;
use config::{Config, Environment, File};
use dotenvy::dotenv;
use serde::Deserialize;
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawConfig {
    jwt_secret_key: String,
    jwt_expire_secs: i64,
    salt_cost: u32,
    /// 为空时使用内存仓储
    database_url: String,
    upload: RawUploadConfig,
    server: RawServerConfig,
    login_rate_limit: RawRateLimitConfig,
}

/// 上传目录配置（原始配置）
#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawUploadConfig {
    /// 私有存储根目录
    root_dir: String,
    /// 公开 URL 前缀
    base_url: String,
}

impl Default for RawUploadConfig {
    fn default() -> Self {
        Self {
            root_dir: "./uploads".to_string(),
            base_url: "/uploads".to_string(),
        }
    }
}

/// 服务器配置（原始配置）
#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawServerConfig {
    host: String,
    port: u16,
    allowed_origins: Vec<String>,
}

impl Default for RawServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            allowed_origins: vec!["http://localhost:5173".to_string()],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawRateLimitConfig {
    max_attempts: usize,
    window_secs: u64,
}

impl Default for RawRateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_secs: 60,
        }
    }
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            jwt_secret_key: "secret".to_string(),
            jwt_expire_secs: 24 * 3600,
            salt_cost: 10,
            database_url: "".to_string(),
            upload: RawUploadConfig::default(),
            server: RawServerConfig::default(),
            login_rate_limit: RawRateLimitConfig::default(),
        }
    }
}

/// 上传配置
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub root_dir: PathBuf,
    pub base_url: String,
}

/// 服务器配置
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 监听地址
    pub host: String,
    /// 监听端口
    pub port: u16,
    /// CORS 允许的来源
    pub allowed_origins: Vec<String>,
}

/// 登录限流配置
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_attempts: usize,
    pub window: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfigImpl {
    jwt_secret_key: String,
    jwt_expire_secs: i64,
    salt_cost: u32,
    database_url: String,
    upload: UploadConfig,
    server: ServerConfig,
    login_rate_limit: RateLimitConfig,
}

impl AppConfigImpl {
    fn new(data: RawConfig) -> Self {
        AppConfigImpl {
            jwt_secret_key: data.jwt_secret_key,
            jwt_expire_secs: data.jwt_expire_secs,
            salt_cost: data.salt_cost,
            database_url: data.database_url,
            upload: UploadConfig {
                root_dir: PathBuf::from(data.upload.root_dir),
                base_url: data.upload.base_url,
            },
            server: ServerConfig {
                host: data.server.host,
                port: data.server.port,
                allowed_origins: data.server.allowed_origins,
            },
            login_rate_limit: RateLimitConfig {
                max_attempts: data.login_rate_limit.max_attempts,
                window: Duration::from_secs(data.login_rate_limit.window_secs),
            },
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

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn upload(&self) -> &UploadConfig {
        &self.upload
    }

    pub fn server(&self) -> &ServerConfig {
        &self.server
    }

    pub fn login_rate_limit(&self) -> RateLimitConfig {
        self.login_rate_limit
    }

    pub fn with_upload_root(mut self, root_dir: impl Into<PathBuf>) -> Self {
        self.upload.root_dir = root_dir.into();
        self
    }

    pub fn with_salt_cost(mut self, salt_cost: u32) -> Self {
        self.salt_cost = salt_cost;
        self
    }

    pub fn with_login_rate_limit(mut self, max_attempts: usize, window: Duration) -> Self {
        self.login_rate_limit = RateLimitConfig {
            max_attempts,
            window,
        };
        self
    }
}

impl Default for AppConfigImpl {
    fn default() -> Self {
        AppConfigImpl::new(RawConfig::default())
    }
}

impl AuthConfig for AppConfigImpl {
    fn jwt_secret(&self) -> &str {
        &self.jwt_secret_key
    }

    fn jwt_expire_secs(&self) -> i64 {
        self.jwt_expire_secs
    }

    fn salt_cost(&self) -> u32 {
        self.salt_cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfigImpl::default();
        assert_eq!(cfg.jwt_expire_secs(), 86400);
        assert_eq!(cfg.salt_cost(), 10);
        assert!(cfg.database_url().is_empty());
        assert_eq!(cfg.upload().base_url, "/uploads");
        assert_eq!(cfg.upload().root_dir, PathBuf::from("./uploads"));
        assert_eq!(cfg.server().port, 8080);
        assert_eq!(cfg.login_rate_limit().max_attempts, 5);
        assert_eq!(cfg.login_rate_limit().window, Duration::from_secs(60));
    }

    #[test]
    fn test_partial_source_keeps_defaults() {
        let config = Config::builder()
            .set_override("jwt_expire_secs", 120)
            .unwrap()
            .set_override("upload.base_url", "/files")
            .unwrap()
            .build()
            .unwrap();
        let raw: RawConfig = config.try_deserialize().unwrap();
        let cfg = AppConfigImpl::new(raw);

        assert_eq!(cfg.jwt_expire_secs(), 120);
        assert_eq!(cfg.upload().base_url, "/files");
        assert_eq!(cfg.upload().root_dir, PathBuf::from("./uploads"));
        assert_eq!(cfg.jwt_secret(), "secret");
    }
}
