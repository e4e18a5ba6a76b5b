pub mod repository;

pub mod id_generator;
pub use id_generator::SnowflakeIdGenerator;

pub mod storage;
pub use storage::LocalFileStorage;

pub mod config;
pub use config::{AppConfigImpl, RateLimitConfig, ServerConfig, UploadConfig};

pub mod auth;
