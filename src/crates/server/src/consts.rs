pub const X_FORWARDED_FOR: &str = "X-Forwarded-For";
pub const X_REAL_IP: &str = "X-Real-IP";

/// multipart 中承载文件的字段名
pub const UPLOAD_FIELD: &str = "file";
/// 单个上传文件的大小上限
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@localhost";
