use crate::error::AppError;
use async_trait::async_trait;
use domain::value::FileCategory;
use std::path::PathBuf;

/// 一次上传的内容及客户端提供的元数据
#[derive(Debug, Clone, Copy)]
pub struct UploadedFile<'a> {
    pub content: &'a [u8],
    /// Client supplied `Content-Type`, trusted as is.
    pub content_type: Option<&'a str>,
    /// Only its extension is kept, and only when it is plain alphanumeric.
    pub original_filename: Option<&'a str>,
}

/// Secure file gateway: stores uploads under random names and maps public URLs back to paths
/// inside the private root.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Stores the bytes and returns the public URL `{baseUrl}/{category}/{name}`.
    /// Without an explicit category it is inferred from the content type.
    async fn store(
        &self,
        category: Option<FileCategory>,
        file: UploadedFile<'_>,
    ) -> Result<String, AppError>;

    /// Maps a public URL to a filesystem path strictly below the private root.
    fn resolve(&self, public_url: &str) -> Option<PathBuf>;

    /// Idempotent; `false` when nothing was deleted. Never fails.
    async fn delete(&self, public_url: &str) -> bool;
}
