use crate::error::AppError;
use async_trait::async_trait;

#[async_trait]
pub trait IdGenerator: Send + Sync {
    /// 生成下一个唯一ID
    async fn next_id(&self) -> Result<i64, AppError>;
}
