use async_trait::async_trait;
use dashmap::DashMap;
use domain::user::{User, UserError, UserRepository};
use std::sync::Arc;
use tokio::sync::Mutex;

/// 未配置数据库时使用，进程退出即丢失
#[derive(Clone, Default)]
pub struct InMemoryUserRepository {
    store: Arc<DashMap<String, User>>,
    /// 写入串行化，唯一性检查和插入之间不能插进别的写入
    write_lock: Arc<Mutex<()>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_username<'a>(&'a self, username: &'a str) -> Result<Option<User>, UserError> {
        Ok(self.store.get(username).map(|v| v.clone()))
    }

    async fn find_by_email<'a>(&'a self, email: &'a str) -> Result<Option<User>, UserError> {
        Ok(self
            .store
            .iter()
            .find(|e| e.value().email == email)
            .map(|e| e.value().clone()))
    }

    async fn find_all(&self) -> Result<Vec<User>, UserError> {
        let mut users: Vec<User> = self.store.iter().map(|e| e.value().clone()).collect();
        users.sort_by_key(|u| u.id.as_i64());
        Ok(users)
    }

    async fn save<'a>(&'a self, user: &User) -> Result<(), UserError> {
        let _guard = self.write_lock.lock().await;

        // 用户名和邮箱都唯一，且一个 id 只对应一个用户名
        for entry in self.store.iter() {
            let other = entry.value();
            if other.id == user.id {
                if other.username != user.username {
                    return Err(UserError::UsernameTaken(other.username.clone()));
                }
            } else if other.username == user.username {
                return Err(UserError::UsernameTaken(user.username.clone()));
            } else if other.email == user.email {
                return Err(UserError::EmailTaken(user.email.clone()));
            }
        }
        self.store.insert(user.username.clone(), user.clone());
        Ok(())
    }
}
