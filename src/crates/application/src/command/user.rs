use crate::auth::PasswordHasher;
use crate::context::AuthorizationContext;
use crate::error::AppError;
use domain::user::{User, UserRepository};
use std::sync::Arc;

/// 修改密码命令
pub struct ChangePasswordCmd {
    pub old_password: String,
    pub new_password: String,
}

/// 修改资料命令
pub struct UpdateProfileCmd {
    pub email: String,
    pub company_name: Option<String>,
    pub company_address: Option<String>,
}

/// 用户应用服务
pub struct UserAppService {
    user_repo: Arc<dyn UserRepository>,
    hasher: Arc<dyn PasswordHasher>,
}

impl UserAppService {
    pub fn new(user_repo: Arc<dyn UserRepository>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { user_repo, hasher }
    }

    /// 当前请求的用户
    pub fn me(&self, ctx: &AuthorizationContext) -> Result<User, AppError> {
        ctx.user()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("authentication required".to_string()))
    }

    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let mut users = self.user_repo.find_all().await?;
        users.sort_by_key(|u| u.id.as_i64());
        Ok(users)
    }

    /// 修改密码。已签发的令牌不受影响，直到自然过期。
    pub async fn change_password(
        &self,
        ctx: &AuthorizationContext,
        cmd: ChangePasswordCmd,
    ) -> Result<(), AppError> {
        let username = ctx
            .username()
            .ok_or_else(|| AppError::Unauthorized("authentication required".to_string()))?;

        if cmd.new_password.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "new password must not be blank".to_string(),
            ));
        }

        // 重新加载，避免使用请求开始时的旧快照
        let mut user = self
            .user_repo
            .find_by_username(username)
            .await?
            .ok_or_else(|| AppError::not_found("User", username))?;

        self.hasher
            .verify(&cmd.old_password, &user.password)
            .map_err(|_| AppError::AuthenticationFailure)?;

        let hashed = self.hasher.hash(&cmd.new_password)?;
        user.change_password(&hashed);
        self.user_repo.save(&user).await?;
        log::info!("password changed for user {}", user.username);
        Ok(())
    }

    pub async fn update_profile(
        &self,
        ctx: &AuthorizationContext,
        cmd: UpdateProfileCmd,
    ) -> Result<User, AppError> {
        let username = ctx
            .username()
            .ok_or_else(|| AppError::Unauthorized("authentication required".to_string()))?;

        let email = cmd.email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
            _ => return Err(AppError::InvalidInput(format!("invalid email: {}", email))),
        }

        let mut user = self
            .user_repo
            .find_by_username(username)
            .await?
            .ok_or_else(|| AppError::not_found("User", username))?;

        if let Some(other) = self.user_repo.find_by_email(email).await? {
            if other.id != user.id {
                return Err(AppError::Conflict(format!(
                    "email '{}' is already registered",
                    email
                )));
            }
        }

        user.update_profile(
            email,
            cmd.company_name.as_deref(),
            cmd.company_address.as_deref(),
        );
        self.user_repo.save(&user).await?;
        Ok(user)
    }
}
