use std::sync::Arc;

use crate::command::shared::IdGenerator;
use crate::error::AppError;
use domain::user::{Role, User, UserRepository};
use domain::value::UserId;
use thiserror::Error;

pub trait PasswordHasher: Send + Sync {
    fn hash(&self, plain: &str) -> Result<String, AppError>;
    fn verify(&self, pwd: &str, hashed_pwd: &str) -> Result<(), AppError>;
}

/// 时间源（Unix 秒）。令牌过期判断使用校验时刻的时间，测试中可以替换。
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Claims carried by a signed token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub username: String,
    /// Role at issuance time. Informational only: access decisions use the live identity.
    pub role: Role,
    pub issued_at: i64,
    pub expires_at: i64,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("token signature is invalid")]
    SignatureInvalid,
    #[error("token is expired")]
    Expired,
}

pub trait TokenService: Send + Sync {
    fn issue(&self, user: &User) -> Result<String, AppError>;

    /// Verifies signature and expiry, then returns the claims.
    fn validate(&self, token: &str) -> Result<TokenClaims, TokenError>;

    /// Reads the subject without checking the signature or expiry.
    /// The result must not be trusted until `is_valid_for` passes.
    fn peek_subject(&self, token: &str) -> Result<String, TokenError>;

    fn is_valid_for(&self, token: &str, user: &User) -> bool {
        match self.validate(token) {
            Ok(claims) => claims.username == user.username,
            Err(_) => false,
        }
    }
}

/// 注册命令
#[derive(Debug, Clone)]
pub struct RegisterCmd {
    pub username: String,
    pub password: String,
    pub email: String,
    pub role: Role,
    pub company_name: Option<String>,
    pub company_address: Option<String>,
}

impl RegisterCmd {
    fn validate(&self) -> Result<(), AppError> {
        if self.username.trim().is_empty() {
            return Err(AppError::InvalidInput("username must not be blank".to_string()));
        }
        if self.password.trim().is_empty() {
            return Err(AppError::InvalidInput("password must not be blank".to_string()));
        }
        let email = self.email.trim();
        if email.is_empty() {
            return Err(AppError::InvalidInput("email must not be blank".to_string()));
        }
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
            _ => Err(AppError::InvalidInput(format!("invalid email: {}", email))),
        }
    }
}

#[derive(Clone)]
pub struct AuthService {
    user_repo: Arc<dyn UserRepository>,
    hasher: Arc<dyn PasswordHasher>,
    token_svc: Arc<dyn TokenService>,
    id_generator: Arc<dyn IdGenerator>,
}

impl AuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        hasher: Arc<dyn PasswordHasher>,
        token_svc: Arc<dyn TokenService>,
        id_generator: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            user_repo,
            hasher,
            token_svc,
            id_generator,
        }
    }

    /// Register a new identity and return a token for it
    pub async fn register(&self, cmd: RegisterCmd) -> Result<String, AppError> {
        cmd.validate()?;
        if cmd.role == Role::Admin {
            return Err(AppError::Forbidden(
                "ADMIN accounts cannot be self-registered".to_string(),
            ));
        }
        let username = cmd.username.trim();
        let email = cmd.email.trim();

        if self.user_repo.find_by_username(username).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "username '{}' is already registered",
                username
            )));
        }
        if self.user_repo.find_by_email(email).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "email '{}' is already registered",
                email
            )));
        }

        let hashed_pwd = self.hasher.hash(&cmd.password)?;
        let id = UserId::from(self.id_generator.next_id().await?);
        let user = User::new(
            id,
            username,
            email,
            &hashed_pwd,
            cmd.role,
            cmd.company_name.as_deref(),
            cmd.company_address.as_deref(),
        );
        self.user_repo.save(&user).await?;
        log::info!("registered user {} with role {}", user.username, user.role);

        self.token_svc.issue(&user)
    }

    /// 创建管理员账号。用户名已存在时返回 `Ok(false)`。
    pub async fn create_admin(&self, username: &str, email: &str, pwd: &str) -> Result<bool, AppError> {
        if self.user_repo.find_by_username(username).await?.is_some() {
            return Ok(false);
        }
        let hashed_pwd = self.hasher.hash(pwd)?;
        let id = UserId::from(self.id_generator.next_id().await?);
        let admin = User::new(id, username, email, &hashed_pwd, Role::Admin, None, None);
        self.user_repo.save(&admin).await?;
        Ok(true)
    }

    /// Login with username and password, returns a token
    pub async fn login(&self, username: &str, pwd: &str) -> Result<String, AppError> {
        let user = self
            .user_repo
            .find_by_username(username)
            .await?
            .ok_or(AppError::AuthenticationFailure)?;
        self.hasher
            .verify(pwd, &user.password)
            .map_err(|_| AppError::AuthenticationFailure)?;
        self.token_svc.issue(&user)
    }
}
