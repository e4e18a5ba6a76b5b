use super::value::UserId;
use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 用户领域错误
///
/// 用户领域中可能发生的所有错误类型。
#[derive(Error, Debug)]
pub enum UserError {
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("username already taken: {0}")]
    UsernameTaken(String),
    #[error("email already registered: {0}")]
    EmailTaken(String),
    #[error("invalid role: {0}")]
    InvalidRole(String),
    #[error("{0}")]
    DbErr(String),
    #[error("{0}")]
    OtherErr(String),
}

/// 用户角色
///
/// 角色在注册时确定，之后在认证核心的范围内不可变。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Admin,
    Company,
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
            Role::Company => "COMPANY",
        }
    }

    /// Granted authority string, e.g. `ROLE_ADMIN`.
    pub fn authority(&self) -> String {
        format!("ROLE_{}", self.name())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Role {
    type Err = UserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Role::User),
            "ADMIN" => Ok(Role::Admin),
            "COMPANY" => Ok(Role::Company),
            other => Err(UserError::InvalidRole(other.to_string())),
        }
    }
}

/// 用户聚合根
///
/// 代表有权访问系统的个体。由持久化协作者拥有，认证核心只通过用户名查找它。
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,                          // 用户唯一标识符
    pub username: String,                    // 用户登录名，唯一
    pub email: String,                       // 用户电子邮件地址，唯一
    pub password: String,                    // 加密后的密码 (bcrypt)
    pub role: Role,                          // 用户角色
    pub company_name: Option<String>,        // 公司用户字段
    pub company_address: Option<String>,     // 公司用户字段
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl User {
    pub fn new(
        id: UserId,
        username: &str,
        email: &str,
        hashed_password: &str,
        role: Role,
        company_name: Option<&str>,
        company_address: Option<&str>,
    ) -> Self {
        let now = Local::now().naive_utc();
        User {
            id,
            username: String::from(username),
            email: String::from(email),
            password: String::from(hashed_password),
            role,
            company_name: company_name.map(String::from),
            company_address: company_address.map(String::from),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn change_password(&mut self, new_hashed_password: &str) -> &mut Self {
        self.password = String::from(new_hashed_password);
        self.updated_at = Local::now().naive_utc();
        self
    }

    /// 更新资料。用户名和角色不可修改。
    pub fn update_profile(
        &mut self,
        email: &str,
        company_name: Option<&str>,
        company_address: Option<&str>,
    ) -> &mut Self {
        self.email = String::from(email);
        self.company_name = company_name.map(String::from);
        self.company_address = company_address.map(String::from);
        self.updated_at = Local::now().naive_utc();
        self
    }

    pub fn authorities(&self) -> Vec<String> {
        vec![self.role.authority()]
    }
}

/// 用户仓储接口
///
/// 由基础设施层实现。认证管道每个请求都会调用一次 `find_by_username`，
/// 因此它必须是无副作用的单次读取。
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// 根据用户名查找用户，不存在时返回 `Ok(None)`
    async fn find_by_username<'a>(&'a self, username: &'a str) -> Result<Option<User>, UserError>;

    async fn find_by_email<'a>(&'a self, email: &'a str) -> Result<Option<User>, UserError>;

    async fn find_all(&self) -> Result<Vec<User>, UserError>;

    /// 保存用户（创建或更新）
    async fn save<'a>(&'a self, user: &User) -> Result<(), UserError>;
}
