use domain::song::SongError;
use domain::user::UserError;
use thiserror::Error;

/// 应用层错误
///
/// 所有类型化的失败都在这里区分，只在 server 的单一边界处翻译成状态码和 `{error, message}` 响应体。
/// 令牌校验失败不在此列：它们在安全管道内被吸收为匿名上下文。
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 登录凭据错误，不区分是用户名还是密码错误
    #[error("Bad credentials")]
    AuthenticationFailure,

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("{0}")]
    Conflict(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("{message}")]
    FileOperation {
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Too many requests: {0}")]
    TooManyRequests(String),

    #[error("Auth error: {0}")]
    AuthError(String),

    #[error("Repository error: {0}")]
    RepositoryError(String),

    #[error("Unknown error: {0}")]
    UnknownError(String),
}

impl AppError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        AppError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn file_operation(message: impl Into<String>, source: std::io::Error) -> Self {
        AppError::FileOperation {
            message: message.into(),
            source,
        }
    }
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::UserNotFound(username) => AppError::not_found("User", username),
            UserError::UsernameTaken(_) | UserError::EmailTaken(_) => {
                AppError::Conflict(err.to_string())
            }
            UserError::InvalidRole(_) => AppError::InvalidInput(err.to_string()),
            UserError::DbErr(msg) | UserError::OtherErr(msg) => AppError::RepositoryError(msg),
        }
    }
}

impl From<SongError> for AppError {
    fn from(err: SongError) -> Self {
        match err {
            SongError::SongNotFound(id) => AppError::not_found("Song", id),
            SongError::ValidationErr(msg) => AppError::InvalidInput(msg),
            SongError::DbErr(msg) => AppError::RepositoryError(msg),
        }
    }
}
