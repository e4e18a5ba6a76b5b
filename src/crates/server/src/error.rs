use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use application::error::AppError;
use application::policy::AccessDenied;
use log::{error, warn};
use serde::Serialize;
use thiserror::Error;

/// HTTP 边界上唯一的错误翻译点
#[derive(Error, Debug)]
#[error(transparent)]
pub struct ApiError(#[from] pub AppError);

impl From<AccessDenied> for ApiError {
    fn from(denied: AccessDenied) -> Self {
        let message = denied.to_string();
        ApiError(match denied {
            AccessDenied::Unauthorized => AppError::Unauthorized(message),
            AccessDenied::Forbidden => AppError::Forbidden(message),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ApiError {
    /// 对外的消息。服务端错误只给固定文案，细节写日志。
    fn public_message(&self) -> String {
        match &self.0 {
            AppError::FileOperation { .. } => "File operation failed".to_string(),
            AppError::AuthError(_) | AppError::RepositoryError(_) | AppError::UnknownError(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::AuthenticationFailure | AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::FileOperation { .. }
            | AppError::AuthError(_)
            | AppError::RepositoryError(_)
            | AppError::UnknownError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse<actix_web::body::BoxBody> {
        let status = self.status_code();
        if status.is_server_error() {
            match &self.0 {
                AppError::FileOperation { message, source } => {
                    error!("{}: {}", message, source)
                }
                other => error!("{}", other),
            }
        } else if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            warn!("request denied: {}", self.0);
        }

        HttpResponse::build(status).json(ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.public_message(),
        })
    }
}
