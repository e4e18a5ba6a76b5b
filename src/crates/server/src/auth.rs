use actix_web::{web, HttpRequest, HttpResponse, Scope};
use application::auth::RegisterCmd;
use application::error::AppError;
use domain::user::Role;
use infra::config::RateLimitConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::consts::{X_FORWARDED_FOR, X_REAL_IP};
use crate::error::ApiError;
use crate::AppState;

/// Rate limiter for login attempts by IP
pub struct RateLimiter {
    attempts: HashMap<String, Vec<Instant>>,
    max_attempts: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(cfg: RateLimitConfig) -> Self {
        Self {
            attempts: HashMap::new(),
            max_attempts: cfg.max_attempts,
            window: cfg.window,
        }
    }

    pub fn is_allowed(&mut self, ip: &str) -> bool {
        let now = Instant::now();
        let window = self.window;

        // 窗口外的记录顺便清掉，避免表无限增长
        self.attempts.retain(|key, attempts| {
            attempts.retain(|t| now.duration_since(*t) < window);
            key == ip || !attempts.is_empty()
        });

        let attempts = self.attempts.entry(ip.to_string()).or_default();
        if attempts.len() >= self.max_attempts {
            false
        } else {
            attempts.push(now);
            true
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    /// USER / COMPANY，缺省为 USER
    pub role: Option<String>,
    pub company_name: Option<String>,
    pub company_address: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

pub(crate) fn get_client_ip(req: &HttpRequest) -> String {
    // Try X-Forwarded-For header first (for reverse proxy)
    if let Some(forwarded) = req.headers().get(X_FORWARDED_FOR) {
        if let Ok(s) = forwarded.to_str() {
            if let Some(ip) = s.split(',').next().map(str::trim).filter(|ip| !ip.is_empty()) {
                return ip.to_string();
            }
        }
    }

    if let Some(real_ip) = req.headers().get(X_REAL_IP) {
        if let Ok(s) = real_ip.to_str() {
            return s.trim().to_string();
        }
    }

    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    let role = match body.role.as_deref().map(str::trim) {
        None | Some("") => Role::User,
        Some(name) => name.to_ascii_uppercase().parse::<Role>().map_err(AppError::from)?,
    };

    let cmd = RegisterCmd {
        username: body.username,
        password: body.password,
        email: body.email,
        role,
        company_name: body.company_name.filter(|s| !s.trim().is_empty()),
        company_address: body.company_address.filter(|s| !s.trim().is_empty()),
    };
    let token = state.auth_service().register(cmd).await?;
    Ok(HttpResponse::Ok().json(TokenResponse { token }))
}

pub async fn login(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let client_ip = get_client_ip(&req);

    // Check rate limit
    if !state.login_limiter.lock().is_allowed(&client_ip) {
        log::warn!("login rate limit exceeded for {}", client_ip);
        return Err(AppError::TooManyRequests(
            "Too many login attempts. Please try again later.".to_string(),
        )
        .into());
    }

    let token = state
        .auth_service()
        .login(&body.username, &body.password)
        .await?;
    Ok(HttpResponse::Ok().json(TokenResponse { token }))
}

pub fn configure_service() -> Scope {
    web::scope("/api/auth")
        .route("/register", web::post().to(register))
        .route("/login", web::post().to(login))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    fn limiter(max_attempts: usize) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            max_attempts,
            window: Duration::from_secs(60),
        })
    }

    #[test]
    fn test_rate_limiter_per_ip() {
        let mut limiter = limiter(2);
        assert!(limiter.is_allowed("10.0.0.1"));
        assert!(limiter.is_allowed("10.0.0.1"));
        assert!(!limiter.is_allowed("10.0.0.1"));
        assert!(limiter.is_allowed("10.0.0.2"));
    }

    #[test]
    fn test_rate_limiter_window_expires() {
        let mut limiter = RateLimiter::new(RateLimitConfig {
            max_attempts: 1,
            window: Duration::from_millis(20),
        });
        assert!(limiter.is_allowed("ip"));
        assert!(!limiter.is_allowed("ip"));
        std::thread::sleep(Duration::from_millis(30));
        assert!(limiter.is_allowed("ip"));
    }

    #[test]
    fn test_client_ip_order() {
        let req = TestRequest::default()
            .insert_header((X_FORWARDED_FOR, "1.1.1.1, 2.2.2.2"))
            .insert_header((X_REAL_IP, "3.3.3.3"))
            .to_http_request();
        assert_eq!(get_client_ip(&req), "1.1.1.1");

        let req = TestRequest::default()
            .insert_header((X_REAL_IP, "3.3.3.3"))
            .to_http_request();
        assert_eq!(get_client_ip(&req), "3.3.3.3");

        let req = TestRequest::default()
            .peer_addr("4.4.4.4:5000".parse().unwrap())
            .to_http_request();
        assert_eq!(get_client_ip(&req), "4.4.4.4");
    }
}
