use actix_web::{web, HttpResponse, Scope};
use application::command::user::{ChangePasswordCmd, UpdateProfileCmd};
use chrono::NaiveDateTime;
use domain::user::User;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::middleware::Auth;
use crate::song_api::{parse_song_id, SongView};
use crate::AppState;

/// 对外的用户信息，不含密码哈希
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: String,
    pub company_name: Option<String>,
    pub company_address: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id.as_i64().to_string(),
            username: user.username,
            email: user.email,
            role: user.role.name().to_string(),
            company_name: user.company_name,
            company_address: user.company_address,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub email: String,
    pub company_name: Option<String>,
    pub company_address: Option<String>,
}

pub async fn me(state: web::Data<AppState>, Auth(ctx): Auth) -> Result<HttpResponse, ApiError> {
    let user = state.user_service().me(&ctx)?;
    Ok(HttpResponse::Ok().json(UserView::from(user)))
}

pub async fn list_users(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let users: Vec<UserView> = state
        .user_service()
        .list_users()
        .await?
        .into_iter()
        .map(UserView::from)
        .collect();
    Ok(HttpResponse::Ok().json(users))
}

pub async fn update_profile(
    state: web::Data<AppState>,
    Auth(ctx): Auth,
    body: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    let cmd = UpdateProfileCmd {
        email: body.email,
        company_name: body.company_name,
        company_address: body.company_address,
    };
    let user = state.user_service().update_profile(&ctx, cmd).await?;
    Ok(HttpResponse::Ok().json(UserView::from(user)))
}

pub async fn change_password(
    state: web::Data<AppState>,
    Auth(ctx): Auth,
    body: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    let cmd = ChangePasswordCmd {
        old_password: body.old_password,
        new_password: body.new_password,
    };
    state.user_service().change_password(&ctx, cmd).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn like_song(
    state: web::Data<AppState>,
    Auth(ctx): Auth,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_song_id(&path)?;
    state.like_service().like(&ctx, id).await?;
    Ok(HttpResponse::Ok().finish())
}

pub async fn unlike_song(
    state: web::Data<AppState>,
    Auth(ctx): Auth,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_song_id(&path)?;
    state.like_service().unlike(&ctx, id).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn liked_songs(
    state: web::Data<AppState>,
    Auth(ctx): Auth,
) -> Result<HttpResponse, ApiError> {
    let songs: Vec<SongView> = state
        .like_service()
        .liked_songs(&ctx)
        .await?
        .into_iter()
        .map(SongView::from)
        .collect();
    Ok(HttpResponse::Ok().json(songs))
}

pub fn configure_service() -> Scope {
    web::scope("/api/user")
        .route("", web::put().to(update_profile))
        .route("/me", web::get().to(me))
        .route("/all", web::get().to(list_users))
        .route("/change-password", web::put().to(change_password))
        .route("/likes", web::get().to(liked_songs))
        .route("/likes/{songId}", web::post().to(like_song))
        .route("/likes/{songId}", web::delete().to(unlike_song))
}
