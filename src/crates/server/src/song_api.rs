use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpResponse, Scope};
use application::command::song::SongCmd;
use application::error::AppError;
use application::storage::{FileStorage, UploadedFile};
use chrono::{NaiveDate, NaiveDateTime};
use domain::song::{Song, SongMeta};
use domain::value::{FileCategory, SongId};
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use crate::consts::{MAX_UPLOAD_BYTES, UPLOAD_FIELD};
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SongView {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub duration: Option<i32>,
    pub file_url: String,
    pub cover_url: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<Song> for SongView {
    fn from(song: Song) -> Self {
        Self {
            id: song.id.as_i64().to_string(),
            title: song.meta.title,
            artist: song.meta.artist,
            album: song.meta.album,
            release_date: song.meta.release_date,
            duration: song.meta.duration,
            file_url: song.file_url,
            cover_url: song.cover_url,
            created_at: song.created_at,
            updated_at: song.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongRequest {
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub duration: Option<i32>,
    /// 更新时忽略
    #[serde(default)]
    pub file_url: String,
    pub cover_url: Option<String>,
}

impl SongRequest {
    fn meta(&self) -> SongMeta {
        SongMeta {
            title: self.title.trim().to_string(),
            artist: self.artist.trim().to_string(),
            album: self.album.clone().filter(|a| !a.trim().is_empty()),
            release_date: self.release_date,
            duration: self.duration,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteFileQuery {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteFileResponse {
    pub deleted: bool,
}

pub(crate) fn parse_song_id(raw: &str) -> Result<SongId, AppError> {
    raw.parse::<i64>()
        .map(SongId::from)
        .map_err(|_| AppError::InvalidInput(format!("invalid song id: {}", raw)))
}

pub async fn list_songs(
    state: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    let songs: Vec<SongView> = state
        .song_service()
        .list(query.title.as_deref())
        .await?
        .into_iter()
        .map(SongView::from)
        .collect();
    Ok(HttpResponse::Ok().json(songs))
}

pub async fn get_song(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_song_id(&path)?;
    let song = state.song_service().get(id).await?;
    Ok(HttpResponse::Ok().json(SongView::from(song)))
}

pub async fn create_song(
    state: web::Data<AppState>,
    body: web::Json<SongRequest>,
) -> Result<HttpResponse, ApiError> {
    let cmd = SongCmd {
        meta: body.meta(),
        file_url: body.file_url.trim().to_string(),
        cover_url: body.cover_url.as_deref().map(str::trim).map(String::from),
    };
    let song = state.song_service().create(cmd).await?;
    Ok(HttpResponse::Ok().json(SongView::from(song)))
}

pub async fn update_song(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<SongRequest>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_song_id(&path)?;
    let song = state.song_service().update(id, body.meta()).await?;
    Ok(HttpResponse::Ok().json(SongView::from(song)))
}

pub async fn delete_song(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_song_id(&path)?;
    state.song_service().delete(id).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// 读完一个字段，超过上限直接报错
async fn read_field(field: &mut Field) -> Result<Vec<u8>, AppError> {
    let mut buf = web::BytesMut::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| AppError::InvalidInput(e.to_string()))?;
        if buf.len() + chunk.len() > MAX_UPLOAD_BYTES {
            return Err(AppError::InvalidInput(format!(
                "file exceeds {} bytes",
                MAX_UPLOAD_BYTES
            )));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.to_vec())
}

pub async fn upload_file(
    state: web::Data<AppState>,
    query: web::Query<UploadQuery>,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let category = match query.category.as_deref() {
        Some(raw) => Some(FileCategory::try_from(raw).map_err(AppError::InvalidInput)?),
        None => None,
    };

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| AppError::InvalidInput(e.to_string()))?;
        if field.name() != Some(UPLOAD_FIELD) {
            // 其他字段读掉丢弃
            read_field(&mut field).await?;
            continue;
        }

        let content_type = field.content_type().map(|m| m.to_string());
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);
        let content = read_field(&mut field).await?;

        let url = state
            .storage
            .store(
                category,
                UploadedFile {
                    content: &content,
                    content_type: content_type.as_deref(),
                    original_filename: filename.as_deref(),
                },
            )
            .await?;
        return Ok(HttpResponse::Ok().json(UploadResponse { url }));
    }

    Err(AppError::InvalidInput(format!("missing multipart field '{}'", UPLOAD_FIELD)).into())
}

pub async fn delete_file(
    state: web::Data<AppState>,
    query: web::Query<DeleteFileQuery>,
) -> Result<HttpResponse, ApiError> {
    let deleted = state.storage.delete(&query.url).await;
    Ok(HttpResponse::Ok().json(DeleteFileResponse { deleted }))
}

pub fn configure_service() -> Scope {
    // 上传路由要先于 /{songId} 注册
    web::scope("/api/songs")
        .route("", web::get().to(list_songs))
        .route("", web::post().to(create_song))
        .route("/upload/file", web::post().to(upload_file))
        .route("/upload/file", web::delete().to(delete_file))
        .route("/{songId}", web::get().to(get_song))
        .route("/{songId}", web::put().to(update_song))
        .route("/{songId}", web::delete().to(delete_song))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_song_id() {
        assert_eq!(parse_song_id("42").unwrap(), SongId::from(42));
        assert!(matches!(parse_song_id("abc"), Err(AppError::InvalidInput(_))));
        assert!(parse_song_id("").is_err());
    }

    #[test]
    fn test_request_meta_drops_blank_album() {
        let req: SongRequest = serde_json::from_str(
            r#"{"title":" Intro ","artist":"A","album":" ","releaseDate":"2024-05-01","duration":200}"#,
        )
        .unwrap();
        let meta = req.meta();
        assert_eq!(meta.title, "Intro");
        assert_eq!(meta.album, None);
        assert_eq!(meta.release_date, NaiveDate::from_ymd_opt(2024, 5, 1));
        assert!(req.file_url.is_empty());
    }
}
