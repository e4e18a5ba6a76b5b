use crate::value::{SongId, UserId};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

/// 歌曲领域错误
#[derive(Error, Debug)]
pub enum SongError {
    #[error("song not found: {0}")]
    SongNotFound(SongId),
    #[error("Validation error: {0}")]
    ValidationErr(String),
    #[error("{0}")]
    DbErr(String),
}

/// 可编辑的歌曲元数据
#[derive(Debug, Clone, PartialEq)]
pub struct SongMeta {
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub release_date: Option<NaiveDate>,
    /// 秒
    pub duration: Option<i32>,
}

impl SongMeta {
    pub fn validate(&self) -> Result<(), SongError> {
        if self.title.trim().is_empty() {
            return Err(SongError::ValidationErr("title must not be blank".to_string()));
        }
        if self.artist.trim().is_empty() {
            return Err(SongError::ValidationErr("artist must not be blank".to_string()));
        }
        if matches!(self.duration, Some(d) if d < 1) {
            return Err(SongError::ValidationErr("duration must be positive".to_string()));
        }
        Ok(())
    }
}

/// 歌曲聚合根
///
/// 文件本身由上传网关保存，这里只记录它们的公开 URL。
#[derive(Debug, Clone)]
pub struct Song {
    pub id: SongId,
    pub meta: SongMeta,
    pub file_url: String,
    pub cover_url: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Song {
    pub fn new(
        id: SongId,
        meta: SongMeta,
        file_url: &str,
        cover_url: Option<&str>,
    ) -> Result<Self, SongError> {
        meta.validate()?;
        if file_url.trim().is_empty() {
            return Err(SongError::ValidationErr("file url must not be blank".to_string()));
        }
        let now = Utc::now().naive_utc();
        Ok(Self {
            id,
            meta,
            file_url: file_url.to_string(),
            cover_url: cover_url.filter(|u| !u.is_empty()).map(String::from),
            created_at: now,
            updated_at: now,
        })
    }

    /// 只更新元数据，文件 URL 需要单独替换
    pub fn update_meta(&mut self, meta: SongMeta) -> Result<(), SongError> {
        meta.validate()?;
        self.meta = meta;
        self.updated_at = Utc::now().naive_utc();
        Ok(())
    }

    /// 歌曲拥有的全部文件 URL
    pub fn file_urls(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.file_url.as_str()).chain(self.cover_url.as_deref())
    }
}

#[async_trait]
pub trait SongRepository: Send + Sync {
    async fn find_by_id(&self, id: &SongId) -> Result<Option<Song>, SongError>;

    /// 标题包含关键字（忽略大小写）的歌曲，按 id 排序
    async fn find_all(&self, title: Option<&str>) -> Result<Vec<Song>, SongError>;

    async fn save(&self, song: &Song) -> Result<(), SongError>;

    /// 返回被删除的歌曲
    async fn delete(&self, id: &SongId) -> Result<Option<Song>, SongError>;
}

/// 用户喜欢的歌曲集合。同一首歌只记一次。
#[async_trait]
pub trait LikeRepository: Send + Sync {
    async fn add(&self, user: &UserId, song: &SongId) -> Result<(), SongError>;

    async fn remove(&self, user: &UserId, song: &SongId) -> Result<(), SongError>;

    /// 按 id 升序
    async fn song_ids(&self, user: &UserId) -> Result<Vec<SongId>, SongError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(title: &str) -> SongMeta {
        SongMeta {
            title: title.to_string(),
            artist: "Nobody".to_string(),
            album: None,
            release_date: None,
            duration: Some(180),
        }
    }

    #[test]
    fn test_new_song_validates() {
        assert!(Song::new(SongId::from(1), meta(" "), "/uploads/songs/a.mp3", None).is_err());
        assert!(Song::new(SongId::from(1), meta("Intro"), "", None).is_err());

        let mut bad = meta("Intro");
        bad.duration = Some(0);
        assert!(matches!(
            Song::new(SongId::from(1), bad, "/uploads/songs/a.mp3", None),
            Err(SongError::ValidationErr(_))
        ));
    }

    #[test]
    fn test_file_urls() {
        let song = Song::new(
            SongId::from(1),
            meta("Intro"),
            "/uploads/songs/a.mp3",
            Some("/uploads/covers/a.png"),
        )
        .unwrap();
        let urls: Vec<&str> = song.file_urls().collect();
        assert_eq!(urls, vec!["/uploads/songs/a.mp3", "/uploads/covers/a.png"]);

        let bare = Song::new(SongId::from(2), meta("Outro"), "/uploads/songs/b.mp3", Some("")).unwrap();
        assert_eq!(bare.file_urls().count(), 1);
    }
}
