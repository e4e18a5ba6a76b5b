use crate::context::AuthorizationContext;
use crate::error::AppError;
use domain::song::{LikeRepository, Song, SongRepository};
use domain::user::User;
use domain::value::SongId;
use std::sync::Arc;

/// 当前用户的“喜欢”列表
pub struct LikeAppService {
    like_repo: Arc<dyn LikeRepository>,
    song_repo: Arc<dyn SongRepository>,
}

impl LikeAppService {
    pub fn new(like_repo: Arc<dyn LikeRepository>, song_repo: Arc<dyn SongRepository>) -> Self {
        Self {
            like_repo,
            song_repo,
        }
    }

    fn current_user(ctx: &AuthorizationContext) -> Result<&User, AppError> {
        ctx.user()
            .ok_or_else(|| AppError::Unauthorized("authentication required".to_string()))
    }

    async fn existing_song(&self, id: &SongId) -> Result<Song, AppError> {
        self.song_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Song", id))
    }

    pub async fn like(&self, ctx: &AuthorizationContext, song_id: SongId) -> Result<(), AppError> {
        let user = Self::current_user(ctx)?;
        self.existing_song(&song_id).await?;
        self.like_repo.add(&user.id, &song_id).await?;
        log::debug!("{} likes song {}", user.username, song_id);
        Ok(())
    }

    pub async fn unlike(&self, ctx: &AuthorizationContext, song_id: SongId) -> Result<(), AppError> {
        let user = Self::current_user(ctx)?;
        self.existing_song(&song_id).await?;
        self.like_repo.remove(&user.id, &song_id).await?;
        Ok(())
    }

    /// 已被删除的歌曲直接跳过
    pub async fn liked_songs(&self, ctx: &AuthorizationContext) -> Result<Vec<Song>, AppError> {
        let user = Self::current_user(ctx)?;
        let mut songs = Vec::new();
        for id in self.like_repo.song_ids(&user.id).await? {
            if let Some(song) = self.song_repo.find_by_id(&id).await? {
                songs.push(song);
            }
        }
        Ok(songs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::song::tests::MemSongRepo;
    use async_trait::async_trait;
    use domain::song::{SongError, SongMeta};
    use domain::user::Role;
    use domain::value::UserId;
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemLikeRepo(Mutex<BTreeSet<(i64, i64)>>);

    #[async_trait]
    impl LikeRepository for MemLikeRepo {
        async fn add(&self, user: &UserId, song: &SongId) -> Result<(), SongError> {
            self.0.lock().unwrap().insert((user.as_i64(), song.as_i64()));
            Ok(())
        }

        async fn remove(&self, user: &UserId, song: &SongId) -> Result<(), SongError> {
            self.0.lock().unwrap().remove(&(user.as_i64(), song.as_i64()));
            Ok(())
        }

        async fn song_ids(&self, user: &UserId) -> Result<Vec<SongId>, SongError> {
            Ok(self
                .0
                .lock()
                .unwrap()
                .iter()
                .filter(|(u, _)| *u == user.as_i64())
                .map(|(_, s)| SongId::from(*s))
                .collect())
        }
    }

    fn song(id: i64, title: &str) -> Song {
        let meta = SongMeta {
            title: title.to_string(),
            artist: "Band".to_string(),
            album: None,
            release_date: None,
            duration: None,
        };
        Song::new(SongId::from(id), meta, "/uploads/songs/a.mp3", None).unwrap()
    }

    fn ctx(id: i64) -> AuthorizationContext {
        AuthorizationContext::authenticated(User::new(
            UserId::from(id),
            "alice",
            "alice@example.com",
            "hash",
            Role::User,
            None,
            None,
        ))
    }

    async fn service() -> (LikeAppService, Arc<MemSongRepo>) {
        let songs = Arc::new(MemSongRepo::default());
        songs.save(&song(1, "Morning")).await.unwrap();
        songs.save(&song(2, "Evening")).await.unwrap();
        let svc = LikeAppService::new(Arc::new(MemLikeRepo::default()), songs.clone());
        (svc, songs)
    }

    #[tokio::test]
    async fn test_like_and_unlike() {
        let (svc, _) = service().await;
        let alice = ctx(7);

        svc.like(&alice, SongId::from(2)).await.unwrap();
        svc.like(&alice, SongId::from(1)).await.unwrap();
        svc.like(&alice, SongId::from(1)).await.unwrap();
        let titles: Vec<String> = svc
            .liked_songs(&alice)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.meta.title)
            .collect();
        assert_eq!(titles, vec!["Morning", "Evening"]);

        svc.unlike(&alice, SongId::from(1)).await.unwrap();
        assert_eq!(svc.liked_songs(&alice).await.unwrap().len(), 1);
        assert!(svc.liked_songs(&ctx(8)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_song_is_not_found() {
        let (svc, _) = service().await;
        let alice = ctx(7);
        assert!(matches!(
            svc.like(&alice, SongId::from(99)).await,
            Err(AppError::NotFound { kind: "Song", .. })
        ));
        assert!(matches!(
            svc.unlike(&alice, SongId::from(99)).await,
            Err(AppError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_deleted_song_drops_out_of_likes() {
        let (svc, songs) = service().await;
        let alice = ctx(7);
        svc.like(&alice, SongId::from(1)).await.unwrap();
        svc.like(&alice, SongId::from(2)).await.unwrap();

        songs.delete(&SongId::from(1)).await.unwrap();
        let liked = svc.liked_songs(&alice).await.unwrap();
        assert_eq!(liked.len(), 1);
        assert_eq!(liked[0].id, SongId::from(2));
    }

    #[tokio::test]
    async fn test_anonymous_cannot_like() {
        let (svc, _) = service().await;
        let res = svc
            .like(&AuthorizationContext::anonymous(), SongId::from(1))
            .await;
        assert!(matches!(res, Err(AppError::Unauthorized(_))));
    }
}
