use crate::command::shared::IdGenerator;
use crate::error::AppError;
use crate::storage::FileStorage;
use domain::song::{Song, SongMeta, SongRepository};
use domain::value::SongId;
use log::{info, warn};
use std::sync::Arc;

/// 创建/更新歌曲命令。文件需先通过上传接口拿到 URL。
#[derive(Debug, Clone)]
pub struct SongCmd {
    pub meta: SongMeta,
    pub file_url: String,
    pub cover_url: Option<String>,
}

pub struct SongAppService {
    song_repo: Arc<dyn SongRepository>,
    storage: Arc<dyn FileStorage>,
    id_generator: Arc<dyn IdGenerator>,
}

impl SongAppService {
    pub fn new(
        song_repo: Arc<dyn SongRepository>,
        storage: Arc<dyn FileStorage>,
        id_generator: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            song_repo,
            storage,
            id_generator,
        }
    }

    pub async fn create(&self, cmd: SongCmd) -> Result<Song, AppError> {
        // 只接受本网关签发的 URL
        if self.storage.resolve(&cmd.file_url).is_none() {
            return Err(AppError::InvalidInput(format!(
                "file url is not a stored file: {}",
                cmd.file_url
            )));
        }
        if let Some(cover) = cmd.cover_url.as_deref().filter(|u| !u.is_empty()) {
            if self.storage.resolve(cover).is_none() {
                return Err(AppError::InvalidInput(format!(
                    "cover url is not a stored file: {}",
                    cover
                )));
            }
        }

        let id = SongId::from(self.id_generator.next_id().await?);
        let song = Song::new(id, cmd.meta, &cmd.file_url, cmd.cover_url.as_deref())?;
        self.song_repo.save(&song).await?;
        info!("created song {} ({})", song.id, song.meta.title);
        Ok(song)
    }

    pub async fn update(&self, id: SongId, meta: SongMeta) -> Result<Song, AppError> {
        let mut song = self.get(id).await?;
        song.update_meta(meta)?;
        self.song_repo.save(&song).await?;
        Ok(song)
    }

    pub async fn get(&self, id: SongId) -> Result<Song, AppError> {
        self.song_repo
            .find_by_id(&id)
            .await?
            .ok_or_else(|| AppError::not_found("Song", id))
    }

    pub async fn list(&self, title: Option<&str>) -> Result<Vec<Song>, AppError> {
        let title = title.map(str::trim).filter(|t| !t.is_empty());
        Ok(self.song_repo.find_all(title).await?)
    }

    /// 删除记录后顺带删除它的文件；文件删不掉只记日志
    pub async fn delete(&self, id: SongId) -> Result<(), AppError> {
        let song = self
            .song_repo
            .delete(&id)
            .await?
            .ok_or_else(|| AppError::not_found("Song", &id))?;
        for url in song.file_urls() {
            if !self.storage.delete(url).await {
                warn!("song {} deleted but its file {} was not", id, url);
            }
        }
        info!("deleted song {}", id);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::tests::SeqIds;
    use crate::storage::UploadedFile;
    use async_trait::async_trait;
    use domain::song::SongError;
    use domain::value::FileCategory;
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicI64;
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct MemSongRepo(Mutex<BTreeMap<i64, Song>>);

    #[async_trait]
    impl SongRepository for MemSongRepo {
        async fn find_by_id(&self, id: &SongId) -> Result<Option<Song>, SongError> {
            Ok(self.0.lock().unwrap().get(&id.as_i64()).cloned())
        }

        async fn find_all(&self, title: Option<&str>) -> Result<Vec<Song>, SongError> {
            let needle = title.map(str::to_lowercase);
            Ok(self
                .0
                .lock()
                .unwrap()
                .values()
                .filter(|s| match &needle {
                    Some(n) => s.meta.title.to_lowercase().contains(n),
                    None => true,
                })
                .cloned()
                .collect())
        }

        async fn save(&self, song: &Song) -> Result<(), SongError> {
            self.0.lock().unwrap().insert(song.id.as_i64(), song.clone());
            Ok(())
        }

        async fn delete(&self, id: &SongId) -> Result<Option<Song>, SongError> {
            Ok(self.0.lock().unwrap().remove(&id.as_i64()))
        }
    }

    /// Accepts any `/uploads/...` url and records deletions.
    #[derive(Default)]
    struct RecordingStorage {
        deleted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl FileStorage for RecordingStorage {
        async fn store(
            &self,
            _category: Option<FileCategory>,
            _file: UploadedFile<'_>,
        ) -> Result<String, AppError> {
            Ok("/uploads/songs/x.mp3".to_string())
        }

        fn resolve(&self, public_url: &str) -> Option<PathBuf> {
            public_url
                .strip_prefix("/uploads/")
                .map(|rest| PathBuf::from("/srv").join(rest))
        }

        async fn delete(&self, public_url: &str) -> bool {
            self.deleted.lock().unwrap().push(public_url.to_string());
            true
        }
    }

    fn meta(title: &str) -> SongMeta {
        SongMeta {
            title: title.to_string(),
            artist: "Band".to_string(),
            album: Some("LP".to_string()),
            release_date: None,
            duration: Some(200),
        }
    }

    fn service() -> (SongAppService, Arc<RecordingStorage>) {
        let storage = Arc::new(RecordingStorage::default());
        let svc = SongAppService::new(
            Arc::new(MemSongRepo::default()),
            storage.clone(),
            Arc::new(SeqIds(AtomicI64::new(1))),
        );
        (svc, storage)
    }

    fn cmd(title: &str) -> SongCmd {
        SongCmd {
            meta: meta(title),
            file_url: "/uploads/songs/a.mp3".to_string(),
            cover_url: Some("/uploads/covers/a.png".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_update_list() {
        let (svc, _) = service();
        let song = svc.create(cmd("Morning")).await.unwrap();
        svc.create(cmd("Evening")).await.unwrap();

        let updated = svc.update(song.id.clone(), meta("Good Morning")).await.unwrap();
        assert_eq!(updated.meta.title, "Good Morning");
        assert_eq!(updated.file_url, "/uploads/songs/a.mp3");

        assert_eq!(svc.list(None).await.unwrap().len(), 2);
        let found = svc.list(Some("morn")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, song.id);
        assert_eq!(svc.list(Some("  ")).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_create_rejects_foreign_urls() {
        let (svc, _) = service();
        let mut bad = cmd("x");
        bad.file_url = "http://elsewhere/a.mp3".to_string();
        assert!(matches!(svc.create(bad).await, Err(AppError::InvalidInput(_))));

        let mut bad = cmd("x");
        bad.cover_url = Some("/etc/passwd".to_string());
        assert!(matches!(svc.create(bad).await, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_delete_removes_files() {
        let (svc, storage) = service();
        let song = svc.create(cmd("Gone")).await.unwrap();
        svc.delete(song.id.clone()).await.unwrap();

        assert_eq!(
            *storage.deleted.lock().unwrap(),
            vec!["/uploads/songs/a.mp3", "/uploads/covers/a.png"]
        );
        assert!(matches!(
            svc.get(song.id.clone()).await,
            Err(AppError::NotFound { kind: "Song", .. })
        ));
        assert!(matches!(
            svc.delete(song.id).await,
            Err(AppError::NotFound { .. })
        ));
    }
}
