use async_trait::async_trait;
use dashmap::DashMap;
use domain::song::{Song, SongError, SongRepository};
use domain::value::SongId;
use std::sync::Arc;

/// 歌曲目录的内存实现
#[derive(Clone, Default)]
pub struct InMemorySongRepository {
    store: Arc<DashMap<SongId, Song>>,
}

impl InMemorySongRepository {
    pub fn new() -> Self {
        Self {
            store: Arc::new(DashMap::new()),
        }
    }
}

#[async_trait]
impl SongRepository for InMemorySongRepository {
    async fn find_by_id(&self, id: &SongId) -> Result<Option<Song>, SongError> {
        Ok(self.store.get(id).map(|v| v.clone()))
    }

    async fn find_all(&self, title: Option<&str>) -> Result<Vec<Song>, SongError> {
        let needle = title.map(str::to_lowercase);
        let mut songs: Vec<Song> = self
            .store
            .iter()
            .filter(|e| match &needle {
                Some(n) => e.value().meta.title.to_lowercase().contains(n.as_str()),
                None => true,
            })
            .map(|e| e.value().clone())
            .collect();
        songs.sort_by_key(|s| s.id.as_i64());
        Ok(songs)
    }

    async fn save(&self, song: &Song) -> Result<(), SongError> {
        self.store.insert(song.id.clone(), song.clone());
        Ok(())
    }

    async fn delete(&self, id: &SongId) -> Result<Option<Song>, SongError> {
        Ok(self.store.remove(id).map(|(_, song)| song))
    }
}
