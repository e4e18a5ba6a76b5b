use async_trait::async_trait;
use dashmap::DashMap;
use domain::song::{LikeRepository, SongError};
use domain::value::{SongId, UserId};
use std::collections::BTreeSet;
use std::sync::Arc;

/// 用户 -> 喜欢的歌曲 id
#[derive(Clone, Default)]
pub struct InMemoryLikeRepository {
    store: Arc<DashMap<UserId, BTreeSet<i64>>>,
}

impl InMemoryLikeRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LikeRepository for InMemoryLikeRepository {
    async fn add(&self, user: &UserId, song: &SongId) -> Result<(), SongError> {
        self.store
            .entry(user.clone())
            .or_default()
            .insert(song.as_i64());
        Ok(())
    }

    async fn remove(&self, user: &UserId, song: &SongId) -> Result<(), SongError> {
        if let Some(mut liked) = self.store.get_mut(user) {
            liked.remove(&song.as_i64());
        }
        Ok(())
    }

    async fn song_ids(&self, user: &UserId) -> Result<Vec<SongId>, SongError> {
        Ok(self
            .store
            .get(user)
            .map(|liked| liked.iter().copied().map(SongId::from).collect())
            .unwrap_or_default())
    }
}
