use std::collections::HashMap;

use async_trait::async_trait;
use fl_core::{
    AnalysisResult, AnalysisStore, ArticleId, ProgressPublisher, ProgressState, ProgressUpdate,
    Result,
};
use tokio::sync::RwLock;
use tracing::debug;

use crate::StorageBackend;

#[derive(Debug, Clone)]
struct ArticleRecord {
    title: String,
    body: String,
    progress: ProgressState,
    result: Option<AnalysisResult>,
}

#[derive(Debug, Default)]
struct MemoryStore {
    next_id: ArticleId,
    articles: HashMap<ArticleId, ArticleRecord>,
}

/// Process-local store. Each operation takes the lock once, so a stored
/// result is never observed half-written.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    store: RwLock<MemoryStore>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn article(&self, id: ArticleId) -> Option<(String, String)> {
        let store = self.store.read().await;
        store
            .articles
            .get(&id)
            .map(|record| (record.title.clone(), record.body.clone()))
    }

    pub async fn delete_article(&self, id: ArticleId) -> bool {
        self.store.write().await.articles.remove(&id).is_some()
    }
}

/// Prepares a result for storage: tags lower-cased, coordinates kept from
/// the previous result when the new one has none.
pub(crate) fn normalize_for_storage(
    result: &AnalysisResult,
    previous: Option<&AnalysisResult>,
) -> AnalysisResult {
    let mut stored = result.clone();
    stored.tags = result.tags.iter().map(|tag| tag.to_lowercase()).collect();
    if stored.latitude.is_none() {
        stored.latitude = previous.and_then(|p| p.latitude);
    }
    if stored.longitude.is_none() {
        stored.longitude = previous.and_then(|p| p.longitude);
    }
    stored
}

#[async_trait]
impl StorageBackend for InMemoryStorage {
    async fn new() -> Result<Self> {
        Ok(Self::default())
    }
}

#[async_trait]
impl ProgressPublisher for InMemoryStorage {
    async fn publish_progress(&self, id: ArticleId, update: ProgressUpdate) -> Result<()> {
        let mut store = self.store.write().await;
        match store.articles.get_mut(&id) {
            Some(record) => {
                if !record.progress.apply(&update) {
                    debug!("Ignoring progress for finished article {}", id);
                }
            }
            None => debug!("Ignoring progress for unknown article {}", id),
        }
        Ok(())
    }
}

#[async_trait]
impl AnalysisStore for InMemoryStorage {
    async fn register_article(&self, title: &str, body: &str) -> Result<ArticleId> {
        let mut store = self.store.write().await;
        store.next_id += 1;
        let id = store.next_id;
        store.articles.insert(
            id,
            ArticleRecord {
                title: title.to_string(),
                body: body.to_string(),
                progress: ProgressState::pending(),
                result: None,
            },
        );
        Ok(id)
    }

    async fn reset_progress(&self, id: ArticleId) -> Result<()> {
        if let Some(record) = self.store.write().await.articles.get_mut(&id) {
            record.progress = ProgressState::pending();
        }
        Ok(())
    }

    async fn store_result(&self, id: ArticleId, result: &AnalysisResult) -> Result<()> {
        let mut store = self.store.write().await;
        if let Some(record) = store.articles.get_mut(&id) {
            record.result = Some(normalize_for_storage(result, record.result.as_ref()));
        } else {
            debug!("Dropping result for unknown article {}", id);
        }
        Ok(())
    }

    async fn progress(&self, id: ArticleId) -> Result<Option<ProgressState>> {
        let store = self.store.read().await;
        Ok(store.articles.get(&id).map(|record| record.progress.clone()))
    }

    async fn result(&self, id: ArticleId) -> Result<Option<AnalysisResult>> {
        let store = self.store.read().await;
        Ok(store.articles.get(&id).and_then(|record| record.result.clone()))
    }
}
