use std::sync::Arc;

use async_trait::async_trait;

use crate::progress::{ProgressState, ProgressUpdate};
use crate::types::AnalysisResult;
use crate::Result;

pub type ArticleId = i64;

/// Receives progress checkpoints for a run.
#[async_trait]
pub trait ProgressPublisher: Send + Sync {
    /// Store the update as the latest state of `id`. Unknown ids are a
    /// silent no-op.
    async fn publish_progress(&self, id: ArticleId, update: ProgressUpdate) -> Result<()>;
}

/// Persistence collaborator owning articles, their progress and results.
#[async_trait]
pub trait AnalysisStore: ProgressPublisher {
    /// Register an article; its progress starts at `Pending`.
    async fn register_article(&self, title: &str, body: &str) -> Result<ArticleId>;

    /// Put the progress of `id` back to `Pending` so a new run can start.
    async fn reset_progress(&self, id: ArticleId) -> Result<()>;

    /// Replace the stored analysis of `id`, child collections included.
    async fn store_result(&self, id: ArticleId, result: &AnalysisResult) -> Result<()>;

    async fn progress(&self, id: ArticleId) -> Result<Option<ProgressState>>;

    async fn result(&self, id: ArticleId) -> Result<Option<AnalysisResult>>;
}

/// Exposes an [`AnalysisStore`] through the narrower progress interface.
#[derive(Clone)]
pub struct StorePublisher {
    store: Arc<dyn AnalysisStore>,
}

impl StorePublisher {
    pub fn new(store: Arc<dyn AnalysisStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ProgressPublisher for StorePublisher {
    async fn publish_progress(&self, id: ArticleId, update: ProgressUpdate) -> Result<()> {
        self.store.publish_progress(id, update).await
    }
}
