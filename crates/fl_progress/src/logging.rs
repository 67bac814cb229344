use std::sync::Arc;

use async_trait::async_trait;
use fl_core::{AnalysisStatus, ArticleId, ProgressPublisher, ProgressUpdate, Result};
use tracing::{error, info};

/// Logs every checkpoint, then hands it to the wrapped publisher.
pub struct LoggingPublisher {
    inner: Arc<dyn ProgressPublisher>,
}

impl LoggingPublisher {
    pub fn new(inner: Arc<dyn ProgressPublisher>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ProgressPublisher for LoggingPublisher {
    async fn publish_progress(&self, id: ArticleId, update: ProgressUpdate) -> Result<()> {
        match update.status {
            Some(AnalysisStatus::Failed) => {
                error!("❌ [{}] {:>3.0}% {}", id, update.percent, update.message)
            }
            Some(AnalysisStatus::Completed) => {
                info!("✅ [{}] {:>3.0}% {}", id, update.percent, update.message)
            }
            _ => info!("⏳ [{}] {:>3.0}% {}", id, update.percent, update.message),
        }
        self.inner.publish_progress(id, update).await
    }
}
