//! Publishers for tests and dry runs.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fl_core::{ArticleId, ProgressPublisher, ProgressUpdate, Result};

/// Captures every update it receives, optionally forwarding to another
/// publisher.
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<(ArticleId, ProgressUpdate)>>,
    inner: Option<Arc<dyn ProgressPublisher>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forwarding(inner: Arc<dyn ProgressPublisher>) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            inner: Some(inner),
        }
    }

    pub fn events(&self) -> Vec<(ArticleId, ProgressUpdate)> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn events_for(&self, id: ArticleId) -> Vec<ProgressUpdate> {
        self.events()
            .into_iter()
            .filter(|(event_id, _)| *event_id == id)
            .map(|(_, update)| update)
            .collect()
    }
}

#[async_trait]
impl ProgressPublisher for RecordingPublisher {
    async fn publish_progress(&self, id: ArticleId, update: ProgressUpdate) -> Result<()> {
        match self.events.lock() {
            Ok(mut events) => events.push((id, update.clone())),
            Err(poisoned) => poisoned.into_inner().push((id, update.clone())),
        }
        if let Some(inner) = &self.inner {
            inner.publish_progress(id, update).await?;
        }
        Ok(())
    }
}
