use std::fmt;
use std::sync::{Arc, Mutex};

use fl_core::{AnalysisStatus, ArticleId, ProgressPublisher, ProgressState, ProgressUpdate, Result};
use tracing::{debug, warn};

/// Publishes the checkpoints of a single run.
pub struct ProgressTracker {
    id: ArticleId,
    publisher: Arc<dyn ProgressPublisher>,
    state: Mutex<ProgressState>,
}

impl fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("id", &self.id)
            .field("publisher", &"<dyn ProgressPublisher>")
            .field("state", &self.snapshot())
            .finish()
    }
}

impl ProgressTracker {
    pub fn new(id: ArticleId, publisher: Arc<dyn ProgressPublisher>) -> Self {
        Self {
            id,
            publisher,
            state: Mutex::new(ProgressState::pending()),
        }
    }

    pub fn snapshot(&self) -> ProgressState {
        match self.state.lock() {
            Ok(state) => state.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn percent(&self) -> f32 {
        self.snapshot().percent
    }

    /// Publishes a checkpoint without changing the status.
    pub async fn checkpoint(&self, percent: f32, message: impl Into<String>) -> Result<()> {
        self.publish(ProgressUpdate::new(percent, message)).await
    }

    pub async fn publish_status(
        &self,
        percent: f32,
        message: impl Into<String>,
        status: AnalysisStatus,
    ) -> Result<()> {
        self.publish(ProgressUpdate::new(percent, message).with_status(status))
            .await
    }

    /// Marks the run failed at the furthest percent reached so far.
    pub async fn fail(&self, message: impl Into<String>) -> Result<()> {
        let percent = self.percent();
        self.publish_status(percent, message, AnalysisStatus::Failed).await
    }

    /// The local state only advances once the publisher has accepted the
    /// update, so a rejected terminal update can still be followed by `fail`.
    async fn publish(&self, update: ProgressUpdate) -> Result<()> {
        let (next, forwarded) = {
            let mut next = self.snapshot();
            if !next.apply(&update) {
                warn!(
                    "Dropping progress for article {} after terminal status {}: {}",
                    self.id, next.status, update.message
                );
                return Ok(());
            }
            if next.percent > update.percent {
                debug!(
                    "Holding progress for article {} at {:.0}% (requested {:.0}%)",
                    self.id, next.percent, update.percent
                );
            }
            let forwarded = ProgressUpdate {
                percent: next.percent,
                message: next.message.clone(),
                status: update.status,
            };
            (next, forwarded)
        };

        self.publisher.publish_progress(self.id, forwarded).await?;
        match self.state.lock() {
            Ok(mut state) => *state = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
        Ok(())
    }
}
