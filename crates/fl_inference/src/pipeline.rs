use std::fmt;
use std::sync::Arc;

use fl_core::{
    AnalysisResult, AnalysisStatus, AnalysisStore, Article, ArticleId, Error, Metadata,
    ProgressPublisher, Result, StorePublisher,
};
use fl_progress::{LoggingPublisher, ProgressTracker};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::analysis::CredibilityAnalyzer;

/// Entry point used by the surrounding application once per submitted
/// article: validates it, runs the analyzer, persists the result and keeps
/// the stored progress up to date, including on failure.
#[derive(Clone)]
pub struct AnalysisPipeline {
    analyzer: Arc<CredibilityAnalyzer>,
    store: Arc<dyn AnalysisStore>,
    publisher: Arc<dyn ProgressPublisher>,
}

impl fmt::Debug for AnalysisPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisPipeline")
            .field("analyzer", &self.analyzer)
            .field("store", &"<dyn AnalysisStore>")
            .finish()
    }
}

impl AnalysisPipeline {
    pub fn new(analyzer: CredibilityAnalyzer, store: Arc<dyn AnalysisStore>) -> Self {
        let publisher = Arc::new(LoggingPublisher::new(Arc::new(StorePublisher::new(
            store.clone(),
        ))));
        Self {
            analyzer: Arc::new(analyzer),
            store,
            publisher,
        }
    }

    /// Routes progress somewhere other than the store, e.g. to observe it.
    pub fn with_publisher(mut self, publisher: Arc<dyn ProgressPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    /// Runs a full analysis. Running it twice for the same id performs two
    /// complete runs; the second supersedes the first.
    pub async fn run_analysis(
        &self,
        id: ArticleId,
        title: &str,
        body: &str,
    ) -> Result<AnalysisResult> {
        self.run(id, title, body, Metadata::new(), &CancellationToken::new())
            .await
    }

    pub async fn run(
        &self,
        id: ArticleId,
        title: &str,
        body: &str,
        metadata: Metadata,
        cancel: &CancellationToken,
    ) -> Result<AnalysisResult> {
        self.store.reset_progress(id).await?;
        let progress = ProgressTracker::new(id, self.publisher.clone());

        let article = match Article::normalize(title, body, metadata) {
            Ok(article) => article,
            Err(e) => {
                progress
                    .publish_status(0.0, "Empty article body", AnalysisStatus::Failed)
                    .await?;
                return Err(e);
            }
        };

        match self.process(id, &article, &progress, cancel).await {
            Ok(result) => Ok(result),
            Err(e) => {
                error!("Analysis of article {} failed: {}", id, e);
                let message = match &e {
                    Error::Cancelled => "Analysis cancelled".to_string(),
                    other => format!("Analysis failed: {}", other),
                };
                if let Err(publish_err) = progress.fail(message).await {
                    warn!("Could not record failure of article {}: {}", id, publish_err);
                }
                Err(e)
            }
        }
    }

    async fn process(
        &self,
        id: ArticleId,
        article: &Article,
        progress: &ProgressTracker,
        cancel: &CancellationToken,
    ) -> Result<AnalysisResult> {
        info!("📰 Analyzing article {}: {}", id, article.title());
        let result = self.analyzer.analyze(article, progress, cancel).await?;

        self.store.store_result(id, &result).await?;
        progress
            .publish_status(100.0, "Analysis complete", AnalysisStatus::Completed)
            .await?;
        info!(
            "✅ Article {} analyzed: credibility {} with {} claims",
            id,
            result.credibility_score,
            result.claims.len()
        );
        Ok(result)
    }

    /// Starts a run in the background and returns immediately.
    pub fn spawn(
        &self,
        id: ArticleId,
        title: String,
        body: String,
        cancel: CancellationToken,
    ) -> JoinHandle<Result<AnalysisResult>> {
        let pipeline = self.clone();
        tokio::spawn(async move {
            pipeline
                .run(id, &title, &body, Metadata::new(), &cancel)
                .await
        })
    }
}
