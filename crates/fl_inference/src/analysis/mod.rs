use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use fl_core::{
    AnalysisResult, AnalysisStatus, Article, Conversation, ConversationTurn, DeepResult,
    InferenceRequest, InferenceService, LiteResult, ResponseFormat, Result, WebSearch,
};
use fl_progress::ProgressTracker;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::call::guarded;
use crate::parser::parse_or;
use crate::tool_loop::{ToolLoop, ToolLoopConfig};
use crate::InferenceConfig;

pub mod prompts;

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub lite_model: String,
    pub deep_model: String,
    pub call_timeout: Option<Duration>,
    pub max_round_trips: usize,
    pub default_search_results: u32,
}

impl AnalyzerConfig {
    pub fn from_inference_config(config: &InferenceConfig) -> Self {
        Self {
            lite_model: config.lite_model.clone(),
            deep_model: config.deep_model.clone(),
            call_timeout: Some(config.request_timeout),
            max_round_trips: config.max_round_trips,
            default_search_results: config.default_search_results,
        }
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self::from_inference_config(&InferenceConfig::default())
    }
}

/// Runs the summary pass and the tool-augmented assessment pass for an
/// article and merges them. Remote failures are returned untouched; the
/// caller owns failure bookkeeping.
pub struct CredibilityAnalyzer {
    inference: Arc<dyn InferenceService>,
    tool_loop: ToolLoop,
    config: AnalyzerConfig,
}

impl fmt::Debug for CredibilityAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredibilityAnalyzer")
            .field("inference", &self.inference.name())
            .field("config", &self.config)
            .finish()
    }
}

impl CredibilityAnalyzer {
    pub fn new(
        inference: Arc<dyn InferenceService>,
        search: Arc<dyn WebSearch>,
        config: AnalyzerConfig,
    ) -> Self {
        let tool_loop = ToolLoop::new(
            inference.clone(),
            search,
            ToolLoopConfig {
                model: config.deep_model.clone(),
                max_round_trips: config.max_round_trips,
                call_timeout: config.call_timeout,
                default_search_results: config.default_search_results,
            },
        );
        Self {
            inference,
            tool_loop,
            config,
        }
    }

    pub async fn analyze(
        &self,
        article: &Article,
        progress: &ProgressTracker,
        cancel: &CancellationToken,
    ) -> Result<AnalysisResult> {
        progress
            .publish_status(5.0, "Init", AnalysisStatus::Processing)
            .await?;

        let lite = self.lite_transform(article, progress, cancel).await?;
        progress.checkpoint(40.0, "Lite analysis complete").await?;

        let deep = self.deep_analysis(article, &lite, progress, cancel).await?;
        progress.checkpoint(95.0, "Merging data").await?;

        Ok(AnalysisResult::merge(lite, deep))
    }

    async fn lite_transform(
        &self,
        article: &Article,
        progress: &ProgressTracker,
        cancel: &CancellationToken,
    ) -> Result<LiteResult> {
        progress.checkpoint(10.0, "Lite transform started").await?;
        info!("🤖 Simplifying article: {}", article.title());

        let mut conversation = Conversation::new();
        conversation.push(ConversationTurn::user([
            prompts::LITE_INSTRUCTIONS.to_string(),
            serde_json::to_string(&article.to_payload())?,
        ]));
        let request = InferenceRequest {
            model: self.config.lite_model.clone(),
            conversation,
            response_format: ResponseFormat { json_only: true },
            tools: Vec::new(),
        };
        let response = guarded(
            "lite inference",
            self.config.call_timeout,
            cancel,
            self.inference.generate(&request),
        )
        .await?;

        progress.checkpoint(30.0, "Lite transform response received").await?;
        Ok(parse_or(&response.text, LiteResult::default()))
    }

    async fn deep_analysis(
        &self,
        article: &Article,
        lite: &LiteResult,
        progress: &ProgressTracker,
        cancel: &CancellationToken,
    ) -> Result<DeepResult> {
        progress.checkpoint(45.0, "Deep analysis started").await?;
        info!("🔬 Assessing credibility: {}", article.title());

        let payload = json!({ "article": article.to_payload(), "lite": lite });
        let mut conversation = Conversation::new();
        conversation.push(ConversationTurn::user([
            prompts::DEEP_INSTRUCTIONS.to_string(),
            serde_json::to_string(&payload)?,
        ]));

        let outcome = self.tool_loop.run(conversation, progress, cancel).await?;
        if outcome.is_exhausted() {
            warn!(
                "Deep analysis stopped after {} round-trips; parsing partial output",
                outcome.round_trips
            );
        }
        info!(
            "✨ Deep analysis finished after {} round-trips and {} searches",
            outcome.round_trips, outcome.searches
        );

        progress.checkpoint(85.0, "Parsing deep analysis result").await?;
        Ok(parse_or(&outcome.text, DeepResult::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScriptedModel;
    use fl_core::{Confidence, InferenceResponse, Metadata, ToolCall};
    use fl_progress::test_utils::RecordingPublisher;
    use fl_search::StaticSearch;
    use serde_json::{Map, Value};

    fn analyzer(model: Arc<ScriptedModel>, search: Arc<StaticSearch>) -> CredibilityAnalyzer {
        CredibilityAnalyzer::new(
            model,
            search,
            AnalyzerConfig {
                lite_model: "lite".to_string(),
                deep_model: "deep".to_string(),
                call_timeout: Some(Duration::from_secs(5)),
                max_round_trips: 6,
                default_search_results: 5,
            },
        )
    }

    #[tokio::test]
    async fn test_analyze_runs_both_passes() {
        let mut args = Map::new();
        args.insert("query".to_string(), json!("mayor resigns"));
        let model = Arc::new(ScriptedModel::new(vec![
            InferenceResponse::text(
                "```json\n{\"short_title\":\"Mayor quits\",\"summary_easy\":\"The mayor left.\",\"tags\":[\"Politics\",\"city\"]}\n```",
            ),
            InferenceResponse::tool_calls(vec![ToolCall::new("web_search", args)]),
            InferenceResponse::text(
                "{\"credibility_score\": 64, \"bias\": \"center\", \"tags\": [\"wrong\"], \
                 \"claims\": [{\"text\": \"The mayor resigned\", \"confidence\": \"medium\", \
                 \"sources\": [\"https://a.example\"]}]}",
            ),
        ]));
        let search = Arc::new(StaticSearch::new(Vec::new()));
        let recorder = Arc::new(RecordingPublisher::new());
        let progress = ProgressTracker::new(3, recorder.clone());

        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), json!("Daily Example"));
        let article =
            Article::normalize("Mayor resigns", "The mayor resigned today.", metadata).unwrap();

        let result = analyzer(model.clone(), search.clone())
            .analyze(&article, &progress, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.short_title, "Mayor quits");
        assert_eq!(result.tags, vec!["Politics".to_string(), "city".to_string()]);
        assert_eq!(result.credibility_score, 64);
        assert_eq!(result.bias, "center");
        assert_eq!(result.claims[0].confidence, Some(Confidence::Medium));
        assert_eq!(search.queries()[0].query, "mayor resigns");

        let requests = model.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].model, "lite");
        assert!(requests[0].response_format.json_only);
        assert!(requests[0].tools.is_empty());
        assert_eq!(requests[1].model, "deep");
        assert_eq!(requests[1].tools.len(), 1);

        match &requests[1].conversation.turns()[0] {
            ConversationTurn::User { parts } => {
                let payload: Value = serde_json::from_str(&parts[1]).unwrap();
                assert_eq!(payload["article"]["source"], "Daily Example");
                assert_eq!(payload["lite"]["short_title"], "Mayor quits");
            }
            other => panic!("expected user turn, got {:?}", other),
        }

        let events = recorder.events_for(3);
        let messages: Vec<&str> = events.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Init",
                "Lite transform started",
                "Lite transform response received",
                "Lite analysis complete",
                "Deep analysis started",
                "Deep analysis first pass",
                "Searching: mayor resigns",
                "Deep analysis post-tools",
                "Parsing deep analysis result",
                "Merging data",
            ]
        );
        assert!(events.windows(2).all(|w| w[0].percent <= w[1].percent));
    }

    #[tokio::test]
    async fn test_unparseable_output_falls_back_to_defaults() {
        let model = Arc::new(ScriptedModel::new(vec![
            InferenceResponse::text("Sorry, I can't do JSON today."),
            InferenceResponse::text(""),
        ]));
        let search = Arc::new(StaticSearch::new(Vec::new()));
        let progress = ProgressTracker::new(1, Arc::new(RecordingPublisher::new()));
        let article = Article::normalize("T", "Body", Metadata::new()).unwrap();

        let result = analyzer(model, search)
            .analyze(&article, &progress, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result, AnalysisResult::default());
    }

    #[tokio::test]
    async fn test_lite_failure_propagates() {
        let model = Arc::new(ScriptedModel::default());
        model.push_error("network unreachable");
        let search = Arc::new(StaticSearch::new(Vec::new()));
        let recorder = Arc::new(RecordingPublisher::new());
        let progress = ProgressTracker::new(1, recorder.clone());
        let article = Article::normalize("T", "Body", Metadata::new()).unwrap();

        let err = analyzer(model, search)
            .analyze(&article, &progress, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_upstream());
        assert!(recorder
            .events_for(1)
            .iter()
            .all(|e| e.status != Some(AnalysisStatus::Failed)));
    }
}
