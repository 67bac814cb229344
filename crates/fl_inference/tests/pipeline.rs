use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fl_core::{
    AnalysisStatus, AnalysisStore, ArticleId, InferenceResponse, Metadata, ProgressPublisher,
    ProgressUpdate, SearchResult, StorePublisher, ToolCall,
};
use fl_inference::prelude::*;
use fl_inference::models::ScriptedModel;
use fl_progress::test_utils::RecordingPublisher;
use fl_search::StaticSearch;
use fl_storage::{InMemoryStorage, SQLiteStorage};
use serde_json::{json, Map};
use tokio_util::sync::CancellationToken;

struct Harness {
    model: Arc<ScriptedModel>,
    search: Arc<StaticSearch>,
    store: Arc<InMemoryStorage>,
    recorder: Arc<RecordingPublisher>,
    pipeline: AnalysisPipeline,
}

fn council_search() -> Arc<StaticSearch> {
    Arc::new(StaticSearch::new(vec![SearchResult::new(
        "Council statement",
        "https://council.example/statement",
        "The council confirmed the resignation.",
    )]))
}

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

fn harness(model: ScriptedModel) -> Harness {
    let model = Arc::new(model);
    let search = council_search();
    let store = Arc::new(InMemoryStorage::new());
    let recorder = Arc::new(RecordingPublisher::forwarding(Arc::new(StorePublisher::new(
        store.clone(),
    ))));

    let pipeline = AnalysisPipeline::new(analyzer(model.clone(), search.clone()), store.clone())
        .with_publisher(recorder.clone());

    Harness {
        model,
        search,
        store,
        recorder,
        pipeline,
    }
}

fn search_call(query: &str) -> ToolCall {
    let mut args = Map::new();
    args.insert("query".to_string(), json!(query));
    ToolCall::new("web_search", args)
}

fn assert_non_decreasing(events: &[ProgressUpdate]) {
    assert!(
        events.windows(2).all(|w| w[0].percent <= w[1].percent),
        "progress went backwards: {:?}",
        events
    );
}

#[tokio::test]
async fn test_analysis_end_to_end() {
    let h = harness(ScriptedModel::new(vec![
        InferenceResponse::text(
            r#"{"short_title":"X short","summary_easy":"Y simplified.","tags":["politics"]}"#,
        ),
        InferenceResponse::text(r#"{"credibility_score":72,"claims":[]}"#),
    ]));
    let id = h.store.register_article("X", "Y").await.unwrap();

    let result = h.pipeline.run_analysis(id, "X", "Y").await.unwrap();
    assert_eq!(result.short_title, "X short");
    assert_eq!(result.summary_easy, "Y simplified.");
    assert_eq!(result.tags, vec!["politics".to_string()]);
    assert_eq!(result.credibility_score, 72);
    assert!(result.claims.is_empty());

    let events = h.recorder.events_for(id);
    assert_non_decreasing(&events);
    assert_eq!(events.first().unwrap().status, Some(AnalysisStatus::Processing));
    let last = events.last().unwrap();
    assert_eq!(last.percent, 100.0);
    assert_eq!(last.message, "Analysis complete");
    assert_eq!(last.status, Some(AnalysisStatus::Completed));

    let stored = h.store.result(id).await.unwrap().unwrap();
    assert_eq!(stored.credibility_score, 72);
    let progress = h.store.progress(id).await.unwrap().unwrap();
    assert_eq!(progress.status, AnalysisStatus::Completed);
}

#[tokio::test]
async fn test_empty_body_fails_without_remote_calls() {
    let h = harness(ScriptedModel::default());
    let id = h.store.register_article("Title", "   ").await.unwrap();

    let err = h.pipeline.run_analysis(id, "Title", "  \n\t ").await.unwrap_err();
    assert!(matches!(err, Error::EmptyBody));

    let events = h.recorder.events_for(id);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].percent, 0.0);
    assert_eq!(events[0].message, "Empty article body");
    assert_eq!(events[0].status, Some(AnalysisStatus::Failed));
    assert!(h.model.requests().is_empty());
    assert!(h.search.queries().is_empty());
    assert!(h.store.result(id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_inference_failure_is_recorded() {
    let model = ScriptedModel::new(vec![InferenceResponse::text(
        r#"{"short_title":"ok","summary_easy":"ok","tags":[]}"#,
    )]);
    model.push_error("deep model unavailable");
    let h = harness(model);
    let id = h.store.register_article("Title", "Body").await.unwrap();

    let err = h.pipeline.run_analysis(id, "Title", "Body").await.unwrap_err();
    assert!(err.is_upstream());

    let events = h.recorder.events_for(id);
    assert_non_decreasing(&events);
    let last = events.last().unwrap();
    assert_eq!(last.status, Some(AnalysisStatus::Failed));
    assert!(last.message.starts_with("Analysis failed:"));
    assert!(last.message.contains("deep model unavailable"));
    assert_eq!(last.percent, 45.0);

    let progress = h.store.progress(id).await.unwrap().unwrap();
    assert_eq!(progress.status, AnalysisStatus::Failed);
    assert!(h.store.result(id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_tool_round_trips_reach_the_store() {
    let h = harness(ScriptedModel::new(vec![
        InferenceResponse::text(r#"{"short_title":"Mayor quits","tags":["Politics"]}"#),
        InferenceResponse::tool_calls(vec![search_call("mayor resignation")]),
        InferenceResponse::text(
            r#"```json
            {"credibility_score": "81", "claims": [{"text": "The mayor resigned",
              "confidence": "HIGH", "sources": ["https://council.example/statement"]}]}
            ```"#,
        ),
    ]));
    let id = h.store.register_article("Mayor resigns", "Body").await.unwrap();

    let result = h.pipeline.run_analysis(id, "Mayor resigns", "Body").await.unwrap();
    assert_eq!(result.credibility_score, 81);
    assert_eq!(result.claims.len(), 1);
    assert_eq!(h.search.queries()[0].query, "mayor resignation");

    let requests = h.model.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[2].conversation.len(), 3);

    let stored = h.store.result(id).await.unwrap().unwrap();
    assert_eq!(stored.tags, vec!["politics".to_string()]);
    assert!(h
        .recorder
        .events_for(id)
        .iter()
        .any(|e| e.message == "Searching: mayor resignation"));
}

#[tokio::test]
async fn test_rerun_supersedes_previous_result() {
    let h = harness(ScriptedModel::new(vec![
        InferenceResponse::text(r#"{"short_title":"first","tags":["a"]}"#),
        InferenceResponse::text(r#"{"credibility_score":20}"#),
        InferenceResponse::text(r#"{"short_title":"second","tags":["b"]}"#),
        InferenceResponse::text(r#"{"credibility_score":90}"#),
    ]));
    let id = h.store.register_article("Title", "Body").await.unwrap();

    h.pipeline.run_analysis(id, "Title", "Body").await.unwrap();
    h.pipeline.run_analysis(id, "Title", "Body").await.unwrap();

    let stored = h.store.result(id).await.unwrap().unwrap();
    assert_eq!(stored.short_title, "second");
    assert_eq!(stored.tags, vec!["b".to_string()]);
    assert_eq!(stored.credibility_score, 90);

    let completions = h
        .recorder
        .events_for(id)
        .into_iter()
        .filter(|e| e.status == Some(AnalysisStatus::Completed))
        .count();
    assert_eq!(completions, 2);
}

#[tokio::test]
async fn test_cancelled_run_is_marked_failed() {
    let h = harness(ScriptedModel::repeating(InferenceResponse::text("{}")));
    let id = h.store.register_article("Title", "Body").await.unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = h
        .pipeline
        .run(id, "Title", "Body", Metadata::new(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert!(h.model.requests().is_empty());

    let progress = h.store.progress(id).await.unwrap().unwrap();
    assert_eq!(progress.status, AnalysisStatus::Failed);
    assert_eq!(progress.message, "Analysis cancelled");
}

#[tokio::test]
async fn test_spawned_runs_complete_independently() {
    let h = harness(ScriptedModel::repeating(InferenceResponse::text(
        r#"{"short_title":"Same","tags":["shared"],"credibility_score":60}"#,
    )));

    let mut ids = Vec::new();
    for i in 0..3 {
        ids.push(
            h.store
                .register_article(&format!("Article {}", i), "Body")
                .await
                .unwrap(),
        );
    }

    let handles = ids.iter().map(|&id| {
        h.pipeline
            .spawn(id, format!("Article {}", id), "Body".to_string(), CancellationToken::new())
    });
    for joined in futures::future::join_all(handles).await {
        let result = joined.unwrap().unwrap();
        assert_eq!(result.credibility_score, 60);
    }

    for id in ids {
        let events = h.recorder.events_for(id);
        assert_non_decreasing(&events);
        assert_eq!(events.last().unwrap().status, Some(AnalysisStatus::Completed));
        assert!(h.store.result(id).await.unwrap().is_some());
    }
}

/// Forwards progress to the store but refuses to record completion.
struct CompletionRejected {
    store: Arc<InMemoryStorage>,
}

#[async_trait]
impl ProgressPublisher for CompletionRejected {
    async fn publish_progress(&self, id: ArticleId, update: ProgressUpdate) -> fl_core::Result<()> {
        if update.status == Some(AnalysisStatus::Completed) {
            return Err(fl_core::Error::Storage("database is locked".to_string()));
        }
        self.store.publish_progress(id, update).await
    }
}

#[tokio::test]
async fn test_failed_completion_write_marks_run_failed() {
    let model = Arc::new(ScriptedModel::new(vec![
        InferenceResponse::text(r#"{"short_title":"ok","tags":[]}"#),
        InferenceResponse::text(r#"{"credibility_score":40}"#),
    ]));
    let store = Arc::new(InMemoryStorage::new());
    let pipeline = AnalysisPipeline::new(analyzer(model, council_search()), store.clone())
        .with_publisher(Arc::new(CompletionRejected {
            store: store.clone(),
        }));
    let id = store.register_article("Title", "Body").await.unwrap();

    let err = pipeline.run_analysis(id, "Title", "Body").await.unwrap_err();
    assert!(matches!(err, fl_core::Error::Storage(_)));

    let progress = store.progress(id).await.unwrap().unwrap();
    assert_eq!(progress.status, AnalysisStatus::Failed);
    assert!(progress.message.starts_with("Analysis failed:"));
    assert!(progress.message.contains("database is locked"));
    assert_eq!(progress.percent, 95.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_runs_against_sqlite() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = Arc::new(
        SQLiteStorage::new_with_path(&temp_dir.path().join("articles.db"))
            .await
            .unwrap(),
    );
    let model = Arc::new(ScriptedModel::repeating(InferenceResponse::text(
        r#"{"short_title":"Same","tags":["shared"],"credibility_score":55}"#,
    )));
    let pipeline = AnalysisPipeline::new(analyzer(model, council_search()), store.clone());

    let mut ids = Vec::new();
    for i in 0..16 {
        ids.push(
            store
                .register_article(&format!("Article {}", i), "Body")
                .await
                .unwrap(),
        );
    }

    let handles = ids.iter().map(|&id| {
        pipeline.spawn(id, format!("Article {}", id), "Body".to_string(), CancellationToken::new())
    });
    for joined in futures::future::join_all(handles).await {
        let result = joined.unwrap().unwrap();
        assert_eq!(result.credibility_score, 55);
    }

    for id in ids {
        let progress = store.progress(id).await.unwrap().unwrap();
        assert_eq!(progress.status, AnalysisStatus::Completed);
        assert_eq!(progress.percent, 100.0);
        let stored = store.result(id).await.unwrap().unwrap();
        assert_eq!(stored.tags, vec!["shared".to_string()]);
    }
}
