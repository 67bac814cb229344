use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;
use fl_core::{Error, InferenceRequest, InferenceResponse, InferenceService, Result, ToolCall};
use serde_json::{json, Map};

#[derive(Default)]
struct Script {
    queued: VecDeque<Result<InferenceResponse>>,
    repeat: Option<InferenceResponse>,
    requests: Vec<InferenceRequest>,
}

/// Answers requests from a fixed queue and records everything it was sent.
#[derive(Default)]
pub struct ScriptedModel {
    script: Mutex<Script>,
}

impl fmt::Debug for ScriptedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedModel").finish()
    }
}

impl ScriptedModel {
    pub fn new(responses: Vec<InferenceResponse>) -> Self {
        let model = Self::default();
        for response in responses {
            model.push(response);
        }
        model
    }

    /// Serves `response` for every request once the queue is empty.
    pub fn repeating(response: InferenceResponse) -> Self {
        let model = Self::default();
        model.with_script(|script| script.repeat = Some(response));
        model
    }

    /// A full offline run: summary, one search round, then an assessment.
    pub fn demo() -> Self {
        let mut args = Map::new();
        args.insert("query".to_string(), json!("offline fact check"));
        args.insert("max_results".to_string(), json!(2));

        Self::new(vec![
            InferenceResponse::text(
                json!({
                    "short_title": "Offline summary of the article",
                    "summary_easy": "This summary was produced without contacting a model.",
                    "tags": ["offline", "demo"]
                })
                .to_string(),
            ),
            InferenceResponse::tool_calls(vec![ToolCall::new("web_search", args)]),
            InferenceResponse::text(
                json!({
                    "credibility_score": 50,
                    "bias": "unknown",
                    "sentiment": "neutral",
                    "risk_type": "none",
                    "red_flags": [],
                    "trust_signals": ["offline run"],
                    "claims": [],
                    "alternative_headlines": {
                        "neutral": "Article analysed offline",
                        "sensational": "You won't believe this offline analysis",
                        "calm": "An offline look at the article"
                    }
                })
                .to_string(),
            ),
        ])
    }

    pub fn push(&self, response: InferenceResponse) {
        self.with_script(|script| script.queued.push_back(Ok(response)));
    }

    /// Queues a failure, as if the remote service had errored.
    pub fn push_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.with_script(|script| script.queued.push_back(Err(Error::Inference(message))));
    }

    pub fn requests(&self) -> Vec<InferenceRequest> {
        self.with_script(|script| script.requests.clone())
    }

    fn with_script<R>(&self, f: impl FnOnce(&mut Script) -> R) -> R {
        match self.script.lock() {
            Ok(mut script) => f(&mut script),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

#[async_trait]
impl InferenceService for ScriptedModel {
    fn name(&self) -> &str {
        "Scripted"
    }

    async fn generate(&self, request: &InferenceRequest) -> Result<InferenceResponse> {
        self.with_script(|script| {
            script.requests.push(request.clone());
            match script.queued.pop_front() {
                Some(next) => next,
                None => script.repeat.clone().ok_or_else(|| {
                    Error::Inference("scripted model has no responses left".to_string())
                }),
            }
        })
    }
}
