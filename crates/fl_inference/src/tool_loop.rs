//! The agentic half of the deep pass.
//!
//! The model is handed the conversation plus the `web_search` declaration and
//! decides by itself how often to search. Every call it asks for is executed
//! in order and recorded as a model turn immediately followed by its result
//! turn before the whole conversation is submitted again. The number of
//! inference round-trips is capped.

use std::sync::Arc;
use std::time::Duration;

use fl_core::{
    Conversation, InferenceRequest, InferenceService, ResponseFormat, Result, SearchRequest,
    ToolCall, ToolDeclaration, WebSearch,
};
use fl_progress::ProgressTracker;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::call::guarded;

pub const WEB_SEARCH_TOOL: &str = "web_search";
pub const MAX_SEARCH_RESULTS: i64 = 10;

pub fn web_search_declaration() -> ToolDeclaration {
    ToolDeclaration {
        name: WEB_SEARCH_TOOL.to_string(),
        description: "Search the web to verify a claim or headline; returns concise, \
                      source-linked notes."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "max_results": {"type": "integer", "minimum": 1, "maximum": MAX_SEARCH_RESULTS}
            },
            "required": ["query"]
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingModel,
    ExecutingTools,
    Done,
}

/// How the loop reached [`LoopState::Done`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The model answered without asking for tools.
    Answered,
    /// The round-trip cap was hit while the model still wanted tools.
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct ToolLoopConfig {
    pub model: String,
    pub max_round_trips: usize,
    pub call_timeout: Option<Duration>,
    pub default_search_results: u32,
}

#[derive(Debug)]
pub struct ToolLoopOutcome {
    /// Final answer, or the latest non-empty text when exhausted.
    pub text: String,
    pub state: LoopState,
    pub termination: Termination,
    pub round_trips: usize,
    pub searches: usize,
    pub conversation: Conversation,
}

impl ToolLoopOutcome {
    pub fn is_exhausted(&self) -> bool {
        self.termination == Termination::Exhausted
    }
}

pub struct ToolLoop {
    inference: Arc<dyn InferenceService>,
    search: Arc<dyn WebSearch>,
    config: ToolLoopConfig,
}

impl ToolLoop {
    pub fn new(
        inference: Arc<dyn InferenceService>,
        search: Arc<dyn WebSearch>,
        config: ToolLoopConfig,
    ) -> Self {
        Self {
            inference,
            search,
            config,
        }
    }

    pub async fn run(
        &self,
        mut conversation: Conversation,
        progress: &ProgressTracker,
        cancel: &CancellationToken,
    ) -> Result<ToolLoopOutcome> {
        let tools = vec![web_search_declaration()];
        let max_round_trips = self.config.max_round_trips.max(1);

        let mut state = LoopState::AwaitingModel;
        let mut termination = Termination::Answered;
        let mut pending: Vec<ToolCall> = Vec::new();
        let mut latest_text = String::new();
        let mut round_trips = 0;
        let mut searches = 0;

        while state != LoopState::Done {
            match state {
                LoopState::AwaitingModel => {
                    let request = InferenceRequest {
                        model: self.config.model.clone(),
                        conversation: conversation.clone(),
                        response_format: ResponseFormat { json_only: false },
                        tools: tools.clone(),
                    };
                    let response = guarded(
                        "deep inference",
                        self.config.call_timeout,
                        cancel,
                        self.inference.generate(&request),
                    )
                    .await?;
                    round_trips += 1;

                    if round_trips == 1 {
                        progress.checkpoint(55.0, "Deep analysis first pass").await?;
                    } else {
                        progress
                            .checkpoint(post_tools_percent(round_trips), "Deep analysis post-tools")
                            .await?;
                    }

                    if !response.has_tool_calls() {
                        latest_text = response.text;
                        state = LoopState::Done;
                    } else if round_trips >= max_round_trips {
                        if !response.text.trim().is_empty() {
                            latest_text = response.text;
                        }
                        warn!(
                            "Tool loop exhausted after {} round-trips with {} calls still pending",
                            round_trips,
                            response.tool_calls.len()
                        );
                        termination = Termination::Exhausted;
                        state = LoopState::Done;
                    } else {
                        if !response.text.trim().is_empty() {
                            latest_text = response.text;
                        }
                        debug!("Model requested {} tool calls", response.tool_calls.len());
                        pending = response.tool_calls;
                        state = LoopState::ExecutingTools;
                    }
                }
                LoopState::ExecutingTools => {
                    for call in std::mem::take(&mut pending) {
                        let payload = self.execute(&call, &mut searches, progress, cancel).await?;
                        conversation.push_tool_exchange(call, payload);
                    }
                    state = LoopState::AwaitingModel;
                }
                LoopState::Done => {}
            }
        }

        Ok(ToolLoopOutcome {
            text: latest_text,
            state,
            termination,
            round_trips,
            searches,
            conversation,
        })
    }

    async fn execute(
        &self,
        call: &ToolCall,
        searches: &mut usize,
        progress: &ProgressTracker,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        if call.name != WEB_SEARCH_TOOL {
            warn!("Model requested unsupported tool {:?}", call.name);
            return Ok(json!({ "error": format!("unsupported tool: {}", call.name) }));
        }

        let query = call.str_arg("query").unwrap_or_default().trim().to_string();
        if query.is_empty() {
            return Ok(json!({ "results": [] }));
        }
        let max_results = call
            .int_arg("max_results")
            .unwrap_or(i64::from(self.config.default_search_results))
            .clamp(1, MAX_SEARCH_RESULTS) as u32;

        *searches += 1;
        progress
            .checkpoint(search_percent(*searches), format!("Searching: {}", query))
            .await?;
        info!("🔍 Searching: {}", query);

        let request = SearchRequest { query, max_results };
        let results = guarded(
            "web search",
            self.config.call_timeout,
            cancel,
            self.search.search(&request),
        )
        .await?;
        debug!("Search {:?} returned {} results", request.query, results.len());

        Ok(json!({ "results": serde_json::to_value(results)? }))
    }
}

fn search_percent(search: usize) -> f32 {
    (59 + search).min(69) as f32
}

fn post_tools_percent(round_trip: usize) -> f32 {
    (70 + 2 * round_trip.saturating_sub(2)).min(80) as f32
}
