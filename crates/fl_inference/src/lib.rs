use std::time::Duration;

pub mod analysis;
mod call;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod tool_loop;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_LITE_MODEL: &str = "gemini-2.5-flash-lite";
pub const DEFAULT_DEEP_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_MAX_ROUND_TRIPS: usize = 6;
pub const DEFAULT_SEARCH_RESULTS: u32 = 5;

#[derive(Clone)]
pub struct InferenceConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    /// Cheap model used for the summary pass
    pub lite_model: String,
    /// Stronger model with tool access used for the assessment pass
    pub deep_model: String,
    pub request_timeout: Duration,
    pub max_round_trips: usize,
    pub default_search_results: u32,
}

impl std::fmt::Debug for InferenceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceConfig")
            .field("api_key", &self.api_key.as_deref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("lite_model", &self.lite_model)
            .field("deep_model", &self.deep_model)
            .field("request_timeout", &self.request_timeout)
            .field("max_round_trips", &self.max_round_trips)
            .field("default_search_results", &self.default_search_results)
            .finish()
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            lite_model: DEFAULT_LITE_MODEL.to_string(),
            deep_model: DEFAULT_DEEP_MODEL.to_string(),
            request_timeout: Duration::from_secs(60),
            max_round_trips: DEFAULT_MAX_ROUND_TRIPS,
            default_search_results: DEFAULT_SEARCH_RESULTS,
        }
    }
}

pub mod prelude {
    pub use super::analysis::{AnalyzerConfig, CredibilityAnalyzer};
    pub use super::models::{create_model, ModelKind};
    pub use super::pipeline::AnalysisPipeline;
    pub use super::InferenceConfig;
    pub use fl_core::{AnalysisResult, Article, Error, Result};
}

pub use models::create_model;
pub use pipeline::AnalysisPipeline;
