use std::time::Duration;

pub mod providers;

pub use providers::static_results::StaticSearch;
pub use providers::tavily::TavilySearch;

pub const DEFAULT_SEARCH_URL: &str = "https://api.tavily.com";

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub request_timeout: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_SEARCH_URL.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

pub mod prelude {
    pub use super::SearchConfig;
    pub use super::providers::{StaticSearch, TavilySearch};
    pub use fl_core::{Result, SearchRequest, SearchResult, WebSearch};
}
