use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub max_results: u32,
}

/// One hit from the search provider. Provider-specific extras are kept so
/// they reach the model as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, alias = "content")]
    pub snippet: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SearchResult {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
            extra: Map::new(),
        }
    }
}

#[async_trait]
pub trait WebSearch: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Runs a query. Implementations return an empty list for an empty
    /// query without contacting the remote service.
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>>;
}
