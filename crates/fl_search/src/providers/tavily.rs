use std::fmt;

use async_trait::async_trait;
use fl_core::{Error, Result, SearchRequest, SearchResult, WebSearch};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::SearchConfig;

#[derive(Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    max_results: u32,
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

/// Web search backed by the Tavily REST API.
pub struct TavilySearch {
    client: Client,
    api_key: String,
    endpoint: Url,
}

impl fmt::Debug for TavilySearch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TavilySearch")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}

impl TavilySearch {
    pub fn new(config: SearchConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| Error::Search("Tavily API key is required".to_string()))?;
        let endpoint = search_endpoint(&config.base_url).map_err(|e| {
            Error::Validation(format!("invalid search URL {}: {}", config.base_url, e))
        })?;
        let client = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            client,
            api_key,
            endpoint,
        })
    }
}

/// Appends `/search` to the base URL, keeping any path it already has.
fn search_endpoint(base_url: &str) -> std::result::Result<Url, url::ParseError> {
    let base = Url::parse(base_url)?;
    Url::parse(&format!("{}/search", base.as_str().trim_end_matches('/')))
}

#[async_trait]
impl WebSearch for TavilySearch {
    fn name(&self) -> &str {
        "Tavily"
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        let query = request.query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Searching Tavily for {:?} (max {})", query, request.max_results);
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&TavilyRequest {
                query,
                max_results: request.max_results,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Search(format!("Tavily returned {}: {}", status, body)));
        }

        let parsed = response.json::<TavilyResponse>().await?;
        debug!("Tavily returned {} results for {:?}", parsed.results.len(), query);
        Ok(parsed.results)
    }
}
