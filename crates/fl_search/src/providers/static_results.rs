use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;
use fl_core::{Result, SearchRequest, SearchResult, WebSearch};

/// Serves the same canned results for every query and remembers what was
/// asked. Used offline and in tests.
#[derive(Default)]
pub struct StaticSearch {
    results: Vec<SearchResult>,
    queries: Mutex<Vec<SearchRequest>>,
}

impl fmt::Debug for StaticSearch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticSearch")
            .field("results", &self.results.len())
            .finish()
    }
}

impl StaticSearch {
    pub fn new(results: Vec<SearchResult>) -> Self {
        Self {
            results,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<SearchRequest> {
        match self.queries.lock() {
            Ok(queries) => queries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl WebSearch for StaticSearch {
    fn name(&self) -> &str {
        "Static"
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        if request.query.trim().is_empty() {
            return Ok(Vec::new());
        }
        match self.queries.lock() {
            Ok(mut queries) => queries.push(request.clone()),
            Err(poisoned) => poisoned.into_inner().push(request.clone()),
        }
        Ok(self
            .results
            .iter()
            .take(request.max_results as usize)
            .cloned()
            .collect())
    }
}
