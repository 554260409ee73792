//! Mock searcher for testing.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::searcher::{Candidate, IndexerHealth, IndexerQuery, SearchError, Searcher};

/// Produces results based on the query text.
type QueryHandler = Box<dyn Fn(&str) -> Vec<Candidate> + Send + Sync>;

/// Mock implementation of the Searcher trait.
///
/// Returns the configured candidates for every query (or whatever the query
/// handler produces), records queries, and can fail the next call.
///
/// # Example
///
/// ```rust,ignore
/// use shelfhound_core::testing::{MockSearcher, fixtures};
///
/// let searcher = MockSearcher::new();
/// searcher.set_results(vec![fixtures::candidate("Dune [M4B]", 12)]).await;
/// ```
pub struct MockSearcher {
    results: Arc<RwLock<Vec<Candidate>>>,
    queries: Arc<RwLock<Vec<IndexerQuery>>>,
    next_error: Arc<RwLock<Option<SearchError>>>,
    health: Arc<RwLock<IndexerHealth>>,
    query_handler: Arc<RwLock<Option<QueryHandler>>>,
}

impl std::fmt::Debug for MockSearcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSearcher")
            .field("results", &"<results>")
            .field("queries", &"<queries>")
            .field("query_handler", &"<handler>")
            .finish()
    }
}

impl Default for MockSearcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSearcher {
    pub fn new() -> Self {
        Self {
            results: Arc::new(RwLock::new(Vec::new())),
            queries: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            health: Arc::new(RwLock::new(IndexerHealth::Up)),
            query_handler: Arc::new(RwLock::new(None)),
        }
    }

    /// Set the results to return for subsequent searches.
    pub async fn set_results(&self, results: Vec<Candidate>) {
        *self.results.write().await = results;
    }

    /// Produce results from the query text instead of the fixed list.
    pub async fn set_query_handler<F>(&self, handler: F)
    where
        F: Fn(&str) -> Vec<Candidate> + Send + Sync + 'static,
    {
        *self.query_handler.write().await = Some(Box::new(handler));
    }

    /// Configure the next search to fail with the given error.
    pub async fn set_next_error(&self, error: SearchError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn set_health(&self, health: IndexerHealth) {
        *self.health.write().await = health;
    }

    /// Recorded queries, oldest first.
    pub async fn recorded_queries(&self) -> Vec<IndexerQuery> {
        self.queries.read().await.clone()
    }

    pub async fn search_count(&self) -> usize {
        self.queries.read().await.len()
    }
}

#[async_trait]
impl Searcher for MockSearcher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn search(&self, query: &IndexerQuery) -> Result<Vec<Candidate>, SearchError> {
        self.queries.write().await.push(query.clone());

        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }

        if let Some(handler) = self.query_handler.read().await.as_ref() {
            return Ok(handler(&query.query));
        }
        Ok(self.results.read().await.clone())
    }

    async fn probe(&self) -> IndexerHealth {
        *self.health.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    fn query(text: &str) -> IndexerQuery {
        IndexerQuery {
            query: text.to_string(),
            categories: Vec::new(),
            indexer_ids: Vec::new(),
            timeout: None,
        }
    }

    #[tokio::test]
    async fn test_results_and_recording() {
        let searcher = MockSearcher::new();
        searcher
            .set_results(vec![fixtures::candidate("Dune [M4B]", 5)])
            .await;

        let results = searcher.search(&query("dune")).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(searcher.search_count().await, 1);
        assert_eq!(searcher.recorded_queries().await[0].query, "dune");
    }

    #[tokio::test]
    async fn test_query_handler_and_errors() {
        let searcher = MockSearcher::new();
        searcher
            .set_query_handler(|q| vec![fixtures::candidate(&format!("{} [MP3]", q), 1)])
            .await;
        searcher.set_next_error(SearchError::Timeout).await;

        assert!(searcher.search(&query("dune")).await.is_err());
        let results = searcher.search(&query("dune")).await.unwrap();
        assert_eq!(results[0].title, "dune [MP3]");

        searcher.set_health(IndexerHealth::Degraded).await;
        assert_eq!(searcher.probe().await, IndexerHealth::Degraded);
    }
}
