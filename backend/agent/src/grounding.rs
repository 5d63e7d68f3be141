//! Fact retrieval with the one-retry rule.

use std::time::Duration;

use poemforge_core::{RetrievalError, Retriever};
use tracing::warn;

async fn query_once(
    retriever: &dyn Retriever,
    query: &str,
    k: usize,
    timeout: Duration,
) -> Result<Vec<String>, RetrievalError> {
    tokio::time::timeout(timeout, retriever.query(query, k))
        .await
        .map_err(|_| RetrievalError(format!("query timed out after {}s", timeout.as_secs_f32())))?
}

/// Query the retriever, retrying once with the same query on failure.
pub(crate) async fn fetch_facts(
    retriever: &dyn Retriever,
    query: &str,
    k: usize,
    timeout: Duration,
) -> Result<Vec<String>, RetrievalError> {
    match query_once(retriever, query, k, timeout).await {
        Ok(facts) => Ok(facts),
        Err(first) => {
            warn!(error = %first, "Retrieval failed, retrying once");
            query_once(retriever, query, k, timeout).await
        }
    }
}
