//! Query request and response wire types.
//!
//! Errors never escape as `Err`: the response carries an `error` message and
//! no results, matching what a query endpoint returns to its caller.

use serde::{Deserialize, Serialize};
use tracing::warn;

use stream_types::Settings;

use crate::error::SearchError;
use crate::searcher::{QueryEngine, ScoredDocument};

/// Bounds applied to the requested limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    /// Used when the request has no limit
    pub default_limit: usize,
    /// Largest accepted limit
    pub max_limit: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 1000,
        }
    }
}

impl QueryLimits {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            default_limit: settings.default_query_limit,
            max_limit: settings.max_query_limit,
        }
    }

    /// Resolve the effective limit for a request.
    pub fn resolve(&self, requested: Option<i64>) -> Result<usize, SearchError> {
        match requested {
            None => Ok(self.default_limit),
            Some(limit) if limit <= 0 => Err(SearchError::InvalidLimit(format!(
                "limit must be positive, got {}",
                limit
            ))),
            Some(limit) if limit as u64 > self.max_limit as u64 => Err(SearchError::InvalidLimit(
                format!("limit {} exceeds maximum {}", limit, self.max_limit),
            )),
            Some(limit) => Ok(limit as usize),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One ranked hit as returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub document_id: String,
    pub score: f32,
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl From<ScoredDocument> for SearchResult {
    fn from(doc: ScoredDocument) -> Self {
        Self {
            document_id: doc.document_id.to_string(),
            score: doc.score,
            fields: doc
                .fields
                .iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub index_num_docs: u64,
    pub query_num_docs: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchResponse {
    pub fn from_error(error: &SearchError) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::default()
        }
    }
}

impl QueryEngine {
    /// Validate and run a request.
    ///
    /// Invalid limits and queries are rejected before touching the index.
    pub fn handle(&self, request: &SearchRequest, limits: &QueryLimits) -> SearchResponse {
        let result = limits.resolve(request.limit).and_then(|limit| {
            let query = request.query.as_deref().unwrap_or_default();
            self.execute(query, limit)
        });

        match result {
            Ok(hits) => SearchResponse {
                results: hits.hits.into_iter().map(SearchResult::from).collect(),
                index_num_docs: hits.index_num_docs,
                query_num_docs: hits.total_matches,
                error: None,
            },
            Err(e) => {
                warn!(error = %e, client_error = e.is_client_error(), "Search request failed");
                SearchResponse::from_error(&e)
            }
        }
    }
}
