use std::sync::Arc;

use crate::api::Optimizer;
use crate::error::MapperError;
use crate::models::{RouteQuery, RouteResult};
use crate::normalize::{normalize, NormalizeError};
use crate::notice::Notice;

#[derive(Debug, thiserror::Error)]
pub enum SearchFailure {
    #[error("optimizer returned no result")]
    NoResult { message: Option<String> },
    #[error("malformed optimizer reply: {source}")]
    Malformed {
        source: NormalizeError,
        message: Option<String>,
    },
    #[error(transparent)]
    Transport(#[from] MapperError),
}

impl SearchFailure {
    /// What the user should see; server-supplied text wins when present.
    pub fn notice(&self) -> Notice {
        match self {
            SearchFailure::NoResult { message } => Notice::NoResult {
                message: message.clone(),
            },
            SearchFailure::Malformed {
                message: Some(message),
                ..
            } => Notice::NoResult {
                message: Some(message.clone()),
            },
            SearchFailure::Malformed { source, .. } => Notice::SearchFailed {
                reason: source.to_string(),
            },
            SearchFailure::Transport(MapperError::Status { message, .. })
                if !message.is_empty() =>
            {
                Notice::SearchFailed {
                    reason: message.clone(),
                }
            }
            SearchFailure::Transport(err) => Notice::SearchFailed {
                reason: err.to_string(),
            },
        }
    }
}

/// Sends resolved queries to the optimizer. Performs no deduplication:
/// overlapping searches are sequenced by the caller.
#[derive(Clone)]
pub struct RouteRequestOrchestrator {
    optimizer: Arc<dyn Optimizer>,
}

impl RouteRequestOrchestrator {
    pub fn new(optimizer: Arc<dyn Optimizer>) -> Self {
        Self { optimizer }
    }

    pub async fn request(&self, query: &RouteQuery) -> Result<RouteResult, SearchFailure> {
        let response = self.optimizer.optimize(&query.to_request()).await?;
        let message = response.message.clone();

        match normalize(response) {
            Ok(result) => {
                tracing::info!(
                    "route with {} point(s) through {} profile(s)",
                    result.path.len(),
                    result.markers.len()
                );
                Ok(result)
            }
            Err(source) if source.is_empty_reply() => {
                tracing::warn!("no route returned: {message:?}");
                Err(SearchFailure::NoResult { message })
            }
            Err(source) => {
                tracing::warn!("discarding malformed optimizer reply: {source}");
                Err(SearchFailure::Malformed { source, message })
            }
        }
    }
}
