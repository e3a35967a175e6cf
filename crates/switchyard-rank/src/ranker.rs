//! Ranker trait and backend selection.

use crate::gemini::GeminiRanker;
use crate::openai::OpenAiRanker;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use switchyard_types::{RankError, ToolDescriptor};

/// Most tools a ranking returns unless configured otherwise.
pub const DEFAULT_MAX_TOOLS: usize = 5;

/// Boxed future returned by [`Ranker::rank`].
pub type RankFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<ToolDescriptor>, RankError>> + Send + 'a>>;

/// Picks the tools most relevant to a query.
///
/// Dyn-compatible so the server can hold an `Arc<dyn Ranker>`.
pub trait Ranker: Send + Sync {
    /// Return an ordered subset of `candidates`, most relevant first.
    fn rank<'a>(&'a self, query: &'a str, candidates: &'a [ToolDescriptor]) -> RankFuture<'a>;

    /// Backend name for logging (e.g., "openai").
    fn name(&self) -> &str;
}

/// Which hosted model answers ranking queries.
#[derive(Debug, Clone, PartialEq)]
pub enum RankerBackend {
    OpenAi {
        api_key: String,
        model: String,
        base_url: String,
    },
    Gemini {
        api_key: String,
        model: String,
        base_url: String,
    },
}

impl RankerBackend {
    pub fn openai(api_key: impl Into<String>) -> Self {
        RankerBackend::OpenAi {
            api_key: api_key.into(),
            model: crate::openai::DEFAULT_MODEL.to_string(),
            base_url: crate::openai::DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn gemini(api_key: impl Into<String>) -> Self {
        RankerBackend::Gemini {
            api_key: api_key.into(),
            model: crate::gemini::DEFAULT_MODEL.to_string(),
            base_url: crate::gemini::DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RankerBackend::OpenAi { .. } => "openai",
            RankerBackend::Gemini { .. } => "gemini",
        }
    }
}

/// Build the ranker for `backend`.
pub fn build_ranker(
    backend: RankerBackend,
    max_tools: usize,
) -> Result<Arc<dyn Ranker>, RankError> {
    if max_tools == 0 {
        return Err(RankError::Config {
            backend: backend.name().to_string(),
            message: "max_tools must be at least 1".to_string(),
        });
    }
    let ranker: Arc<dyn Ranker> = match backend {
        RankerBackend::OpenAi {
            api_key,
            model,
            base_url,
        } => Arc::new(OpenAiRanker::new(api_key, model, base_url, max_tools)?),
        RankerBackend::Gemini {
            api_key,
            model,
            base_url,
        } => Arc::new(GeminiRanker::new(api_key, model, base_url, max_tools)?),
    };
    tracing::info!("Tool ranking backend: {}", ranker.name());
    Ok(ranker)
}
