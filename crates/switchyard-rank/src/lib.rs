//! Relevance ranking of catalog tools for Switchyard.
//!
//! A [`Ranker`] takes a free-text query and the full tool catalog and returns
//! the few tools most likely to help, best first. Backends call a hosted
//! text-completion model; which one is chosen once, from configuration.

pub mod gemini;
mod http;
pub mod openai;
pub mod prompt;
pub mod ranker;

pub use gemini::GeminiRanker;
pub use openai::OpenAiRanker;
pub use ranker::{DEFAULT_MAX_TOOLS, RankFuture, Ranker, RankerBackend, build_ranker};
