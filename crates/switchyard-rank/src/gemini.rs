//! Google Gemini generateContent backend.

use serde::{Deserialize, Serialize};
use switchyard_types::{RankError, ToolDescriptor};

use crate::http::{build_client, finish, send_json};
use crate::prompt::build_prompt;
use crate::ranker::{RankFuture, Ranker};

pub const DEFAULT_MODEL: &str = "gemini-pro";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const NAME: &str = "gemini";

pub struct GeminiRanker {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tools: usize,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [TextPart<'a>; 1],
}

#[derive(Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Deserialize)]
struct ReplyPart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
    }
}

impl GeminiRanker {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        max_tools: usize,
    ) -> Result<Self, RankError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RankError::Config {
                backend: NAME.to_string(),
                message: "API key is empty".to_string(),
            });
        }
        Ok(Self {
            http: build_client(NAME)?,
            api_key,
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_tools,
        })
    }

    async fn generate(&self, prompt: &str) -> Result<String, RankError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = GenerateRequest {
            contents: [Content {
                role: "user",
                parts: [TextPart { text: prompt }],
            }],
        };
        tracing::debug!("POST {url}");

        let request = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body);
        let reply: GenerateResponse = send_json(NAME, request).await?;

        reply.first_text().ok_or_else(|| RankError::BadReply {
            backend: NAME.to_string(),
            message: "no response candidates".to_string(),
        })
    }
}

impl Ranker for GeminiRanker {
    fn rank<'a>(&'a self, query: &'a str, candidates: &'a [ToolDescriptor]) -> RankFuture<'a> {
        Box::pin(async move {
            if candidates.is_empty() {
                return Ok(Vec::new());
            }
            let prompt = build_prompt(query, candidates, self.max_tools);
            let text = self.generate(&prompt).await?;
            finish(NAME, &text, candidates, self.max_tools)
        })
    }

    fn name(&self) -> &str {
        NAME
    }
}
