//! OpenAI chat-completions backend.

use serde::{Deserialize, Serialize};
use switchyard_types::{RankError, ToolDescriptor};

use crate::http::{build_client, finish, send_json};
use crate::prompt::build_prompt;
use crate::ranker::{RankFuture, Ranker};

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

const NAME: &str = "openai";
const MAX_TOKENS: u32 = 200;

pub struct OpenAiRanker {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tools: usize,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiRanker {
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

    async fn complete(&self, prompt: &str) -> Result<String, RankError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: MAX_TOKENS,
        };
        tracing::debug!("POST {url} (model {})", self.model);

        let request = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body);
        let reply: ChatResponse = send_json(NAME, request).await?;

        reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| RankError::BadReply {
                backend: NAME.to_string(),
                message: "no choices in response".to_string(),
            })
    }
}

impl Ranker for OpenAiRanker {
    fn rank<'a>(&'a self, query: &'a str, candidates: &'a [ToolDescriptor]) -> RankFuture<'a> {
        Box::pin(async move {
            if candidates.is_empty() {
                return Ok(Vec::new());
            }
            let prompt = build_prompt(query, candidates, self.max_tools);
            let text = self.complete(&prompt).await?;
            finish(NAME, &text, candidates, self.max_tools)
        })
    }

    fn name(&self) -> &str {
        NAME
    }
}
