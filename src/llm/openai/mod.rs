use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum::http::HeaderValue;
use chrono::{DateTime, FixedOffset};
use reqwest::Client;
use tracing::debug;

use crate::llm::openai::models::{ChatMessage, ChatRequest, ChatResponse};
use crate::llm::prompt::build_prompt;
use crate::llm::{LLMProvider, decode_reply};
use crate::parser::ParsedReminder;

pub mod models;

const OPENAI_API_BASE_URL: &str = "https://api.openai.com/v1";

// Near-deterministic, short replies; the schema fits well under the cap.
const TEMPERATURE: f32 = 0.1;
const MAX_TOKENS: u32 = 500;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct OpenAiHttpClient {
    client: Client,
    base_url: String,
    pub model: String,
}

impl OpenAiHttpClient {
    pub fn new(api_token: &str, model: &str) -> Self {
        Self::with_base_url(api_token, model, OPENAI_API_BASE_URL)
    }

    pub fn with_base_url(api_token: &str, model: &str, base_url: &str) -> Self {
        let client = Client::builder()
            .user_agent("lembrete-bot/0.1")
            .timeout(REQUEST_TIMEOUT)
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                headers.insert(
                    "Authorization",
                    HeaderValue::from_str(&format!("Bearer {}", api_token)).unwrap(),
                );
                headers
            })
            .build()
            .unwrap();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    pub fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client.post(self.make_url(url))
    }

    fn make_url(&self, endpoint: &str) -> String {
        if !endpoint.starts_with("/") {
            format!("{}/{}", self.base_url, endpoint)
        } else {
            format!("{}{}", self.base_url, endpoint)
        }
    }
}

pub async fn chat_completion(
    client: &OpenAiHttpClient,
    request: ChatRequest,
) -> Result<ChatResponse> {
    debug!("Sending chat completion request: {:#?}", request);
    let response = client.post("/chat/completions").json(&request).send().await?;
    let text = response.text().await?;
    debug!("Completion response: {}", text);

    let chat_response: ChatResponse = serde_json::from_str(&text)?;
    Ok(chat_response)
}

#[async_trait]
impl LLMProvider for OpenAiHttpClient {
    async fn interpret(
        &self,
        text: &str,
        now: DateTime<FixedOffset>,
    ) -> Result<Option<ParsedReminder>> {
        debug!("Interpreting reminder text with {}: {}", self.model, text);
        let response = chat_completion(
            self,
            ChatRequest {
                model: self.model.clone(),
                messages: vec![ChatMessage {
                    role: "user".to_string(),
                    content: build_prompt(text, now),
                }],
                max_tokens: MAX_TOKENS,
                temperature: TEMPERATURE,
                stream: Some(false),
            },
        )
        .await?;

        let reply: String = response.into();
        debug!("Model reply: {}", reply);

        Ok(decode_reply(&reply, text, now)?)
    }
}
