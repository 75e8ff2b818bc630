//! Генерация связного текста из распознанных слов.

use crate::error::ComposeError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const PROMPT_HEAD: &str = "You are assisting a one-to-one video call with a deaf participant. \
The following word list was recognized from their signing.";
const PROMPT_TAIL: &str = "Taking the nature of sign language into account, fill in the missing \
context and write the smooth sentence they most likely meant. Output only that sentence.";

/// Подсказка для языковой модели со списком слов через запятую
pub fn build_prompt(words: &[String]) -> String {
    format!("{PROMPT_HEAD}\n\nWords: {}\n\n{PROMPT_TAIL}", words.join(","))
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Пустой список слов даёт `NoLabels`
    async fn generate(&self, words: &[String]) -> Result<String, ComposeError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    prompt: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    generated_text: String,
}

/// `POST <base>/chat {prompt}` → `{generated_text}`
pub struct HttpTextGenerator {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpTextGenerator {
    pub fn new(base: &Url, timeout: Duration) -> Result<Self, ComposeError> {
        let mut endpoint = base.clone();
        if let Ok(mut segments) = endpoint.path_segments_mut() {
            segments.pop_if_empty().push("chat");
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, words: &[String]) -> Result<String, ComposeError> {
        if words.is_empty() {
            return Err(ComposeError::NoLabels);
        }

        let prompt = build_prompt(words);
        debug!(endpoint = %self.endpoint, words = words.len(), "Requesting text generation");
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&ChatRequest { prompt: &prompt })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ComposeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: ChatResponse = response.json().await?;
        info!(len = reply.generated_text.len(), "Text generated");
        Ok(reply.generated_text)
    }
}
