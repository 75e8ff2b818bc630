use crate::capture::frame::LandmarkFrame;
use crate::capture::window::WINDOW_LEN;
use crate::error::InferenceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Ответ сервиса распознавания
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    #[serde(default)]
    pub confidence: Option<f32>,
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    sequence: &'a [LandmarkFrame],
}

/// Распознаёт жест по полному окну из 30 кадров
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(&self, window: &[LandmarkFrame]) -> Result<Prediction, InferenceError>;
}

/// `POST {sequence: [[126 floats] x 30]}` → `{label, confidence?}`
pub struct HttpRecognizer {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpRecognizer {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, InferenceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl Recognizer for HttpRecognizer {
    async fn recognize(&self, window: &[LandmarkFrame]) -> Result<Prediction, InferenceError> {
        if window.len() != WINDOW_LEN {
            return Err(InferenceError::WindowLength(window.len()));
        }

        debug!(endpoint = %self.endpoint, frames = window.len(), "Sending window for recognition");
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&PredictRequest { sequence: window })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(InferenceError::Status {
                status: status.as_u16(),
            });
        }
        Ok(response.json::<Prediction>().await?)
    }
}
