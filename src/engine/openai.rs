//! `OpenAI`-compatible local inference server
//!
//! Talks to any runtime exposing `/models` and `/chat/completions`
//! (llama.cpp server, Ollama, vLLM, MLC serve). The server owns the weights;
//! launching verifies the model is served and unloading retires the handle.

use super::types::{ChatMessage, Completion, ModelKey, SamplingParams};
use super::{EngineError, EngineLauncher, EngineReport, InferenceEngine};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Creates [`OpenAICompatEngine`]s against one server
#[derive(Clone)]
pub struct OpenAICompatLauncher {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAICompatLauncher {
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, EngineError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| EngineError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn served_models(&self) -> Result<Vec<String>, EngineError> {
        let url = format!("{}/models", self.base_url);
        let request = authorize(self.client.get(&url), self.api_key.as_deref());
        let body = send(request).await?;

        let list: ModelList = serde_json::from_str(&body).map_err(|e| {
            EngineError::unknown(format!("Failed to parse model list: {e} - body: {body}"))
        })?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }
}

#[async_trait]
impl EngineLauncher for OpenAICompatLauncher {
    async fn launch(
        &self,
        model: &ModelKey,
        report: EngineReport<'_>,
    ) -> Result<Arc<dyn InferenceEngine>, EngineError> {
        report(&format!("Connecting to {}", self.base_url));
        let served = self.served_models().await?;
        report(&format!("Server lists {} model(s)", served.len()));

        if !served.iter().any(|id| id == model.as_str()) {
            return Err(EngineError::not_found(format!(
                "Model {model} is not served by {}",
                self.base_url
            )));
        }
        report(&format!("Model {model} is available"));

        Ok(Arc::new(OpenAICompatEngine {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            model: model.clone(),
            unloaded: AtomicBool::new(false),
        }))
    }
}

/// Handle bound to one model on an `OpenAI`-compatible server
pub struct OpenAICompatEngine {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: ModelKey,
    unloaded: AtomicBool,
}

impl OpenAICompatEngine {
    fn translate_request<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        params: &SamplingParams,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model: self.model.as_str(),
            messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            stream: false,
        }
    }
}

#[async_trait]
impl InferenceEngine for OpenAICompatEngine {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &SamplingParams,
    ) -> Result<Completion, EngineError> {
        if self.unloaded.load(Ordering::Acquire) {
            return Err(EngineError::unloaded(format!(
                "Engine for {} was unloaded",
                self.model
            )));
        }

        let url = format!("{}/chat/completions", self.base_url);
        let request = authorize(self.client.post(&url), self.api_key.as_deref())
            .json(&self.translate_request(messages, params));
        let body = send(request).await?;

        serde_json::from_str(&body).map_err(|e| {
            EngineError::unknown(format!("Failed to parse response: {e} - body: {body}"))
        })
    }

    async fn unload(&self) -> Result<(), EngineError> {
        // The server keeps the weights; this handle just stops accepting work.
        self.unloaded.store(true, Ordering::Release);
        Ok(())
    }

    fn model_key(&self) -> &ModelKey {
        &self.model
    }
}

fn authorize(request: RequestBuilder, api_key: Option<&str>) -> RequestBuilder {
    match api_key {
        Some(key) => request.bearer_auth(key),
        None => request,
    }
}

/// Send a request and return the body of a successful response
async fn send(request: RequestBuilder) -> Result<String, EngineError> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            EngineError::timeout(format!("Request timeout: {e}"))
        } else if e.is_connect() {
            EngineError::network(format!("Connection failed: {e}"))
        } else {
            EngineError::unknown(format!("Request failed: {e}"))
        }
    })?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| EngineError::network(format!("Failed to read response: {e}")))?;

    if status.is_success() {
        Ok(body)
    } else {
        Err(classify_status(status, &body))
    }
}

fn classify_status(status: StatusCode, body: &str) -> EngineError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map_or_else(|_| body.to_string(), |resp| resp.error.message);

    match status.as_u16() {
        400 => EngineError::invalid_request(format!("Invalid request: {message}")),
        401 | 403 => EngineError::unsupported(format!("Authentication failed: {message}")),
        404 => EngineError::not_found(format!("Not found: {message}")),
        408 | 504 => EngineError::timeout(format!("Server timeout: {message}")),
        500..=599 => EngineError::server_error(format!("Server error: {message}")),
        _ => EngineError::unknown(format!("HTTP {status}: {message}")),
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}
