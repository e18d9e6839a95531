/// LLM providers for reflections
/// Gemini, Claude and OpenAI over their hosted APIs, Ollama for local inference

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::completion::{CompletionService, ProviderKind, ProviderSettings};
use crate::error::CompletionError;

const MAX_OUTPUT_TOKENS: u32 = 1000;
const TEMPERATURE: f32 = 0.7;

/// Build the provider described by `settings`.
pub fn build_provider(settings: &ProviderSettings) -> Result<Arc<dyn CompletionService>, CompletionError> {
    let api_key = || {
        settings.api_key.clone().filter(|k| !k.trim().is_empty()).ok_or_else(|| {
            CompletionError::Config(format!(
                "{} requires an API key ({})",
                settings.kind,
                settings.kind.api_key_var().unwrap_or("api key")
            ))
        })
    };

    let provider: Arc<dyn CompletionService> = match settings.kind {
        ProviderKind::Gemini => Arc::new(
            GeminiProvider::new(api_key()?, settings.model.clone())
                .with_base_url(settings.base_url.clone()),
        ),
        ProviderKind::Claude => Arc::new(
            ClaudeProvider::new(api_key()?, settings.model.clone())
                .with_base_url(settings.base_url.clone()),
        ),
        ProviderKind::OpenAI => Arc::new(
            OpenAIProvider::new(api_key()?, settings.model.clone())
                .with_base_url(settings.base_url.clone()),
        ),
        ProviderKind::Ollama => Arc::new(OllamaProvider::new(
            settings.model.clone(),
            settings.base_url.clone(),
        )),
    };

    Ok(provider)
}

/// Reject non-success responses, keeping the body for the log
async fn check_status(provider: &'static str, response: Response) -> Result<Response, CompletionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(CompletionError::Api {
        provider,
        status: status.as_u16(),
        body,
    })
}

// ============================================================================
// Gemini
// ============================================================================

/// Google Gemini provider (generateContent)
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(api_key: String, model: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model: model.unwrap_or_else(|| "gemini-2.5-flash".to_string()),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        if let Some(url) = base_url {
            self.base_url = url;
        }
        self
    }
}

#[async_trait]
impl CompletionService for GeminiProvider {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let request_body = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "temperature": TEMPERATURE,
                "maxOutputTokens": MAX_OUTPUT_TOKENS
            }
        });

        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body)
            .send()
            .await?;

        let response_json: GeminiResponse = check_status(self.name(), response).await?.json().await?;
        debug!("Gemini returned {} candidate(s)", response_json.candidates.len());
        gemini_text(response_json)
    }

    fn name(&self) -> &'static str {
        "Gemini"
    }
}

fn gemini_text(response: GeminiResponse) -> Result<String, CompletionError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.is_empty() {
        Err(CompletionError::EmptyResponse("Gemini"))
    } else {
        Ok(text)
    }
}

// ============================================================================
// Claude
// ============================================================================

/// Claude provider for Anthropic's Messages API
pub struct ClaudeProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl ClaudeProvider {
    pub fn new(api_key: String, model: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model: model.unwrap_or_else(|| "claude-3-5-sonnet-20241022".to_string()),
            base_url: "https://api.anthropic.com".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        if let Some(url) = base_url {
            self.base_url = url;
        }
        self
    }
}

#[async_trait]
impl CompletionService for ClaudeProvider {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let request_body = json!({
            "model": self.model,
            "max_tokens": MAX_OUTPUT_TOKENS,
            "messages": [{
                "role": "user",
                "content": prompt
            }]
        });

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request_body)
            .send()
            .await?;

        let response_json: ClaudeResponse = check_status(self.name(), response).await?.json().await?;
        claude_text(response_json)
    }

    fn name(&self) -> &'static str {
        "Claude"
    }
}

fn claude_text(response: ClaudeResponse) -> Result<String, CompletionError> {
    let text: String = response
        .content
        .into_iter()
        .filter_map(|block| block.text)
        .collect::<Vec<_>>()
        .join("");

    if text.is_empty() {
        Err(CompletionError::EmptyResponse("Claude"))
    } else {
        Ok(text)
    }
}

// ============================================================================
// OpenAI
// ============================================================================

/// OpenAI chat completions provider
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAIProvider {
    pub fn new(api_key: String, model: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model: model.unwrap_or_else(|| "gpt-4o-mini".to_string()),
            base_url: "https://api.openai.com".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        if let Some(url) = base_url {
            self.base_url = url;
        }
        self
    }
}

#[async_trait]
impl CompletionService for OpenAIProvider {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let request_body = json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": prompt
            }],
            "temperature": TEMPERATURE,
            "max_tokens": MAX_OUTPUT_TOKENS
        });

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await?;

        let response_json: OpenAIResponse = check_status(self.name(), response).await?.json().await?;
        response_json
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.is_empty())
            .ok_or(CompletionError::EmptyResponse("OpenAI"))
    }

    fn name(&self) -> &'static str {
        "OpenAI"
    }
}

// ============================================================================
// Ollama
// ============================================================================

/// Ollama provider for local LLM inference
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(model: Option<String>, base_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.unwrap_or_else(|| "http://localhost:11434".to_string()),
            model: model.unwrap_or_else(|| "llama3.2".to_string()),
        }
    }
}

#[async_trait]
impl CompletionService for OllamaProvider {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let request_body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false
        });

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request_body)
            .send()
            .await?;

        let response_json: OllamaResponse = check_status(self.name(), response).await?.json().await?;
        if response_json.response.is_empty() {
            return Err(CompletionError::EmptyResponse("Ollama"));
        }
        Ok(response_json.response)
    }

    fn name(&self) -> &'static str {
        "Ollama"
    }
}

// Response structures
#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContent>,
}

#[derive(Debug, Deserialize)]
struct ClaudeContent {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}
