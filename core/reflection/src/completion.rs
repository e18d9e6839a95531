/// Text completion seam between the reflection engine and LLM vendors

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

use crate::error::CompletionError;

/// Opaque text completion: one prompt in, the full generated text out.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;

    /// Provider name for logs
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    Claude,
    OpenAI,
    Ollama,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::Claude => "claude",
            ProviderKind::OpenAI => "openai",
            ProviderKind::Ollama => "ollama",
        }
    }

    /// Environment variable holding the API key, if the provider needs one
    pub fn api_key_var(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Gemini => Some("GEMINI_API_KEY"),
            ProviderKind::Claude => Some("ANTHROPIC_API_KEY"),
            ProviderKind::OpenAI => Some("OPENAI_API_KEY"),
            ProviderKind::Ollama => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "claude" | "anthropic" => Ok(ProviderKind::Claude),
            "openai" | "gpt" => Ok(ProviderKind::OpenAI),
            "ollama" | "local" => Ok(ProviderKind::Ollama),
            other => Err(format!(
                "unknown provider '{other}' (expected gemini, claude, openai or ollama)"
            )),
        }
    }
}

/// Everything needed to construct a provider.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

impl ProviderSettings {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            api_key: None,
            model: None,
            base_url: None,
        }
    }
}
