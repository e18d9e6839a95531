use anyhow::{Context, Result};
use clap::Args;
use moodring_reflection::{ProviderKind, ProviderSettings};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_ADDR: &str = "127.0.0.1:21960";

/// Flags shared by the service and the CLI. Each one overrides its environment variable.
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigArgs {
    /// Path to SQLite database file [env: MOODRING_DB_PATH]
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    /// Completion provider: gemini, claude, openai or ollama [env: MOODRING_PROVIDER]
    #[arg(long, global = true)]
    pub provider: Option<ProviderKind>,

    /// Model name for the provider [env: MOODRING_MODEL]
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Base URL for the provider API [env: MOODRING_PROVIDER_URL]
    #[arg(long, global = true)]
    pub provider_url: Option<String>,

    /// Give up on a reflection after this many seconds, 0 to wait indefinitely
    /// [env: MOODRING_COMPLETION_TIMEOUT_SECS]
    #[arg(long, global = true)]
    pub completion_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub provider: ProviderSettings,
    pub completion_timeout: Option<Duration>,
}

impl ServiceConfig {
    /// Environment first, then flags on top
    pub fn load(args: &ConfigArgs) -> Result<Self> {
        Self::resolve(args, |key| std::env::var(key).ok())
    }

    fn resolve<F>(args: &ConfigArgs, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let db_path = match &args.db_path {
            Some(path) => path.clone(),
            None => var("MOODRING_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| default_db_path(var("HOME"))),
        };

        let addr = var("MOODRING_ADDR")
            .unwrap_or_else(|| DEFAULT_ADDR.to_string())
            .parse()
            .context("MOODRING_ADDR must be a socket address like 127.0.0.1:21960")?;

        let kind = match (args.provider, var("MOODRING_PROVIDER")) {
            (Some(kind), _) => kind,
            (None, Some(raw)) => raw.parse::<ProviderKind>().map_err(anyhow::Error::msg)?,
            (None, None) => ProviderKind::Gemini,
        };

        let timeout_secs = match (args.completion_timeout_secs, var("MOODRING_COMPLETION_TIMEOUT_SECS")) {
            (Some(secs), _) => secs,
            (None, Some(raw)) => raw
                .trim()
                .parse()
                .context("MOODRING_COMPLETION_TIMEOUT_SECS must be a whole number of seconds")?,
            (None, None) => 0,
        };

        let mut provider = ProviderSettings::new(kind);
        provider.api_key = kind.api_key_var().and_then(|key| var(key));
        provider.model = args.model.clone().or_else(|| var("MOODRING_MODEL"));
        provider.base_url = args.provider_url.clone().or_else(|| var("MOODRING_PROVIDER_URL"));
        if kind == ProviderKind::Ollama {
            provider.model = provider.model.or_else(|| var("OLLAMA_MODEL"));
            provider.base_url = provider.base_url.or_else(|| var("OLLAMA_HOST"));
        }

        Ok(Self {
            db_path,
            addr,
            provider,
            completion_timeout: timeout_from_secs(timeout_secs),
        })
    }
}

fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn default_db_path(home: Option<String>) -> PathBuf {
    match home {
        Some(home) => PathBuf::from(home).join(".local/share/moodring/moodring.db"),
        None => PathBuf::from("moodring.db"),
    }
}
