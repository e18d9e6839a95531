use anyhow::{Context, Result};
use async_trait::async_trait;
use moodring_journal::{InfluenceRepository, SqliteStore};
use moodring_reflection::{
    build_provider, CompletionError, CompletionService, ReflectionEngine,
    CONNECTIONS_FAILURE_MESSAGE, WEEKLY_FAILURE_MESSAGE,
};
use moodring_schemas::{InfluenceId, Reflection};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::ServiceConfig;

/// Shared handles for request handlers and CLI commands
#[derive(Clone)]
pub struct AppState {
    pub repository: InfluenceRepository,
    engine: Arc<ReflectionEngine>,
    completion_timeout: Option<Duration>,
}

impl AppState {
    pub fn new(repository: InfluenceRepository, engine: ReflectionEngine) -> Self {
        Self {
            repository,
            engine: Arc::new(engine),
            completion_timeout: None,
        }
    }

    pub fn with_completion_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.completion_timeout = timeout;
        self
    }

    /// Open the SQLite journal and build the configured completion provider.
    ///
    /// A provider that cannot be built (usually a missing API key) does not stop
    /// startup. Journaling still works and reflections report the generic failure.
    pub fn open(config: &ServiceConfig) -> Result<Self> {
        let store = SqliteStore::open(&config.db_path)
            .with_context(|| format!("failed to open journal at {}", config.db_path.display()))?;
        info!("Journal opened at: {}", config.db_path.display());

        let completion: Arc<dyn CompletionService> = match build_provider(&config.provider) {
            Ok(provider) => {
                info!("Reflections use the {} provider", provider.name());
                provider
            }
            Err(e) => {
                warn!("Reflections are unavailable: {}", e);
                Arc::new(UnconfiguredCompletion(e.to_string()))
            }
        };

        let repository = InfluenceRepository::new(Arc::new(store));
        let engine = ReflectionEngine::new(repository.clone(), completion);

        Ok(Self::new(repository, engine).with_completion_timeout(config.completion_timeout))
    }

    pub async fn weekly_reflection(&self) -> Reflection {
        self.bounded(self.engine.weekly_reflection(), WEEKLY_FAILURE_MESSAGE)
            .await
    }

    pub async fn analyze_connections(&self, id: InfluenceId) -> Reflection {
        self.bounded(self.engine.analyze_connections(id), CONNECTIONS_FAILURE_MESSAGE)
            .await
    }

    async fn bounded<F>(&self, flow: F, failure_message: &str) -> Reflection
    where
        F: Future<Output = Reflection>,
    {
        let Some(limit) = self.completion_timeout else {
            return flow.await;
        };

        match tokio::time::timeout(limit, flow).await {
            Ok(reflection) => reflection,
            Err(_) => {
                error!("Reflection did not finish within {:?}", limit);
                Reflection::Failed(failure_message.to_string())
            }
        }
    }
}

/// Stands in for a provider that failed to build. Every call reports why.
struct UnconfiguredCompletion(String);

#[async_trait]
impl CompletionService for UnconfiguredCompletion {
    async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
        Err(CompletionError::Config(self.0.clone()))
    }

    fn name(&self) -> &'static str {
        "unconfigured"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moodring_journal::MemoryStore;
    use moodring_reflection::{ProviderKind, ProviderSettings};
    use std::net::SocketAddr;
    use tempfile::TempDir;

    /// Never answers
    struct Stalled;

    #[async_trait]
    impl CompletionService for Stalled {
        async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
            std::future::pending().await
        }

        fn name(&self) -> &'static str {
            "stalled"
        }
    }

    fn stalled_state(timeout: Option<Duration>) -> AppState {
        let repository = InfluenceRepository::new(Arc::new(MemoryStore::new()));
        let engine = ReflectionEngine::new(repository.clone(), Arc::new(Stalled));
        AppState::new(repository, engine).with_completion_timeout(timeout)
    }

    #[tokio::test]
    async fn test_timeout_becomes_generic_failure() {
        let state = stalled_state(Some(Duration::from_millis(20)));
        let first = state.repository.create_influence("Went for a long walk").unwrap();
        let second = state.repository.create_influence("Slept well").unwrap();
        state.repository.create_link(first.id, second.id).unwrap();

        let weekly = state.weekly_reflection().await;
        assert_eq!(weekly, Reflection::Failed(WEEKLY_FAILURE_MESSAGE.to_string()));

        let analysis = state.analyze_connections(first.id).await;
        assert_eq!(analysis, Reflection::Failed(CONNECTIONS_FAILURE_MESSAGE.to_string()));
    }

    #[tokio::test]
    async fn test_empty_state_needs_no_completion() {
        let state = stalled_state(None);
        let reflection = state.weekly_reflection().await;
        assert!(matches!(reflection, Reflection::EmptyState(_)));

        let lonely = state.repository.create_influence("Alone").unwrap();
        let reflection = state.analyze_connections(lonely.id).await;
        assert!(matches!(reflection, Reflection::EmptyState(_)));
    }

    #[tokio::test]
    async fn test_open_without_api_key_still_journals() {
        let dir = TempDir::new().unwrap();
        let config = ServiceConfig {
            db_path: dir.path().join("nested").join("moodring.db"),
            addr: "127.0.0.1:0".parse::<SocketAddr>().unwrap(),
            provider: ProviderSettings::new(ProviderKind::Gemini),
            completion_timeout: None,
        };

        let state = AppState::open(&config).unwrap();
        state.repository.create_influence("Tried a new recipe").unwrap();

        let reflection = state.weekly_reflection().await;
        assert_eq!(reflection, Reflection::Failed(WEEKLY_FAILURE_MESSAGE.to_string()));
        assert!(!reflection.text().contains("GEMINI_API_KEY"));

        let missing = state.analyze_connections(InfluenceId(999)).await;
        assert!(missing.is_failure());
    }
}
