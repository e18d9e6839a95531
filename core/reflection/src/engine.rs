use chrono::Duration;
use moodring_journal::{connected_ids, Clock, InfluenceRepository, SystemClock};
use moodring_schemas::{InfluenceId, Reflection};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::completion::CompletionService;
use crate::error::ReflectionError;
use crate::prompts::PromptBuilder;

/// Length of the weekly reflection window.
pub const REFLECTION_WINDOW_DAYS: i64 = 7;

pub const WEEKLY_EMPTY_MESSAGE: &str =
    "You haven't added any influences in the last week. Add some thoughts to get your first reflection!";
pub const WEEKLY_FAILURE_MESSAGE: &str = "Sorry, I was unable to generate a reflection at this time.";
pub const CONNECTIONS_EMPTY_MESSAGE: &str =
    "This influence has no connections yet. Link it to another thought to see how they relate.";
pub const CONNECTIONS_FAILURE_MESSAGE: &str = "Failed to analyze connections. Please try again.";

/// Builds prompts from journal data and delegates summarization to a completion service.
///
/// Every call is independent: no caching, no retries. The engine only reads
/// from the journal.
pub struct ReflectionEngine {
    repository: InfluenceRepository,
    completion: Arc<dyn CompletionService>,
    clock: Arc<dyn Clock>,
    prompts: PromptBuilder,
}

impl ReflectionEngine {
    pub fn new(repository: InfluenceRepository, completion: Arc<dyn CompletionService>) -> Self {
        Self {
            repository,
            completion,
            clock: Arc::new(SystemClock),
            prompts: PromptBuilder::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Themes across the last seven days. Failures become one generic message.
    pub async fn weekly_reflection(&self) -> Reflection {
        match self.try_weekly_reflection().await {
            Ok(reflection) => reflection,
            Err(e) => {
                error!("Weekly reflection failed: {}", e);
                Reflection::Failed(WEEKLY_FAILURE_MESSAGE.to_string())
            }
        }
    }

    pub async fn try_weekly_reflection(&self) -> Result<Reflection, ReflectionError> {
        let since = self.clock.now() - Duration::days(REFLECTION_WINDOW_DAYS);
        let mut influences = self.repository.list_influences_since(since)?;

        if influences.is_empty() {
            warn!("No influences since {}, skipping weekly reflection", since);
            return Ok(Reflection::EmptyState(WEEKLY_EMPTY_MESSAGE.to_string()));
        }

        // Oldest first so the model reads the week in order.
        influences.reverse();
        let prompt = self.prompts.weekly(&influences);

        info!(
            "Requesting weekly reflection over {} influence(s) from {}",
            influences.len(),
            self.completion.name()
        );
        let summary = self.completion.complete(&prompt).await?;
        Ok(Reflection::Generated(summary))
    }

    /// How one influence relates to the influences linked to it.
    pub async fn analyze_connections(&self, id: InfluenceId) -> Reflection {
        match self.try_analyze_connections(id).await {
            Ok(reflection) => reflection,
            Err(e) => {
                error!("Connection analysis for influence {} failed: {}", id, e);
                Reflection::Failed(CONNECTIONS_FAILURE_MESSAGE.to_string())
            }
        }
    }

    pub async fn try_analyze_connections(&self, id: InfluenceId) -> Result<Reflection, ReflectionError> {
        let main = self.repository.get_influence(id)?;
        let links = self.repository.list_links_for(id)?;

        let others = connected_ids(id, &links);
        let linked = self.repository.list_influences_by_ids(others)?;

        if linked.is_empty() {
            warn!("Influence {} has no connections to analyze", id);
            return Ok(Reflection::EmptyState(CONNECTIONS_EMPTY_MESSAGE.to_string()));
        }

        let prompt = self.prompts.connections(&main, &linked);

        info!(
            "Requesting connection analysis for influence {} ({} linked) from {}",
            id,
            linked.len(),
            self.completion.name()
        );
        let analysis = self.completion.complete(&prompt).await?;
        Ok(Reflection::Generated(analysis))
    }
}
