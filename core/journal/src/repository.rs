use chrono::{DateTime, Utc};
use moodring_schemas::{Influence, InfluenceId, InfluenceLink};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::dictation::{capture_utterance, DictationError, DictationSource};
use crate::error::{JournalError, Result};
use crate::store::InfluenceStore;

/// Typed operations over an [`InfluenceStore`]. The only read/write path into the journal.
#[derive(Clone)]
pub struct InfluenceRepository {
    store: Arc<dyn InfluenceStore>,
}

impl InfluenceRepository {
    pub fn new(store: Arc<dyn InfluenceStore>) -> Self {
        Self { store }
    }

    /// Persist a new influence. Blank content is rejected before the store is touched.
    pub fn create_influence(&self, content: &str) -> Result<Influence> {
        let content = content.trim();
        if content.is_empty() {
            return Err(JournalError::EmptyContent);
        }

        let influence = self.store.insert_influence(content)?;
        info!("Created influence {}", influence.id);
        Ok(influence)
    }

    /// Capture one utterance from `source` and persist it.
    ///
    /// Returns `Ok(None)` when nothing was said; the outer error carries
    /// recognition failures, the inner one journal failures.
    pub fn create_from_dictation(
        &self,
        source: &mut dyn DictationSource,
    ) -> std::result::Result<Option<Result<Influence>>, DictationError> {
        let transcript = capture_utterance(source)?;
        if transcript.trim().is_empty() {
            debug!("Dictation finished without speech");
            return Ok(None);
        }
        Ok(Some(self.create_influence(&transcript)))
    }

    pub fn get_influence(&self, id: InfluenceId) -> Result<Influence> {
        self.store
            .get_influence(id)?
            .ok_or(JournalError::NotFound(id))
    }

    /// Every influence, newest first.
    pub fn list_influences(&self) -> Result<Vec<Influence>> {
        Ok(self.store.list_influences()?)
    }

    pub fn list_influences_since(&self, since: DateTime<Utc>) -> Result<Vec<Influence>> {
        let influences = self.store.list_influences_since(since)?;
        debug!("{} influence(s) since {}", influences.len(), since);
        Ok(influences)
    }

    /// Batch lookup. Duplicate ids are collapsed and unknown ids skipped.
    pub fn list_influences_by_ids<I>(&self, ids: I) -> Result<Vec<Influence>>
    where
        I: IntoIterator<Item = InfluenceId>,
    {
        let unique: Vec<InfluenceId> = ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        if unique.is_empty() {
            return Ok(Vec::new());
        }

        let influences = self.store.get_influences_by_ids(&unique)?;
        if influences.len() < unique.len() {
            warn!(
                "{} of {} requested influence(s) no longer exist",
                unique.len() - influences.len(),
                unique.len()
            );
        }
        Ok(influences)
    }

    /// Delete an influence together with every link touching it.
    pub fn delete_influence(&self, id: InfluenceId) -> Result<()> {
        if self.store.delete_influence(id)? {
            info!("Deleted influence {}", id);
            Ok(())
        } else {
            Err(JournalError::NotFound(id))
        }
    }

    /// Link `source_id` to `target_id`.
    ///
    /// Both influences must exist and be distinct. Linking the same pair in the
    /// same direction again returns the existing link.
    pub fn create_link(&self, source_id: InfluenceId, target_id: InfluenceId) -> Result<InfluenceLink> {
        if source_id == target_id {
            return Err(JournalError::SelfLink(source_id));
        }

        for endpoint in [source_id, target_id] {
            if self.store.get_influence(endpoint)?.is_none() {
                return Err(JournalError::NotFound(endpoint));
            }
        }

        if let Some(existing) = self.store.find_link(source_id, target_id)? {
            info!(
                "Link already exists: {} -> {} ({})",
                source_id, target_id, existing.id
            );
            return Ok(existing);
        }

        let link = self.store.insert_link(source_id, target_id)?;
        info!("Created link: {} -> {} ({})", source_id, target_id, link.id);
        Ok(link)
    }

    /// Links where `id` is either endpoint.
    pub fn list_links_for(&self, id: InfluenceId) -> Result<Vec<InfluenceLink>> {
        Ok(self.store.list_links_for(id)?)
    }

    pub fn list_links(&self) -> Result<Vec<InfluenceLink>> {
        Ok(self.store.list_links()?)
    }

    pub fn count_influences(&self) -> Result<usize> {
        Ok(self.store.count_influences()?)
    }
}

/// The far end of every link touching `id`, without duplicates.
pub fn connected_ids(id: InfluenceId, links: &[InfluenceLink]) -> BTreeSet<InfluenceId> {
    links.iter().filter_map(|link| link.other_end(id)).collect()
}
