use chrono::{DateTime, SubsecRound, Utc};
use moodring_schemas::{Influence, InfluenceId, InfluenceLink, LinkId};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use super::{sort_newest_first, window_start, InfluenceStore};
use crate::clock::{Clock, SystemClock};
use crate::error::{StoreError, StoreResult};

#[derive(Default)]
struct Tables {
    influences: BTreeMap<InfluenceId, Influence>,
    links: BTreeMap<LinkId, InfluenceLink>,
    next_influence_id: i64,
    next_link_id: i64,
}

/// In-process store with the same semantics as [`super::SqliteStore`].
pub struct MemoryStore {
    tables: RwLock<Tables>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl InfluenceStore for MemoryStore {
    fn insert_influence(&self, content: &str) -> StoreResult<Influence> {
        let created_at = self.clock.now().trunc_subsecs(6);
        let mut tables = self.write();

        tables.next_influence_id += 1;
        let influence = Influence {
            id: InfluenceId(tables.next_influence_id),
            content: content.to_string(),
            created_at,
        };
        tables.influences.insert(influence.id, influence.clone());

        debug!("Inserted influence: {}", influence.id);
        Ok(influence)
    }

    fn get_influence(&self, id: InfluenceId) -> StoreResult<Option<Influence>> {
        Ok(self.read().influences.get(&id).cloned())
    }

    fn list_influences(&self) -> StoreResult<Vec<Influence>> {
        let mut influences: Vec<Influence> = self.read().influences.values().cloned().collect();
        sort_newest_first(&mut influences);
        Ok(influences)
    }

    fn list_influences_since(&self, since: DateTime<Utc>) -> StoreResult<Vec<Influence>> {
        let since = window_start(since);
        let mut influences: Vec<Influence> = self
            .read()
            .influences
            .values()
            .filter(|i| i.created_at >= since)
            .cloned()
            .collect();
        sort_newest_first(&mut influences);
        Ok(influences)
    }

    fn get_influences_by_ids(&self, ids: &[InfluenceId]) -> StoreResult<Vec<Influence>> {
        let tables = self.read();
        let mut influences: Vec<Influence> = ids
            .iter()
            .filter_map(|id| tables.influences.get(id).cloned())
            .collect();
        sort_newest_first(&mut influences);
        influences.dedup_by_key(|i| i.id);
        Ok(influences)
    }

    fn delete_influence(&self, id: InfluenceId) -> StoreResult<bool> {
        let mut tables = self.write();
        if tables.influences.remove(&id).is_none() {
            return Ok(false);
        }
        tables.links.retain(|_, link| !link.touches(id));
        Ok(true)
    }

    fn insert_link(&self, source_id: InfluenceId, target_id: InfluenceId) -> StoreResult<InfluenceLink> {
        let mut tables = self.write();

        for endpoint in [source_id, target_id] {
            if !tables.influences.contains_key(&endpoint) {
                return Err(StoreError::Constraint(format!(
                    "foreign key violation: influence {endpoint} does not exist"
                )));
            }
        }
        if tables
            .links
            .values()
            .any(|l| l.source_id == source_id && l.target_id == target_id)
        {
            return Err(StoreError::Constraint(format!(
                "unique violation: link {source_id} -> {target_id} already exists"
            )));
        }

        tables.next_link_id += 1;
        let link = InfluenceLink {
            id: LinkId(tables.next_link_id),
            source_id,
            target_id,
        };
        tables.links.insert(link.id, link.clone());
        Ok(link)
    }

    fn find_link(
        &self,
        source_id: InfluenceId,
        target_id: InfluenceId,
    ) -> StoreResult<Option<InfluenceLink>> {
        Ok(self
            .read()
            .links
            .values()
            .find(|l| l.source_id == source_id && l.target_id == target_id)
            .cloned())
    }

    fn list_links_for(&self, id: InfluenceId) -> StoreResult<Vec<InfluenceLink>> {
        Ok(self
            .read()
            .links
            .values()
            .filter(|l| l.touches(id))
            .cloned()
            .collect())
    }

    fn list_links(&self) -> StoreResult<Vec<InfluenceLink>> {
        Ok(self.read().links.values().cloned().collect())
    }

    fn count_influences(&self) -> StoreResult<usize> {
        Ok(self.read().influences.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::Duration;

    #[test]
    fn test_window_and_order() {
        let now: DateTime<Utc> = "2025-11-10T12:00:00Z".parse().unwrap();
        let clock = Arc::new(ManualClock::new(now - Duration::days(8)));
        let store = MemoryStore::new().with_clock(clock.clone());

        store.insert_influence("old").unwrap();
        clock.set(now - Duration::days(6));
        store.insert_influence("recent").unwrap();
        clock.set(now - Duration::hours(1));
        store.insert_influence("newest").unwrap();

        let recent = store.list_influences_since(now - Duration::days(7)).unwrap();
        let contents: Vec<_> = recent.iter().map(|i| i.content.as_str()).collect();
        assert_eq!(contents, vec!["newest", "recent"]);
        assert_eq!(store.list_influences().unwrap().len(), 3);
    }

    #[test]
    fn test_delete_cascades_links() {
        let store = MemoryStore::new();
        let a = store.insert_influence("a").unwrap();
        let b = store.insert_influence("b").unwrap();
        store.insert_link(a.id, b.id).unwrap();

        assert!(store.delete_influence(a.id).unwrap());
        assert!(store.list_links_for(b.id).unwrap().is_empty());
        assert!(!store.delete_influence(a.id).unwrap());
    }

    #[test]
    fn test_link_constraints() {
        let store = MemoryStore::new();
        let a = store.insert_influence("a").unwrap();
        let b = store.insert_influence("b").unwrap();

        store.insert_link(a.id, b.id).unwrap();
        assert!(matches!(store.insert_link(a.id, b.id), Err(StoreError::Constraint(_))));
        assert!(matches!(
            store.insert_link(a.id, InfluenceId(42)),
            Err(StoreError::Constraint(_))
        ));
        assert!(store.insert_link(b.id, a.id).is_ok());
    }
}
