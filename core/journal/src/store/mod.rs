//! Persistence boundary for influences and links.
//!
//! The store owns identity and timestamps: ids and `created_at` are assigned
//! here and never by callers. Implementations must delete every link touching
//! an influence in the same call that deletes the influence.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use moodring_schemas::{Influence, InfluenceId, InfluenceLink};

use crate::error::{StoreError, StoreResult};

/// CRUD over the `influences` and `influence_links` tables.
pub trait InfluenceStore: Send + Sync {
    /// Insert a new influence. `content` is stored as given.
    fn insert_influence(&self, content: &str) -> StoreResult<Influence>;

    fn get_influence(&self, id: InfluenceId) -> StoreResult<Option<Influence>>;

    /// All influences, newest first.
    fn list_influences(&self) -> StoreResult<Vec<Influence>>;

    /// Influences with `created_at >= since`, newest first.
    fn list_influences_since(&self, since: DateTime<Utc>) -> StoreResult<Vec<Influence>>;

    /// Influences whose id is in `ids`, newest first. Unknown ids are skipped.
    fn get_influences_by_ids(&self, ids: &[InfluenceId]) -> StoreResult<Vec<Influence>>;

    /// Delete an influence and every link touching it. Returns false if no such influence.
    fn delete_influence(&self, id: InfluenceId) -> StoreResult<bool>;

    fn insert_link(&self, source_id: InfluenceId, target_id: InfluenceId) -> StoreResult<InfluenceLink>;

    fn find_link(
        &self,
        source_id: InfluenceId,
        target_id: InfluenceId,
    ) -> StoreResult<Option<InfluenceLink>>;

    /// Links where `id` is either the source or the target.
    fn list_links_for(&self, id: InfluenceId) -> StoreResult<Vec<InfluenceLink>>;

    fn list_links(&self) -> StoreResult<Vec<InfluenceLink>>;

    fn count_influences(&self) -> StoreResult<usize>;
}

/// Fixed-width RFC 3339 in UTC, so lexical order in the database matches time order.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidTimestamp(format!("{raw}: {e}")))
}

/// Lower bound of a `since` query at stored precision. Stored timestamps are whole
/// microseconds, so a bound with a sub-microsecond part rounds up to the next one.
pub(crate) fn window_start(since: DateTime<Utc>) -> DateTime<Utc> {
    let truncated = since.trunc_subsecs(6);
    if truncated < since {
        truncated + Duration::microseconds(1)
    } else {
        truncated
    }
}

/// Newest first, ties broken by id so the order is stable.
pub(crate) fn sort_newest_first(influences: &mut [Influence]) {
    influences.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_format_is_fixed_width() {
        let whole: DateTime<Utc> = "2025-11-02T18:00:00Z".parse().unwrap();
        let fractional: DateTime<Utc> = "2025-11-02T18:00:00.5Z".parse().unwrap();

        let a = format_timestamp(whole);
        let b = format_timestamp(fractional);
        assert_eq!(a, "2025-11-02T18:00:00.000000Z");
        assert_eq!(a.len(), b.len());
        assert!(a < b);

        assert_eq!(parse_timestamp(&b).unwrap(), fractional);
    }

    #[test]
    fn test_window_start_rounds_up_to_stored_precision() {
        let t: DateTime<Utc> = "2025-11-02T18:00:00.000001Z".parse().unwrap();
        assert_eq!(window_start(t), t);
        assert_eq!(
            window_start(t + Duration::nanoseconds(500)),
            t + Duration::microseconds(1)
        );
    }

    /// Sub-microsecond bounds must agree across backends.
    #[test]
    fn test_since_boundary_matches_across_stores() {
        use crate::clock::ManualClock;
        use std::sync::Arc;

        let t: DateTime<Utc> = "2025-11-10T12:00:00Z".parse().unwrap();
        let stores: Vec<Box<dyn InfluenceStore>> = vec![
            Box::new(SqliteStore::open_in_memory().unwrap().with_clock(Arc::new(ManualClock::new(t)))),
            Box::new(MemoryStore::new().with_clock(Arc::new(ManualClock::new(t)))),
        ];

        for store in stores {
            store.insert_influence("on the boundary").unwrap();
            assert_eq!(store.list_influences_since(t).unwrap().len(), 1);
            assert!(store
                .list_influences_since(t + Duration::nanoseconds(500))
                .unwrap()
                .is_empty());
            assert_eq!(
                store
                    .list_influences_since(t - Duration::nanoseconds(500))
                    .unwrap()
                    .len(),
                1
            );
        }
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(StoreError::InvalidTimestamp(_))
        ));
    }
}
