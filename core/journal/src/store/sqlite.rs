use chrono::{DateTime, SubsecRound, Utc};
use moodring_schemas::{Influence, InfluenceId, InfluenceLink, LinkId};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use super::{format_timestamp, parse_timestamp, window_start, InfluenceStore};
use crate::clock::{Clock, SystemClock};
use crate::error::{StoreError, StoreResult};

const INFLUENCE_COLUMNS: &str = "id, content, created_at";
const LINK_COLUMNS: &str = "id, source_id, target_id";

/// SQLite-backed store. One connection, serialised behind a mutex.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
}

impl SqliteStore {
    /// Open (or create) the database file, creating parent directories as needed
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let store = Self::from_connection(Connection::open(path)?)?;
        info!("Journal database initialized at: {}", path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Replace the clock used to stamp `created_at`
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;

        let store = Self {
            conn: Mutex::new(conn),
            clock: Arc::new(SystemClock),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock cannot leave a half-applied statement behind.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create tables and indexes
    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS influences (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS influence_links (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_id INTEGER NOT NULL,
                target_id INTEGER NOT NULL,
                UNIQUE (source_id, target_id),
                FOREIGN KEY (source_id) REFERENCES influences(id) ON DELETE CASCADE,
                FOREIGN KEY (target_id) REFERENCES influences(id) ON DELETE CASCADE
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_influences_created_at
             ON influences(created_at DESC)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_influence_links_source
             ON influence_links(source_id)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_influence_links_target
             ON influence_links(target_id)",
            [],
        )?;

        Ok(())
    }

    fn query_influences<P: rusqlite::Params>(&self, sql: &str, params: P) -> StoreResult<Vec<Influence>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(sql)?;
        let influences = stmt
            .query_map(params, row_to_influence)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(influences)
    }

    fn query_links<P: rusqlite::Params>(&self, sql: &str, params: P) -> StoreResult<Vec<InfluenceLink>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(sql)?;
        let links = stmt
            .query_map(params, row_to_link)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(links)
    }
}

impl InfluenceStore for SqliteStore {
    fn insert_influence(&self, content: &str) -> StoreResult<Influence> {
        let created_at = self.clock.now().trunc_subsecs(6);
        let conn = self.conn();

        conn.execute(
            "INSERT INTO influences (content, created_at) VALUES (?1, ?2)",
            params![content, format_timestamp(created_at)],
        )?;

        let id = InfluenceId(conn.last_insert_rowid());
        debug!("Inserted influence: {}", id);

        Ok(Influence {
            id,
            content: content.to_string(),
            created_at,
        })
    }

    fn get_influence(&self, id: InfluenceId) -> StoreResult<Option<Influence>> {
        let influence = self
            .conn()
            .query_row(
                &format!("SELECT {INFLUENCE_COLUMNS} FROM influences WHERE id = ?1"),
                params![id.0],
                row_to_influence,
            )
            .optional()?;

        Ok(influence)
    }

    fn list_influences(&self) -> StoreResult<Vec<Influence>> {
        self.query_influences(
            &format!(
                "SELECT {INFLUENCE_COLUMNS} FROM influences
                 ORDER BY created_at DESC, id DESC"
            ),
            [],
        )
    }

    fn list_influences_since(&self, since: DateTime<Utc>) -> StoreResult<Vec<Influence>> {
        self.query_influences(
            &format!(
                "SELECT {INFLUENCE_COLUMNS} FROM influences
                 WHERE created_at >= ?1
                 ORDER BY created_at DESC, id DESC"
            ),
            params![format_timestamp(window_start(since))],
        )
    }

    fn get_influences_by_ids(&self, ids: &[InfluenceId]) -> StoreResult<Vec<Influence>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        self.query_influences(
            &format!(
                "SELECT {INFLUENCE_COLUMNS} FROM influences
                 WHERE id IN ({placeholders})
                 ORDER BY created_at DESC, id DESC"
            ),
            params_from_iter(ids.iter().map(|id| id.0)),
        )
    }

    fn delete_influence(&self, id: InfluenceId) -> StoreResult<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        // Explicit so databases created without foreign keys enabled still cascade.
        let links_removed = tx.execute(
            "DELETE FROM influence_links WHERE source_id = ?1 OR target_id = ?1",
            params![id.0],
        )?;
        let removed = tx.execute("DELETE FROM influences WHERE id = ?1", params![id.0])?;

        tx.commit()?;

        if removed > 0 {
            info!("Deleted influence {} and {} link(s)", id, links_removed);
        }
        Ok(removed > 0)
    }

    fn insert_link(&self, source_id: InfluenceId, target_id: InfluenceId) -> StoreResult<InfluenceLink> {
        let conn = self.conn();

        conn.execute(
            "INSERT INTO influence_links (source_id, target_id) VALUES (?1, ?2)",
            params![source_id.0, target_id.0],
        )
        .map_err(constraint_error)?;

        let id = LinkId(conn.last_insert_rowid());
        debug!("Inserted link {}: {} -> {}", id, source_id, target_id);

        Ok(InfluenceLink {
            id,
            source_id,
            target_id,
        })
    }

    fn find_link(
        &self,
        source_id: InfluenceId,
        target_id: InfluenceId,
    ) -> StoreResult<Option<InfluenceLink>> {
        let link = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {LINK_COLUMNS} FROM influence_links
                     WHERE source_id = ?1 AND target_id = ?2"
                ),
                params![source_id.0, target_id.0],
                row_to_link,
            )
            .optional()?;

        Ok(link)
    }

    fn list_links_for(&self, id: InfluenceId) -> StoreResult<Vec<InfluenceLink>> {
        self.query_links(
            &format!(
                "SELECT {LINK_COLUMNS} FROM influence_links
                 WHERE source_id = ?1 OR target_id = ?1
                 ORDER BY id"
            ),
            params![id.0],
        )
    }

    fn list_links(&self) -> StoreResult<Vec<InfluenceLink>> {
        self.query_links(
            &format!("SELECT {LINK_COLUMNS} FROM influence_links ORDER BY id"),
            [],
        )
    }

    fn count_influences(&self) -> StoreResult<usize> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM influences", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn row_to_influence(row: &Row) -> rusqlite::Result<Influence> {
    let raw: String = row.get(2)?;
    let created_at = parse_timestamp(&raw).map_err(timestamp_error)?;

    Ok(Influence {
        id: InfluenceId(row.get(0)?),
        content: row.get(1)?,
        created_at,
    })
}

fn row_to_link(row: &Row) -> rusqlite::Result<InfluenceLink> {
    Ok(InfluenceLink {
        id: LinkId(row.get(0)?),
        source_id: InfluenceId(row.get(1)?),
        target_id: InfluenceId(row.get(2)?),
    })
}

/// Foreign key and unique failures are reported as constraint violations, not outages.
fn constraint_error(err: rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(code, message) if code.code == ErrorCode::ConstraintViolation => {
            StoreError::Constraint(message.unwrap_or_else(|| code.to_string()))
        }
        other => StoreError::Sqlite(other),
    }
}

fn timestamp_error(err: StoreError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(err))
}
