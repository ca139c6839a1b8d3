//! `SQLite`-backed registry store.
//!
//! One row per record with the fingerprint stored as five flat columns. No
//! vector data is ever written here; the similarity index is rebuilt from
//! embeddings, not from this table.

use crate::models::{
    CanonicalFingerprint, Category, DuplicateLevel, RecordId, RecordStatus, RegistryRecord, Tier,
};
use crate::storage::traits::RegistryStore;
use crate::storage::{acquire_lock, record_operation_metrics};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing::instrument;

const COLUMNS: &str = "id, setting, primary_fear, antagonist, mechanism, twist, category, \
     created_at, usage_count, last_used_at, dedup_score, dedup_signal, last_outcome, \
     status, superseded_by";

const SECONDARY_INDEXES: &[(&str, &str)] = &[
    (
        "idx_registry_status_usage",
        "CREATE INDEX IF NOT EXISTS idx_registry_status_usage
         ON registry_records(status, usage_count)",
    ),
    (
        "idx_registry_fear",
        "CREATE INDEX IF NOT EXISTS idx_registry_fear ON registry_records(primary_fear)",
    ),
];

/// `SQLite` registry store.
///
/// # Concurrency Model
///
/// Uses a `Mutex<Connection>` because `rusqlite::Connection` is not `Sync`.
/// WAL mode and `busy_timeout` let other processes read while this one writes.
pub struct SqliteRegistryStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteRegistryStore {
    /// Opens (or creates) a registry database at `db_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::operation("create_registry_dir", e))?;
        }
        let conn = Connection::open(&db_path).map_err(|e| Error::operation("open_sqlite", e))?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory database (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::operation("open_sqlite_in_memory", e))?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        configure_connection(&conn);

        conn.execute(
            "CREATE TABLE IF NOT EXISTS registry_records (
                id TEXT PRIMARY KEY,
                setting TEXT NOT NULL,
                primary_fear TEXT NOT NULL,
                antagonist TEXT NOT NULL,
                mechanism TEXT NOT NULL,
                twist TEXT NOT NULL,
                category TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                usage_count INTEGER NOT NULL DEFAULT 0,
                last_used_at INTEGER,
                dedup_score REAL NOT NULL DEFAULT 0,
                dedup_signal TEXT,
                last_outcome TEXT,
                status TEXT NOT NULL,
                superseded_by TEXT
            )",
            [],
        )
        .map_err(|e| Error::operation("create_registry_table", e))?;

        // Secondary indexes only speed up external readers; the store works without them.
        for (name, sql) in SECONDARY_INDEXES {
            if let Err(e) = conn.execute(sql, []) {
                tracing::warn!(index = name, error = %e, "Failed to create registry index");
            }
        }

        Ok(())
    }
}

/// Applies WAL, NORMAL synchronous and a 5 second busy timeout.
fn configure_connection(conn: &Connection) {
    // journal_mode returns a row, so pragma failures are ignored rather than bubbled.
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    let _ = conn.pragma_update(None, "busy_timeout", "5000");
}

/// Raw column values of one row, before domain parsing.
struct RecordRow {
    id: String,
    fingerprint: [String; 5],
    category: String,
    created_at: i64,
    usage_count: i64,
    last_used_at: Option<i64>,
    dedup_score: f64,
    dedup_signal: Option<String>,
    last_outcome: Option<String>,
    status: String,
    superseded_by: Option<String>,
}

impl RecordRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            fingerprint: [row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?],
            category: row.get(6)?,
            created_at: row.get(7)?,
            usage_count: row.get(8)?,
            last_used_at: row.get(9)?,
            dedup_score: row.get(10)?,
            dedup_signal: row.get(11)?,
            last_outcome: row.get(12)?,
            status: row.get(13)?,
            superseded_by: row.get(14)?,
        })
    }

    #[allow(clippy::cast_possible_truncation)]
    fn into_record(self) -> Result<RegistryRecord> {
        let corrupt = |what: &str, value: &str| {
            Error::operation(
                "load_registry_record",
                format!("record '{}' has invalid {what} '{value}'", self.id),
            )
        };

        let [setting, fear, antagonist, mechanism, twist] = &self.fingerprint;
        let fingerprint =
            CanonicalFingerprint::from_strs(setting, fear, antagonist, mechanism, twist)?;
        let category =
            Category::parse(&self.category).ok_or_else(|| corrupt("category", &self.category))?;
        let status =
            RecordStatus::parse(&self.status).ok_or_else(|| corrupt("status", &self.status))?;
        let dedup_signal = match &self.dedup_signal {
            Some(level) => {
                Some(DuplicateLevel::parse(level).ok_or_else(|| corrupt("dedup_signal", level))?)
            },
            None => None,
        };
        let last_outcome = match &self.last_outcome {
            Some(tier) => Some(Tier::parse(tier).ok_or_else(|| corrupt("last_outcome", tier))?),
            None => None,
        };
        let created_at = from_millis(self.created_at)
            .ok_or_else(|| corrupt("created_at", &self.created_at.to_string()))?;
        let last_used_at = match self.last_used_at {
            Some(ms) => {
                Some(from_millis(ms).ok_or_else(|| corrupt("last_used_at", &ms.to_string()))?)
            },
            None => None,
        };

        Ok(RegistryRecord {
            id: RecordId::new(self.id.clone()),
            fingerprint,
            category,
            created_at,
            usage_count: u64::try_from(self.usage_count).unwrap_or(0),
            last_used_at,
            dedup_score: self.dedup_score as f32,
            dedup_signal,
            last_outcome,
            status,
            superseded_by: self.superseded_by.clone().map(RecordId::new),
        })
    }
}

fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

impl RegistryStore for SqliteRegistryStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    #[instrument(skip(self), fields(operation = "load_all", backend = "sqlite"))]
    fn load_all(&self) -> Result<Vec<RegistryRecord>> {
        let start = Instant::now();
        let conn = acquire_lock(&self.conn);

        let result = (|| -> Result<Vec<RegistryRecord>> {
            let mut stmt = conn
                .prepare(&format!("SELECT {COLUMNS} FROM registry_records ORDER BY id"))
                .map_err(|e| Error::operation("prepare_load_all", e))?;
            let rows = stmt
                .query_map([], RecordRow::from_row)
                .map_err(|e| Error::operation("query_load_all", e))?;

            let mut records = Vec::new();
            for row in rows {
                let row = row.map_err(|e| Error::operation("read_registry_row", e))?;
                records.push(row.into_record()?);
            }
            Ok(records)
        })();

        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics("sqlite", "load_all", start, status);
        result
    }

    #[instrument(skip(self, record), fields(operation = "save", backend = "sqlite", record_id = %record.id))]
    fn save(&self, record: &RegistryRecord) -> Result<()> {
        let start = Instant::now();
        let conn = acquire_lock(&self.conn);

        let usage_count = i64::try_from(record.usage_count).unwrap_or(i64::MAX);
        let result = conn
            .execute(
                &format!(
                    "INSERT INTO registry_records ({COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                     ON CONFLICT(id) DO UPDATE SET
                        setting = excluded.setting,
                        primary_fear = excluded.primary_fear,
                        antagonist = excluded.antagonist,
                        mechanism = excluded.mechanism,
                        twist = excluded.twist,
                        category = excluded.category,
                        created_at = excluded.created_at,
                        usage_count = excluded.usage_count,
                        last_used_at = excluded.last_used_at,
                        dedup_score = excluded.dedup_score,
                        dedup_signal = excluded.dedup_signal,
                        last_outcome = excluded.last_outcome,
                        status = excluded.status,
                        superseded_by = excluded.superseded_by"
                ),
                params![
                    record.id.as_str(),
                    record.fingerprint.setting.as_str(),
                    record.fingerprint.primary_fear.as_str(),
                    record.fingerprint.antagonist.as_str(),
                    record.fingerprint.mechanism.as_str(),
                    record.fingerprint.twist.as_str(),
                    record.category.as_str(),
                    record.created_at.timestamp_millis(),
                    usage_count,
                    record.last_used_at.map(|t| t.timestamp_millis()),
                    f64::from(record.dedup_score),
                    record.dedup_signal.map(|l| l.as_str()),
                    record.last_outcome.map(|t| t.as_str()),
                    record.status.as_str(),
                    record.superseded_by.as_ref().map(RecordId::as_str),
                ],
            )
            .map(|_| ())
            .map_err(|e| Error::operation("save_registry_record", e));

        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics("sqlite", "save", start, status);
        result
    }
}
