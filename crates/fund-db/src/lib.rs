//! Storage layer for the donation recommender.
//!
//! Two databases live here:
//! - The Atuin history database, opened strictly read-only. We only ever
//!   SELECT from it; schema ownership stays with Atuin.
//! - The local "unknowns" database, which records what the user has learned
//!   about executables with no project mapping.
//!
//! # Thread Safety
//!
//! Both wrappers hold a `rusqlite::Connection`, which is `Send` but not
//! `Sync`. The pipeline is single-pass per invocation, so no shared access
//! is needed.
//!
//! # Timestamp Formats
//!
//! Atuin stores history timestamps as nanoseconds since the Unix epoch in an
//! INTEGER column. The unknowns database stores RFC 3339 TEXT, which keeps
//! lexicographic and chronological ordering aligned.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags, params, params_from_iter};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fund_core::UsageRecord;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// The history database does not exist.
    #[error("history database not found at {path}")]
    HistoryNotFound { path: String },
    /// Creating the local data directory failed.
    #[error("failed to create {path}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Time periods for filtering history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    Week,
    #[default]
    Month,
    Year,
    All,
}

impl Period {
    /// Start of the period relative to `now`. `All` has no lower bound.
    pub fn start_from(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Day => Some(now - Duration::days(1)),
            Self::Week => Some(now - Duration::weeks(1)),
            Self::Month => Some(now - Duration::days(30)),
            Self::Year => Some(now - Duration::days(365)),
            Self::All => None,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
            Self::All => "all",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Period {
    type Err = UnknownPeriod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            "all" => Ok(Self::All),
            _ => Err(UnknownPeriod(s.to_string())),
        }
    }
}

/// Error type for unknown period strings.
#[derive(Debug, Clone)]
pub struct UnknownPeriod(String);

impl fmt::Display for UnknownPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown period: {} (expected day, week, month, year or all)",
            self.0
        )
    }
}

impl std::error::Error for UnknownPeriod {}

/// A single command history entry from Atuin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: String,
    pub command: String,
    pub timestamp: DateTime<Utc>,
    pub duration_ns: i64,
    pub exit_code: i64,
    pub cwd: String,
    pub hostname: String,
}

impl HistoryEntry {
    /// Whether the command exited successfully.
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// Duration in milliseconds.
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_ms(&self) -> f64 {
        self.duration_ns as f64 / 1_000_000.0
    }
}

impl UsageRecord for HistoryEntry {
    fn command(&self) -> &str {
        &self.command
    }

    fn duration_ns(&self) -> i64 {
        self.duration_ns
    }

    fn success(&self) -> bool {
        self.is_success()
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Filters for a history query.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub period: Period,
    /// Substring match against the stored hostname.
    pub hostname: Option<String>,
    /// Include commands with non-zero exit codes. Defaults off, so set it.
    pub include_failed: bool,
}

/// Basic statistics about the history database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryStats {
    pub total_commands: i64,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

/// Read-only handle on the Atuin history database.
pub struct HistoryDb {
    conn: Connection,
}

impl HistoryDb {
    /// Opens the history database read-only. Fails if it does not exist.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if !path.exists() {
            return Err(DbError::HistoryNotFound {
                path: path.display().to_string(),
            });
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        tracing::debug!(path = %path.display(), "opened history database");
        Ok(Self { conn })
    }

    /// Queries history entries matching `filter`, newest first.
    ///
    /// Soft-deleted rows (`deleted_at IS NOT NULL`) are always excluded.
    pub fn query_history(
        &self,
        filter: &HistoryFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<HistoryEntry>, DbError> {
        let mut sql = String::from(
            "
            SELECT id, command, timestamp, duration, exit, cwd, hostname
            FROM history
            WHERE deleted_at IS NULL
            ",
        );
        let mut params: Vec<Value> = Vec::new();

        if let Some(start) = filter.period.start_from(now) {
            sql.push_str(" AND timestamp >= ?");
            params.push(Value::Integer(timestamp_ns(start)));
        }

        if let Some(hostname) = &filter.hostname {
            sql.push_str(" AND hostname LIKE ?");
            params.push(Value::Text(format!("%{hostname}%")));
        }

        if !filter.include_failed {
            sql.push_str(" AND exit = 0");
        }

        sql.push_str(" ORDER BY timestamp DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params), |row| {
            Ok(HistoryEntry {
                id: row.get(0)?,
                command: row.get(1)?,
                timestamp: DateTime::from_timestamp_nanos(row.get(2)?),
                duration_ns: row.get(3)?,
                exit_code: row.get(4)?,
                cwd: row.get(5)?,
                hostname: row.get(6)?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        tracing::debug!(count = entries.len(), "queried history");
        Ok(entries)
    }

    /// Returns basic statistics about the history database.
    pub fn stats(&self) -> Result<HistoryStats, DbError> {
        let row = self.conn.query_row(
            "
            SELECT COUNT(*), MIN(timestamp), MAX(timestamp)
            FROM history
            WHERE deleted_at IS NULL
            ",
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<i64>>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                ))
            },
        )?;

        Ok(HistoryStats {
            total_commands: row.0,
            oldest: row.1.map(DateTime::from_timestamp_nanos),
            newest: row.2.map(DateTime::from_timestamp_nanos),
        })
    }
}

fn timestamp_ns(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_nanos_opt().unwrap_or(i64::MAX)
}

/// A record for an executable with no known project mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnknownRecord {
    pub executable: String,
    pub path: Option<String>,
    /// 'script', 'binary' or 'not_found'.
    pub file_type: Option<String>,
    /// 'system', 'third_party', 'user', 'ignored' or 'unknown'.
    pub classification: Option<String>,
    pub copyright_found: Option<String>,
    pub suggested_project: Option<String>,
    pub user_notes: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Local database for unknown-executable classifications.
pub struct LocalDb {
    conn: Connection,
}

impl LocalDb {
    /// Opens (and initializes) the local database, creating parent
    /// directories as needed.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| DbError::CreateDir {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database. Useful for testing.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the schema. Idempotent.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS unknowns (
                executable TEXT PRIMARY KEY,
                path TEXT,
                file_type TEXT,
                classification TEXT,
                copyright_found TEXT,
                suggested_project TEXT,
                user_notes TEXT,
                created_at TEXT,
                updated_at TEXT
            );

            CREATE TABLE IF NOT EXISTS exception_list (
                executable TEXT PRIMARY KEY,
                reason TEXT,
                created_at TEXT
            );
            ",
        )?;
        Ok(())
    }

    /// Inserts or updates an unknown-executable record.
    ///
    /// `created_at` is preserved on update; `updated_at` is always stamped
    /// with `now`.
    pub fn upsert_unknown(
        &self,
        record: &UnknownRecord,
        now: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let now = now.to_rfc3339();
        let created_at = self
            .get_unknown(&record.executable)?
            .and_then(|existing| existing.created_at)
            .unwrap_or_else(|| now.clone());

        self.conn.execute(
            "
            INSERT INTO unknowns
            (executable, path, file_type, classification, copyright_found,
             suggested_project, user_notes, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(executable) DO UPDATE SET
                path = excluded.path,
                file_type = excluded.file_type,
                classification = excluded.classification,
                copyright_found = excluded.copyright_found,
                suggested_project = excluded.suggested_project,
                user_notes = excluded.user_notes,
                updated_at = excluded.updated_at
            ",
            params![
                record.executable,
                record.path,
                record.file_type,
                record.classification,
                record.copyright_found,
                record.suggested_project,
                record.user_notes,
                created_at,
                now,
            ],
        )?;
        Ok(())
    }

    /// Fetches one unknown-executable record.
    pub fn get_unknown(&self, executable: &str) -> Result<Option<UnknownRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT executable, path, file_type, classification, copyright_found,
                   suggested_project, user_notes, created_at, updated_at
            FROM unknowns
            WHERE executable = ?
            ",
        )?;
        let mut rows = stmt.query_map(params![executable], row_to_unknown)?;
        rows.next().transpose().map_err(DbError::from)
    }

    /// Lists all unknown-executable records, ordered by executable name.
    pub fn list_unknowns(&self) -> Result<Vec<UnknownRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT executable, path, file_type, classification, copyright_found,
                   suggested_project, user_notes, created_at, updated_at
            FROM unknowns
            ORDER BY executable ASC
            ",
        )?;
        let rows = stmt.query_map([], row_to_unknown)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Adds an executable to the exception list (never suggest it again).
    pub fn add_exception(
        &self,
        executable: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "
            INSERT INTO exception_list (executable, reason, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(executable) DO UPDATE SET reason = excluded.reason
            ",
            params![executable, reason, now.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Whether an executable is on the exception list.
    pub fn is_exception(&self, executable: &str) -> Result<bool, DbError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM exception_list WHERE executable = ?",
            params![executable],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

fn row_to_unknown(row: &rusqlite::Row<'_>) -> rusqlite::Result<UnknownRecord> {
    Ok(UnknownRecord {
        executable: row.get(0)?,
        path: row.get(1)?,
        file_type: row.get(2)?,
        classification: row.get(3)?,
        copyright_found: row.get(4)?,
        suggested_project: row.get(5)?,
        user_notes: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// Creates an Atuin-shaped history database with the given rows.
    fn history_fixture(
        path: &Path,
        rows: &[(&str, &str, DateTime<Utc>, i64, i64, &str)],
    ) -> rusqlite::Result<()> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            CREATE TABLE history (
                id TEXT PRIMARY KEY,
                command TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                duration INTEGER NOT NULL,
                exit INTEGER NOT NULL,
                cwd TEXT NOT NULL,
                hostname TEXT NOT NULL,
                deleted_at INTEGER
            );
            ",
        )?;
        for (id, command, ts, duration, exit, hostname) in rows {
            conn.execute(
                "
                INSERT INTO history (id, command, timestamp, duration, exit, cwd, hostname)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ",
                params![
                    id,
                    command,
                    ts.timestamp_nanos_opt().unwrap(),
                    duration,
                    exit,
                    "/home/user",
                    hostname,
                ],
            )?;
        }
        Ok(())
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn missing_history_db_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let result = HistoryDb::open(&temp.path().join("nope.db"));
        assert!(matches!(result, Err(DbError::HistoryNotFound { .. })));
    }

    #[test]
    fn queries_all_entries_newest_first() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("history.db");
        history_fixture(
            &path,
            &[
                ("a", "git status", now() - Duration::hours(2), 1_000, 0, "laptop"),
                ("b", "cargo build", now() - Duration::hours(1), 2_000, 0, "laptop"),
            ],
        )
        .unwrap();

        let db = HistoryDb::open(&path).unwrap();
        let filter = HistoryFilter {
            period: Period::All,
            include_failed: true,
            ..Default::default()
        };
        let entries = db.query_history(&filter, now()).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].command, "cargo build");
        assert_eq!(entries[1].command, "git status");
    }

    #[test]
    fn period_filter_drops_old_entries() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("history.db");
        history_fixture(
            &path,
            &[
                ("old", "make", now() - Duration::days(90), 0, 0, "laptop"),
                ("new", "git pull", now() - Duration::days(2), 0, 0, "laptop"),
            ],
        )
        .unwrap();

        let db = HistoryDb::open(&path).unwrap();
        let filter = HistoryFilter {
            period: Period::Month,
            include_failed: true,
            ..Default::default()
        };
        let entries = db.query_history(&filter, now()).unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "new");
    }

    #[test]
    fn hostname_filter_is_substring_match() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("history.db");
        history_fixture(
            &path,
            &[
                ("a", "git status", now(), 0, 0, "work-laptop"),
                ("b", "git push", now(), 0, 0, "home-desktop"),
            ],
        )
        .unwrap();

        let db = HistoryDb::open(&path).unwrap();
        let filter = HistoryFilter {
            period: Period::All,
            hostname: Some("laptop".to_string()),
            include_failed: true,
        };
        let entries = db.query_history(&filter, now()).unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].hostname, "work-laptop");
    }

    #[test]
    fn failed_commands_filtered_unless_requested() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("history.db");
        history_fixture(
            &path,
            &[
                ("ok", "make", now(), 0, 0, "laptop"),
                ("bad", "make test", now(), 0, 2, "laptop"),
            ],
        )
        .unwrap();

        let db = HistoryDb::open(&path).unwrap();

        let strict = HistoryFilter {
            period: Period::All,
            ..Default::default()
        };
        assert_eq!(db.query_history(&strict, now()).unwrap().len(), 1);

        let lenient = HistoryFilter {
            period: Period::All,
            include_failed: true,
            ..Default::default()
        };
        let entries = db.query_history(&lenient, now()).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(!entries.iter().find(|e| e.id == "bad").unwrap().is_success());
    }

    #[test]
    fn stats_reports_bounds() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("history.db");
        let oldest = now() - Duration::days(10);
        let newest = now() - Duration::days(1);
        history_fixture(
            &path,
            &[
                ("a", "git status", oldest, 0, 0, "laptop"),
                ("b", "git push", newest, 0, 0, "laptop"),
            ],
        )
        .unwrap();

        let db = HistoryDb::open(&path).unwrap();
        let stats = db.stats().unwrap();

        assert_eq!(stats.total_commands, 2);
        assert_eq!(stats.oldest, Some(oldest));
        assert_eq!(stats.newest, Some(newest));
    }

    #[test]
    fn period_start_bounds() {
        let reference = now();
        assert_eq!(
            Period::Day.start_from(reference),
            Some(reference - Duration::days(1))
        );
        assert_eq!(
            Period::Week.start_from(reference),
            Some(reference - Duration::weeks(1))
        );
        assert_eq!(Period::All.start_from(reference), None);
    }

    #[test]
    fn period_parses_from_str() {
        assert_eq!("month".parse::<Period>().unwrap(), Period::Month);
        assert_eq!("all".parse::<Period>().unwrap(), Period::All);
        assert!("fortnight".parse::<Period>().is_err());
    }

    // ========== LocalDb ==========

    #[test]
    fn unknown_roundtrip() {
        let db = LocalDb::open_in_memory().unwrap();
        let record = UnknownRecord {
            executable: "mytool".to_string(),
            path: Some("/home/user/bin/mytool".to_string()),
            file_type: Some("script".to_string()),
            classification: Some("user".to_string()),
            ..Default::default()
        };

        db.upsert_unknown(&record, now()).unwrap();
        let fetched = db.get_unknown("mytool").unwrap().unwrap();

        assert_eq!(fetched.executable, "mytool");
        assert_eq!(fetched.classification.as_deref(), Some("user"));
        assert!(fetched.created_at.is_some());
    }

    #[test]
    fn upsert_preserves_created_at() {
        let db = LocalDb::open_in_memory().unwrap();
        let mut record = UnknownRecord {
            executable: "mytool".to_string(),
            ..Default::default()
        };

        db.upsert_unknown(&record, now()).unwrap();
        let first = db.get_unknown("mytool").unwrap().unwrap();

        record.classification = Some("ignored".to_string());
        db.upsert_unknown(&record, now() + Duration::hours(1)).unwrap();
        let second = db.get_unknown("mytool").unwrap().unwrap();

        assert_eq!(first.created_at, second.created_at);
        assert_ne!(first.updated_at, second.updated_at);
        assert_eq!(second.classification.as_deref(), Some("ignored"));
    }

    #[test]
    fn list_unknowns_is_ordered() {
        let db = LocalDb::open_in_memory().unwrap();
        for exe in ["zeta", "alpha", "mid"] {
            db.upsert_unknown(
                &UnknownRecord {
                    executable: exe.to_string(),
                    ..Default::default()
                },
                now(),
            )
            .unwrap();
        }

        let names: Vec<String> = db
            .list_unknowns()
            .unwrap()
            .into_iter()
            .map(|r| r.executable)
            .collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn exception_list_membership() {
        let db = LocalDb::open_in_memory().unwrap();
        assert!(!db.is_exception("mytool").unwrap());

        db.add_exception("mytool", "user", now()).unwrap();
        assert!(db.is_exception("mytool").unwrap());

        // Duplicate adds update rather than fail
        db.add_exception("mytool", "ignored", now()).unwrap();
        assert!(db.is_exception("mytool").unwrap());
    }
}
