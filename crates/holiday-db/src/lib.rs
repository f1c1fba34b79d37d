//! holiday-db: SQLite storage + migration engine for the holiday widget
//! registrar.

pub mod layout_repository;
pub mod placement_repository;
pub mod plugin_migrations;
pub mod store;
pub mod widget_repository;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Transaction, TransactionBehavior};
use thiserror::Error;
use tracing::{debug, warn};

pub use plugin_migrations::PluginMigrator;
pub use store::SqliteRegistryStore;

include!(concat!(env!("OUT_DIR"), "/migrations.rs"));

#[derive(Debug, Clone)]
pub struct Config {
    pub path: PathBuf,
    pub busy_timeout_ms: u64,
}

impl Config {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: 5000,
        }
    }
}

#[derive(Debug)]
pub struct Db {
    conn: Connection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub version: i32,
    pub description: String,
    pub applied: bool,
    pub applied_at: String,
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("migration {version} missing {direction} sql")]
    MissingSQL {
        version: i32,
        direction: &'static str,
    },
    #[error("target version {target} not found (max {max})")]
    UnknownVersion { target: i32, max: i32 },
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Transaction(String),
    #[error("widget not found")]
    WidgetNotFound,
    #[error("placement not found")]
    PlacementNotFound,
    #[error("page layout not found")]
    PageNotFound,
}

impl Db {
    const DEFAULT_RETRY_ATTEMPTS: usize = 3;
    const DEFAULT_RETRY_BACKOFF_MS: u64 = 50;

    pub fn open(cfg: Config) -> Result<Self, DbError> {
        ensure_parent_dir(&cfg.path)?;
        let conn = Connection::open(&cfg.path)?;
        conn.busy_timeout(Duration::from_millis(cfg.busy_timeout_ms))?;
        // Best-effort: ignore pragma errors on older SQLite builds.
        let _ = conn.pragma_update(None, "journal_mode", "WAL");
        let _ = conn.pragma_update(None, "synchronous", "NORMAL");
        // Placement integrity relies on foreign keys; this one must stick.
        conn.pragma_update(None, "foreign_keys", "ON")?;
        debug!(path = %cfg.path.display(), "database opened");
        Ok(Self { conn })
    }

    /// Applies every pending host migration. Returns the number applied.
    pub fn migrate_up(&mut self) -> Result<usize, DbError> {
        self.ensure_schema_version_table()?;
        let current = self.schema_version()?;

        let mut applied = 0usize;
        for m in HOST_MIGRATIONS {
            if m.version <= current {
                continue;
            }
            self.apply_up(m)?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Reverts the newest `steps` applied host migrations.
    pub fn migrate_down(&mut self, steps: i32) -> Result<usize, DbError> {
        self.ensure_schema_version_table()?;
        let current = self.schema_version()?;
        if current == 0 || steps <= 0 {
            return Ok(0);
        }

        let to_rollback: Vec<EmbeddedMigration> = HOST_MIGRATIONS
            .iter()
            .rev()
            .filter(|m| m.version <= current)
            .take(steps as usize)
            .copied()
            .collect();

        let mut rolled_back = 0usize;
        for m in &to_rollback {
            self.apply_down(m)?;
            rolled_back += 1;
        }
        Ok(rolled_back)
    }

    /// Moves the host schema up or down to exactly `target_version`.
    pub fn migrate_to(&mut self, target_version: i32) -> Result<(), DbError> {
        validate_target(HOST_MIGRATIONS, target_version)?;
        self.ensure_schema_version_table()?;
        let current = self.schema_version()?;
        if target_version == current {
            return Ok(());
        }

        if target_version > current {
            for m in HOST_MIGRATIONS {
                if m.version <= current || m.version > target_version {
                    continue;
                }
                self.apply_up(m)?;
            }
        } else {
            for m in HOST_MIGRATIONS.iter().rev() {
                if m.version <= target_version || m.version > current {
                    continue;
                }
                self.apply_down(m)?;
            }
        }
        Ok(())
    }

    pub fn migration_status(&mut self) -> Result<Vec<MigrationStatus>, DbError> {
        self.ensure_schema_version_table()?;

        let mut applied_at: BTreeMap<i32, String> = BTreeMap::new();
        let mut stmt = self
            .conn
            .prepare("SELECT version, applied_at FROM schema_version ORDER BY version")?;
        let rows = stmt.query_map([], |row| {
            let version: i32 = row.get(0)?;
            let stamp: String = row.get(1)?;
            Ok((version, stamp))
        })?;
        for row in rows {
            let (version, stamp) = row?;
            applied_at.insert(version, stamp);
        }

        Ok(status_rows(HOST_MIGRATIONS, &applied_at))
    }

    pub fn schema_version(&self) -> Result<i32, DbError> {
        self.ensure_schema_version_table()?;
        let version: Option<i32> = self
            .conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(version.unwrap_or(0))
    }

    fn apply_up(&mut self, m: &EmbeddedMigration) -> Result<(), DbError> {
        if m.up_sql.is_empty() {
            return Err(DbError::MissingSQL {
                version: m.version,
                direction: "up",
            });
        }
        let tx = self.conn.transaction()?;
        tx.execute_batch(m.up_sql)?;
        tx.execute(
            "INSERT INTO schema_version (version, description) VALUES (?1, ?2)",
            params![m.version, m.description],
        )?;
        tx.commit()?;
        debug!(version = m.version, description = m.description, "host migration applied");
        Ok(())
    }

    fn apply_down(&mut self, m: &EmbeddedMigration) -> Result<(), DbError> {
        if m.down_sql.is_empty() {
            return Err(DbError::MissingSQL {
                version: m.version,
                direction: "down",
            });
        }
        let tx = self.conn.transaction()?;
        tx.execute_batch(m.down_sql)?;
        tx.execute(
            "DELETE FROM schema_version WHERE version = ?1",
            params![m.version],
        )?;
        tx.commit()?;
        debug!(version = m.version, description = m.description, "host migration reverted");
        Ok(())
    }

    fn ensure_schema_version_table(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_version (\n\
                version INTEGER PRIMARY KEY,\n\
                applied_at TEXT NOT NULL DEFAULT (datetime('now')),\n\
                description TEXT\n\
             );",
        )?;
        Ok(())
    }

    /// Returns a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Starts a write transaction that takes the database write lock up
    /// front, so the reads inside it cannot be invalidated by another
    /// writer before commit. Dropping the returned value rolls back.
    pub fn begin_immediate(&mut self) -> Result<Transaction<'_>, DbError> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }

    /// Transaction executes `f` inside an immediate SQLite transaction:
    /// explicit rollback on error, explicit commit on success.
    pub fn transaction<T>(
        &mut self,
        f: impl FnOnce(&Transaction<'_>) -> Result<T, DbError>,
    ) -> Result<T, DbError> {
        let tx = self.begin_immediate()?;

        match f(&tx) {
            Ok(v) => {
                tx.commit()?;
                Ok(v)
            }
            Err(e) => {
                if let Err(rb) = tx.rollback() {
                    return Err(DbError::Transaction(format!(
                        "rollback failed: {rb} (original error: {e})"
                    )));
                }
                Err(e)
            }
        }
    }

    /// Retries a transaction while SQLite reports busy/locked, doubling the
    /// backoff after each attempt.
    pub fn transaction_with_retry<T>(
        &mut self,
        mut max_attempts: usize,
        mut base_backoff: Duration,
        mut f: impl FnMut(&Transaction<'_>) -> Result<T, DbError>,
    ) -> Result<T, DbError> {
        if max_attempts == 0 {
            max_attempts = Self::DEFAULT_RETRY_ATTEMPTS;
        }
        if base_backoff.is_zero() {
            base_backoff = Duration::from_millis(Self::DEFAULT_RETRY_BACKOFF_MS);
        }

        let mut backoff = base_backoff;
        let mut attempt = 1;
        loop {
            match self.transaction(&mut f) {
                Ok(v) => return Ok(v),
                Err(e) if attempt < max_attempts && is_busy_error(&e) => {
                    warn!(attempt, error = %e, "database busy; retrying transaction");
                    std::thread::sleep(backoff);
                    backoff = backoff.saturating_mul(2);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn validate_target(set: &[EmbeddedMigration], target: i32) -> Result<(), DbError> {
    if target < 0 {
        return Err(DbError::Validation(format!(
            "target version {target} cannot be negative"
        )));
    }
    let max = set.last().map_or(0, |m| m.version);
    if target != 0 && !set.iter().any(|m| m.version == target) {
        return Err(DbError::UnknownVersion { target, max });
    }
    Ok(())
}

fn status_rows(set: &[EmbeddedMigration], applied_at: &BTreeMap<i32, String>) -> Vec<MigrationStatus> {
    set.iter()
        .map(|m| MigrationStatus {
            version: m.version,
            description: m.description.to_string(),
            applied: applied_at.contains_key(&m.version),
            applied_at: applied_at.get(&m.version).cloned().unwrap_or_default(),
        })
        .collect()
}

/// True when SQLite refused the write because another connection holds
/// the lock.
pub fn is_busy_error(err: &DbError) -> bool {
    if let DbError::Sqlite(rusqlite::Error::SqliteFailure(code, _)) = err {
        if matches!(code.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) {
            return true;
        }
    }
    let msg = err.to_string().to_lowercase();
    msg.contains("database is locked")
        || msg.contains("database is busy")
        || msg.contains("sqlite_busy")
}

pub(crate) fn is_unique_constraint_error(err: &rusqlite::Error) -> bool {
    err.to_string().contains("UNIQUE constraint failed")
}

pub(crate) fn is_constraint_error(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(code, _) if code.code == ErrorCode::ConstraintViolation
    )
}

pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

fn ensure_parent_dir(path: &Path) -> Result<(), std::io::Error> {
    let parent = match path.parent() {
        Some(parent) => parent,
        None => return Ok(()),
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent)
}
