//! Per-plugin schema migrations. Each plugin owns a migration set and its
//! applied versions are tracked in `plugin_schema_version`, keyed by the
//! plugin code, independently of the host schema.

use std::collections::BTreeMap;

use holiday_core::SchemaMigrator;
use rusqlite::params;
use tracing::debug;

use crate::{
    status_rows, validate_target, Db, DbError, EmbeddedMigration, MigrationStatus,
    PLUGIN_MIGRATIONS,
};

pub struct PluginMigrator {
    db: Db,
    migrations: &'static [EmbeddedMigration],
}

impl PluginMigrator {
    /// Migrator for the holiday plugin's own tables.
    pub fn holiday(db: Db) -> Self {
        Self::with_migrations(db, PLUGIN_MIGRATIONS)
    }

    pub fn with_migrations(db: Db, migrations: &'static [EmbeddedMigration]) -> Self {
        Self { db, migrations }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn latest_version(&self) -> i32 {
        self.migrations.last().map_or(0, |m| m.version)
    }

    pub fn version(&self, plugin_code: &str) -> Result<i32, DbError> {
        self.ensure_version_table()?;
        let version: i32 = self.db.conn().query_row(
            "SELECT COALESCE(MAX(version), 0) FROM plugin_schema_version WHERE plugin_code = ?1",
            params![plugin_code],
            |row| row.get(0),
        )?;
        Ok(version)
    }

    /// Applies pending migrations up to `target` (latest when `None`).
    pub fn apply_to(&mut self, plugin_code: &str, target: Option<i32>) -> Result<usize, DbError> {
        let target = target.unwrap_or_else(|| self.latest_version());
        validate_target(self.migrations, target)?;
        let current = self.version(plugin_code)?;
        let migrations = self.migrations;

        let mut applied = 0usize;
        for m in migrations {
            if m.version <= current || m.version > target {
                continue;
            }
            if m.up_sql.is_empty() {
                return Err(DbError::MissingSQL {
                    version: m.version,
                    direction: "up",
                });
            }
            self.db.transaction(|tx| {
                tx.execute_batch(m.up_sql)?;
                tx.execute(
                    "INSERT INTO plugin_schema_version (plugin_code, version, description)
                     VALUES (?1, ?2, ?3)",
                    params![plugin_code, m.version, m.description],
                )?;
                Ok(())
            })?;
            debug!(plugin = plugin_code, version = m.version, "plugin migration applied");
            applied += 1;
        }
        Ok(applied)
    }

    /// Reverts applied migrations newest first until `target` is reached.
    pub fn revert_to(&mut self, plugin_code: &str, target: i32) -> Result<usize, DbError> {
        validate_target(self.migrations, target)?;
        let current = self.version(plugin_code)?;
        let migrations = self.migrations;

        let mut reverted = 0usize;
        for m in migrations.iter().rev() {
            if m.version <= target || m.version > current {
                continue;
            }
            if m.down_sql.is_empty() {
                return Err(DbError::MissingSQL {
                    version: m.version,
                    direction: "down",
                });
            }
            self.db.transaction(|tx| {
                tx.execute_batch(m.down_sql)?;
                tx.execute(
                    "DELETE FROM plugin_schema_version WHERE plugin_code = ?1 AND version = ?2",
                    params![plugin_code, m.version],
                )?;
                Ok(())
            })?;
            debug!(plugin = plugin_code, version = m.version, "plugin migration reverted");
            reverted += 1;
        }
        Ok(reverted)
    }

    pub fn status(&self, plugin_code: &str) -> Result<Vec<MigrationStatus>, DbError> {
        self.ensure_version_table()?;
        let mut stmt = self.db.conn().prepare(
            "SELECT version, applied_at FROM plugin_schema_version
             WHERE plugin_code = ?1 ORDER BY version",
        )?;
        let rows = stmt.query_map(params![plugin_code], |row| {
            let version: i32 = row.get(0)?;
            let stamp: String = row.get(1)?;
            Ok((version, stamp))
        })?;
        let mut applied_at = BTreeMap::new();
        for row in rows {
            let (version, stamp) = row?;
            applied_at.insert(version, stamp);
        }
        Ok(status_rows(self.migrations, &applied_at))
    }

    fn ensure_version_table(&self) -> Result<(), DbError> {
        self.db.conn().execute_batch(
            "CREATE TABLE IF NOT EXISTS plugin_schema_version (\n\
                plugin_code TEXT NOT NULL,\n\
                version INTEGER NOT NULL,\n\
                applied_at TEXT NOT NULL DEFAULT (datetime('now')),\n\
                description TEXT,\n\
                PRIMARY KEY (plugin_code, version)\n\
             );",
        )?;
        Ok(())
    }
}

impl SchemaMigrator for PluginMigrator {
    fn apply_migrations(&mut self, plugin_code: &str, target: Option<i32>) -> Result<usize, String> {
        self.apply_to(plugin_code, target).map_err(|e| e.to_string())
    }

    fn revert_migrations(&mut self, plugin_code: &str, target: i32) -> Result<usize, String> {
        self.revert_to(plugin_code, target).map_err(|e| e.to_string())
    }

    fn current_version(&mut self, plugin_code: &str) -> Result<i32, String> {
        self.version(plugin_code).map_err(|e| e.to_string())
    }
}
