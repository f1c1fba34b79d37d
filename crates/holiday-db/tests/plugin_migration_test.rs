use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use holiday_core::SchemaMigrator;
use holiday_db::{Config, Db, DbError, PluginMigrator, PLUGIN_MIGRATIONS};

fn temp_db_path(prefix: &str) -> PathBuf {
    static UNIQUE_SUFFIX: AtomicU64 = AtomicU64::new(0);
    let nanos = match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(value) => value.as_nanos(),
        Err(_) => 0,
    };
    let suffix = UNIQUE_SUFFIX.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "holiday-db-plugin-{prefix}-{nanos}-{}-{suffix}.sqlite",
        std::process::id(),
    ))
}

fn open_migrator(prefix: &str) -> (PluginMigrator, PathBuf) {
    let path = temp_db_path(prefix);
    let db = match Db::open(Config::new(&path)) {
        Ok(db) => db,
        Err(err) => panic!("open db failed: {err}"),
    };
    (PluginMigrator::holiday(db), path)
}

fn table_exists(migrator: &PluginMigrator, name: &str) -> bool {
    let count: i64 = match migrator.db().conn().query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |row| row.get(0),
    ) {
        Ok(count) => count,
        Err(err) => panic!("query sqlite_master: {err}"),
    };
    count > 0
}

#[test]
fn apply_creates_plugin_tables_and_seeds_week() {
    let (mut migrator, path) = open_migrator("apply");

    match migrator.apply_to("Holiday", None) {
        Ok(applied) => assert_eq!(applied, PLUGIN_MIGRATIONS.len()),
        Err(err) => panic!("apply_to: {err}"),
    }
    assert!(table_exists(&migrator, "plg_holiday"));
    assert!(table_exists(&migrator, "plg_holiday_week"));

    let week_rows: i64 = match migrator.db().conn().query_row(
        "SELECT COUNT(*) FROM plg_holiday_week WHERE id = 1",
        [],
        |row| row.get(0),
    ) {
        Ok(count) => count,
        Err(err) => panic!("count week rows: {err}"),
    };
    assert_eq!(week_rows, 1);

    assert!(matches!(migrator.version("Holiday"), Ok(v) if v == migrator.latest_version()));
    // Second apply is a no-op.
    assert!(matches!(migrator.apply_to("Holiday", None), Ok(0)));

    let _ = std::fs::remove_file(path);
}

#[test]
fn revert_to_zero_drops_plugin_tables() {
    let (mut migrator, path) = open_migrator("revert");
    if let Err(err) = migrator.apply_to("Holiday", None) {
        panic!("apply_to: {err}");
    }

    match migrator.revert_to("Holiday", 0) {
        Ok(reverted) => assert_eq!(reverted, PLUGIN_MIGRATIONS.len()),
        Err(err) => panic!("revert_to: {err}"),
    }
    assert!(!table_exists(&migrator, "plg_holiday"));
    assert!(!table_exists(&migrator, "plg_holiday_week"));
    assert!(matches!(migrator.version("Holiday"), Ok(0)));
    assert!(matches!(migrator.revert_to("Holiday", 0), Ok(0)));

    let _ = std::fs::remove_file(path);
}

#[test]
fn versions_are_tracked_per_plugin_code() {
    let (mut migrator, path) = open_migrator("per-plugin");
    if let Err(err) = migrator.apply_to("Holiday", None) {
        panic!("apply_to: {err}");
    }
    assert!(matches!(migrator.version("Other"), Ok(0)));

    let status = match migrator.status("Holiday") {
        Ok(status) => status,
        Err(err) => panic!("status: {err}"),
    };
    assert_eq!(status.len(), PLUGIN_MIGRATIONS.len());
    assert!(status.iter().all(|row| row.applied));

    let other = match migrator.status("Other") {
        Ok(status) => status,
        Err(err) => panic!("status: {err}"),
    };
    assert!(other.iter().all(|row| !row.applied));

    let _ = std::fs::remove_file(path);
}

#[test]
fn unknown_target_is_rejected() {
    let (mut migrator, path) = open_migrator("bad-target");
    assert!(matches!(
        migrator.apply_to("Holiday", Some(42)),
        Err(DbError::UnknownVersion { target: 42, .. })
    ));
    assert!(matches!(migrator.revert_to("Holiday", -3), Err(DbError::Validation(_))));
    let _ = std::fs::remove_file(path);
}

#[test]
fn schema_migrator_port_reports_string_errors() {
    let (mut migrator, path) = open_migrator("port");
    assert!(matches!(migrator.apply_migrations("Holiday", None), Ok(n) if n > 0));
    assert!(matches!(migrator.current_version("Holiday"), Ok(v) if v > 0));
    match migrator.apply_migrations("Holiday", Some(99)) {
        Ok(_) => panic!("expected unknown target error"),
        Err(msg) => assert!(msg.contains("99")),
    }
    assert!(matches!(migrator.revert_migrations("Holiday", 0), Ok(n) if n > 0));
    let _ = std::fs::remove_file(path);
}
