use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use holiday_db::{is_busy_error, Config, Db, DbError};

fn temp_db_path(prefix: &str) -> PathBuf {
    static UNIQUE_SUFFIX: AtomicU64 = AtomicU64::new(0);
    let nanos = match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(value) => value.as_nanos(),
        Err(_) => 0,
    };
    let suffix = UNIQUE_SUFFIX.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "holiday-db-tx-{prefix}-{nanos}-{}-{suffix}.sqlite",
        std::process::id(),
    ))
}

fn setup_db(path: &Path, busy_timeout_ms: u64) -> Db {
    let mut cfg = Config::new(path);
    cfg.busy_timeout_ms = busy_timeout_ms;
    let mut db = match Db::open(cfg) {
        Ok(db) => db,
        Err(err) => panic!("open db failed: {err}"),
    };
    if let Err(err) = db.migrate_up() {
        panic!("migrate_up failed: {err}");
    }
    db
}

fn surface_count(db: &Db) -> i64 {
    match db
        .conn()
        .query_row("SELECT COUNT(*) FROM surfaces", [], |row| row.get(0))
    {
        Ok(count) => count,
        Err(err) => panic!("count surfaces: {err}"),
    }
}

#[test]
fn transaction_commits_on_success() {
    let path = temp_db_path("commit");
    let mut db = setup_db(&path, 5000);
    let before = surface_count(&db);

    let result = db.transaction(|tx| {
        tx.execute("INSERT INTO surfaces (id, name) VALUES ('drawer', 'Drawer')", [])?;
        Ok(())
    });
    assert!(result.is_ok());
    assert_eq!(surface_count(&db), before + 1);

    let _ = std::fs::remove_file(path);
}

#[test]
fn transaction_rolls_back_on_error() {
    let path = temp_db_path("rollback");
    let mut db = setup_db(&path, 5000);
    let before = surface_count(&db);

    let result: Result<(), DbError> = db.transaction(|tx| {
        tx.execute("INSERT INTO surfaces (id, name) VALUES ('drawer', 'Drawer')", [])?;
        Err(DbError::Validation("abort".into()))
    });
    assert!(matches!(result, Err(DbError::Validation(_))));
    assert_eq!(surface_count(&db), before);

    let _ = std::fs::remove_file(path);
}

#[test]
fn held_write_lock_surfaces_busy_error() {
    let path = temp_db_path("busy");
    let mut holder = setup_db(&path, 5000);
    let mut waiter = setup_db(&path, 10);

    let held = match holder.begin_immediate() {
        Ok(tx) => tx,
        Err(err) => panic!("begin_immediate: {err}"),
    };

    let mut attempts = 0;
    let result: Result<(), DbError> =
        waiter.transaction_with_retry(2, Duration::from_millis(1), |_tx| {
            attempts += 1;
            Ok(())
        });
    let err = match result {
        Ok(()) => panic!("expected busy error while the lock is held"),
        Err(err) => err,
    };
    assert!(is_busy_error(&err), "unexpected error: {err}");
    // The closure never ran: BEGIN IMMEDIATE itself was refused.
    assert_eq!(attempts, 0);

    drop(held);
    let ok = waiter.transaction_with_retry(2, Duration::from_millis(1), |_tx| Ok(7));
    assert!(matches!(ok, Ok(7)));

    let _ = std::fs::remove_file(path);
}
