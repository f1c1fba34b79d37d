//! SQLite implementation of the registry store port.
//!
//! Every registrar transaction is an IMMEDIATE SQLite transaction: the write
//! lock is taken at `begin`, so the max-order read and the placement insert
//! cannot interleave with another writer. The unique slot index backs this
//! up for writers that bypass the registrar.

use holiday_core::{
    NewPlacement, Placement, RegistryStore, RegistryTx, StoreError, Widget, WidgetUpsert,
};
use rusqlite::Transaction;
use tracing::debug;

use crate::layout_repository::LayoutRepository;
use crate::placement_repository::PlacementRepository;
use crate::widget_repository::WidgetRepository;
use crate::{is_busy_error, is_constraint_error, is_unique_constraint_error, Config, Db, DbError};

pub struct SqliteRegistryStore {
    db: Db,
}

impl SqliteRegistryStore {
    /// Opens the database and brings the host schema up to date.
    pub fn open(cfg: Config) -> Result<Self, DbError> {
        let mut db = Db::open(cfg)?;
        let applied = db.migrate_up()?;
        if applied > 0 {
            debug!(applied, "host schema migrated");
        }
        Ok(Self { db })
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn layouts(&self) -> LayoutRepository<'_> {
        LayoutRepository::new(self.db.conn())
    }

    pub fn widgets(&self) -> WidgetRepository<'_> {
        WidgetRepository::new(self.db.conn())
    }

    pub fn placements(&self) -> PlacementRepository<'_> {
        PlacementRepository::new(self.db.conn())
    }
}

impl RegistryStore for SqliteRegistryStore {
    type Tx<'a> = SqliteTx<'a>;

    fn begin(&mut self) -> Result<Self::Tx<'_>, StoreError> {
        let tx = self.db.begin_immediate()?;
        Ok(SqliteTx { tx })
    }

    fn find_widget(&self, content_reference: &str) -> Result<Option<Widget>, StoreError> {
        Ok(self.widgets().find_by_content_reference(content_reference)?)
    }

    fn placements_for(&self, widget_id: &str) -> Result<Vec<Placement>, StoreError> {
        Ok(self.placements().list_by_widget(widget_id)?)
    }
}

/// An open IMMEDIATE transaction. Dropping it without `commit` rolls back.
pub struct SqliteTx<'a> {
    tx: Transaction<'a>,
}

impl RegistryTx for SqliteTx<'_> {
    fn upsert_widget(&mut self, widget: &WidgetUpsert) -> Result<Widget, StoreError> {
        Ok(WidgetRepository::new(&self.tx).upsert(widget)?)
    }

    fn find_widget(&self, content_reference: &str) -> Result<Option<Widget>, StoreError> {
        Ok(WidgetRepository::new(&self.tx).find_by_content_reference(content_reference)?)
    }

    fn find_placement(
        &self,
        widget_id: &str,
        page_id: i64,
        surface_id: &str,
    ) -> Result<Option<Placement>, StoreError> {
        Ok(PlacementRepository::new(&self.tx).find_for_slot(widget_id, page_id, surface_id)?)
    }

    fn max_order_index(&self, page_id: i64, surface_id: &str) -> Result<Option<i64>, StoreError> {
        Ok(PlacementRepository::new(&self.tx).max_order_index(page_id, surface_id)?)
    }

    fn page_exists(&self, page_id: i64) -> Result<bool, StoreError> {
        Ok(LayoutRepository::new(&self.tx).page_exists(page_id)?)
    }

    fn create_placement(&mut self, placement: &NewPlacement) -> Result<Placement, StoreError> {
        Ok(PlacementRepository::new(&self.tx).create(placement)?)
    }

    fn delete_placements_for(&mut self, widget_id: &str) -> Result<usize, StoreError> {
        Ok(PlacementRepository::new(&self.tx).delete_by_widget(widget_id)?)
    }

    fn delete_widget(&mut self, widget_id: &str) -> Result<(), StoreError> {
        Ok(WidgetRepository::new(&self.tx).delete(widget_id)?)
    }

    fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().map_err(DbError::from)?;
        Ok(())
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        let message = err.to_string();
        if is_busy_error(&err) {
            return StoreError::Conflict(message);
        }
        match err {
            DbError::Sqlite(ref e) if is_unique_constraint_error(e) => StoreError::Conflict(message),
            DbError::Sqlite(ref e) if is_constraint_error(e) => StoreError::Constraint(message),
            DbError::Validation(_) => StoreError::Constraint(message),
            DbError::WidgetNotFound
            | DbError::PlacementNotFound
            | DbError::PageNotFound => StoreError::NotFound(message),
            _ => StoreError::Backend(message),
        }
    }
}
