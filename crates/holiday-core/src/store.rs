//! Persisted-state port used by the registrar.
//!
//! A store hands out a transaction scope from [`RegistryStore::begin`]. All
//! writes go through the scope; nothing is visible until
//! [`RegistryTx::commit`], and dropping an uncommitted scope rolls it back.

use crate::error::StoreError;
use crate::model::{NewPlacement, Placement, Widget, WidgetUpsert};

pub trait RegistryStore {
    type Tx<'a>: RegistryTx
    where
        Self: 'a;

    /// Opens a write transaction.
    fn begin(&mut self) -> Result<Self::Tx<'_>, StoreError>;

    fn find_widget(&self, content_reference: &str) -> Result<Option<Widget>, StoreError>;

    /// Placements of a widget ordered by (page, surface, order_index).
    fn placements_for(&self, widget_id: &str) -> Result<Vec<Placement>, StoreError>;
}

/// A transaction scope. Rolls back on drop unless committed.
pub trait RegistryTx {
    /// Inserts the widget or updates the row with the same content
    /// reference, atomically. Returns the stored row.
    fn upsert_widget(&mut self, widget: &WidgetUpsert) -> Result<Widget, StoreError>;

    /// Looks up a widget as this transaction sees it.
    fn find_widget(&self, content_reference: &str) -> Result<Option<Widget>, StoreError>;

    fn find_placement(
        &self,
        widget_id: &str,
        page_id: i64,
        surface_id: &str,
    ) -> Result<Option<Placement>, StoreError>;

    /// Highest order_index on a surface, `None` when the surface is empty.
    fn max_order_index(&self, page_id: i64, surface_id: &str) -> Result<Option<i64>, StoreError>;

    fn page_exists(&self, page_id: i64) -> Result<bool, StoreError>;

    fn create_placement(&mut self, placement: &NewPlacement) -> Result<Placement, StoreError>;

    /// Returns the number of placements removed.
    fn delete_placements_for(&mut self, widget_id: &str) -> Result<usize, StoreError>;

    fn delete_widget(&mut self, widget_id: &str) -> Result<(), StoreError>;

    fn commit(self) -> Result<(), StoreError>
    where
        Self: Sized;
}
