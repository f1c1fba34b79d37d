//! In-memory store and migrator.
//!
//! Same contract as the SQLite adapters: transactions stage a copy of the
//! state and publish it on commit, surfaces are checked like a foreign key,
//! and (page, surface, order_index) is unique.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::StoreError;
use crate::migrate::SchemaMigrator;
use crate::model::{NewPlacement, Placement, Widget, WidgetUpsert, DEFAULT_PAGE_ID, LAYOUT_SURFACES};
use crate::store::{RegistryStore, RegistryTx};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    widgets: Vec<Widget>,
    placements: Vec<Placement>,
    pages: BTreeSet<i64>,
    surfaces: BTreeSet<String>,
    tick: u64,
}

impl MemoryState {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: MemoryState,
    fail_next_placement: bool,
    fail_next_delete: bool,
}

impl MemoryStore {
    /// A store seeded with the default page layout and the standard surfaces.
    pub fn new() -> Self {
        let mut store = Self::default();
        store.state.pages.insert(DEFAULT_PAGE_ID);
        for (id, _) in LAYOUT_SURFACES {
            store.state.surfaces.insert((*id).to_string());
        }
        store
    }

    pub fn add_page(&mut self, page_id: i64) {
        self.state.pages.insert(page_id);
    }

    pub fn remove_page(&mut self, page_id: i64) {
        self.state.pages.remove(&page_id);
    }

    pub fn add_surface(&mut self, surface_id: &str) {
        self.state.surfaces.insert(surface_id.to_string());
    }

    /// Places a stand-in widget at a fixed position, outside any
    /// transaction. Used to prepare occupied surfaces.
    pub fn seed_placement(&mut self, page_id: i64, surface_id: &str, order_index: i64) -> Placement {
        let tick = self.state.next_tick();
        let widget_id = format!("seed-widget-{tick}");
        self.state.widgets.push(Widget {
            id: widget_id.clone(),
            name: format!("seed {tick}"),
            content_reference: format!("seed_block_{tick}"),
            deletable: true,
            enabled: true,
            created_at: stamp(tick),
            updated_at: stamp(tick),
        });
        let placement = Placement {
            id: format!("seed-placement-{tick}"),
            widget_id,
            page_id,
            surface_id: surface_id.to_string(),
            order_index,
            visible: true,
            created_at: stamp(tick),
        };
        self.state.placements.push(placement.clone());
        placement
    }

    /// Makes the next `create_placement` call fail.
    pub fn fail_next_placement(&mut self) {
        self.fail_next_placement = true;
    }

    /// Makes the next `delete_widget` call fail.
    pub fn fail_next_delete(&mut self) {
        self.fail_next_delete = true;
    }

    pub fn widgets(&self) -> &[Widget] {
        &self.state.widgets
    }

    pub fn placements(&self) -> &[Placement] {
        &self.state.placements
    }

    pub fn placements_on(&self, page_id: i64, surface_id: &str) -> Vec<Placement> {
        let mut out: Vec<Placement> = self
            .state
            .placements
            .iter()
            .filter(|p| p.page_id == page_id && p.surface_id == surface_id)
            .cloned()
            .collect();
        out.sort_by_key(|p| p.order_index);
        out
    }
}

impl RegistryStore for MemoryStore {
    type Tx<'a> = MemoryTx<'a>;

    fn begin(&mut self) -> Result<Self::Tx<'_>, StoreError> {
        let staged = self.state.clone();
        Ok(MemoryTx {
            store: self,
            staged,
        })
    }

    fn find_widget(&self, content_reference: &str) -> Result<Option<Widget>, StoreError> {
        Ok(self
            .state
            .widgets
            .iter()
            .find(|w| w.content_reference == content_reference)
            .cloned())
    }

    fn placements_for(&self, widget_id: &str) -> Result<Vec<Placement>, StoreError> {
        let mut out: Vec<Placement> = self
            .state
            .placements
            .iter()
            .filter(|p| p.widget_id == widget_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            (a.page_id, &a.surface_id, a.order_index).cmp(&(b.page_id, &b.surface_id, b.order_index))
        });
        Ok(out)
    }
}

/// Transaction scope over a [`MemoryStore`]. Dropping it discards the staged
/// state.
pub struct MemoryTx<'a> {
    store: &'a mut MemoryStore,
    staged: MemoryState,
}

impl RegistryTx for MemoryTx<'_> {
    fn upsert_widget(&mut self, widget: &WidgetUpsert) -> Result<Widget, StoreError> {
        let tick = self.staged.next_tick();
        if let Some(existing) = self
            .staged
            .widgets
            .iter_mut()
            .find(|w| w.content_reference == widget.content_reference)
        {
            existing.name = widget.name.clone();
            existing.deletable = widget.deletable;
            existing.enabled = widget.enabled;
            existing.updated_at = stamp(tick);
            return Ok(existing.clone());
        }

        let row = Widget {
            id: format!("widget-{tick}"),
            name: widget.name.clone(),
            content_reference: widget.content_reference.clone(),
            deletable: widget.deletable,
            enabled: widget.enabled,
            created_at: stamp(tick),
            updated_at: stamp(tick),
        };
        self.staged.widgets.push(row.clone());
        Ok(row)
    }

    fn find_widget(&self, content_reference: &str) -> Result<Option<Widget>, StoreError> {
        Ok(self
            .staged
            .widgets
            .iter()
            .find(|w| w.content_reference == content_reference)
            .cloned())
    }

    fn find_placement(
        &self,
        widget_id: &str,
        page_id: i64,
        surface_id: &str,
    ) -> Result<Option<Placement>, StoreError> {
        Ok(self
            .staged
            .placements
            .iter()
            .filter(|p| p.widget_id == widget_id && p.page_id == page_id && p.surface_id == surface_id)
            .min_by_key(|p| p.order_index)
            .cloned())
    }

    fn max_order_index(&self, page_id: i64, surface_id: &str) -> Result<Option<i64>, StoreError> {
        Ok(self
            .staged
            .placements
            .iter()
            .filter(|p| p.page_id == page_id && p.surface_id == surface_id)
            .map(|p| p.order_index)
            .max())
    }

    fn page_exists(&self, page_id: i64) -> Result<bool, StoreError> {
        Ok(self.staged.pages.contains(&page_id))
    }

    fn create_placement(&mut self, placement: &NewPlacement) -> Result<Placement, StoreError> {
        if self.store.fail_next_placement {
            self.store.fail_next_placement = false;
            return Err(StoreError::Backend("placement insert failed".into()));
        }
        if !self.staged.widgets.iter().any(|w| w.id == placement.widget_id) {
            return Err(StoreError::Constraint(format!(
                "widget {} does not exist",
                placement.widget_id
            )));
        }
        if !self.staged.surfaces.contains(&placement.surface_id) {
            return Err(StoreError::Constraint(format!(
                "surface {} does not exist",
                placement.surface_id
            )));
        }
        let taken = self.staged.placements.iter().any(|p| {
            p.page_id == placement.page_id
                && p.surface_id == placement.surface_id
                && p.order_index == placement.order_index
        });
        if taken {
            return Err(StoreError::Conflict(format!(
                "order_index {} already used on {}",
                placement.order_index, placement.surface_id
            )));
        }

        let tick = self.staged.next_tick();
        let row = Placement {
            id: format!("placement-{tick}"),
            widget_id: placement.widget_id.clone(),
            page_id: placement.page_id,
            surface_id: placement.surface_id.clone(),
            order_index: placement.order_index,
            visible: placement.visible,
            created_at: stamp(tick),
        };
        self.staged.placements.push(row.clone());
        Ok(row)
    }

    fn delete_placements_for(&mut self, widget_id: &str) -> Result<usize, StoreError> {
        let before = self.staged.placements.len();
        self.staged.placements.retain(|p| p.widget_id != widget_id);
        Ok(before - self.staged.placements.len())
    }

    fn delete_widget(&mut self, widget_id: &str) -> Result<(), StoreError> {
        if self.store.fail_next_delete {
            self.store.fail_next_delete = false;
            return Err(StoreError::Backend("widget delete failed".into()));
        }
        let before = self.staged.widgets.len();
        self.staged.widgets.retain(|w| w.id != widget_id);
        if self.staged.widgets.len() == before {
            return Err(StoreError::NotFound(format!("widget {widget_id}")));
        }
        self.staged.placements.retain(|p| p.widget_id != widget_id);
        Ok(())
    }

    fn commit(self) -> Result<(), StoreError> {
        self.store.state = self.staged;
        Ok(())
    }
}

fn stamp(tick: u64) -> String {
    format!("tick-{tick:03}")
}

/// Records plugin schema versions without touching a database.
#[derive(Debug, Clone)]
pub struct MemoryMigrator {
    latest_version: i32,
    versions: BTreeMap<String, i32>,
    fail_with: Option<String>,
}

impl MemoryMigrator {
    pub fn new(latest_version: i32) -> Self {
        Self {
            latest_version,
            versions: BTreeMap::new(),
            fail_with: None,
        }
    }

    /// Makes every following call fail with `message`.
    pub fn fail_with(&mut self, message: &str) {
        self.fail_with = Some(message.to_string());
    }

    pub fn latest_version(&self) -> i32 {
        self.latest_version
    }

    pub fn version_of(&self, plugin_code: &str) -> i32 {
        self.versions.get(plugin_code).copied().unwrap_or(0)
    }

    fn check(&self) -> Result<(), String> {
        match &self.fail_with {
            Some(message) => Err(message.clone()),
            None => Ok(()),
        }
    }
}

impl SchemaMigrator for MemoryMigrator {
    fn apply_migrations(&mut self, plugin_code: &str, target: Option<i32>) -> Result<usize, String> {
        self.check()?;
        let target = target.unwrap_or(self.latest_version);
        if target > self.latest_version {
            return Err(format!(
                "target version {target} not found (max {})",
                self.latest_version
            ));
        }
        let current = self.version_of(plugin_code);
        if target <= current {
            return Ok(0);
        }
        self.versions.insert(plugin_code.to_string(), target);
        Ok((target - current) as usize)
    }

    fn revert_migrations(&mut self, plugin_code: &str, target: i32) -> Result<usize, String> {
        self.check()?;
        if target < 0 {
            return Err(format!("target version {target} cannot be negative"));
        }
        let current = self.version_of(plugin_code);
        if target >= current {
            return Ok(0);
        }
        if target == 0 {
            self.versions.remove(plugin_code);
        } else {
            self.versions.insert(plugin_code.to_string(), target);
        }
        Ok((current - target) as usize)
    }

    fn current_version(&mut self, plugin_code: &str) -> Result<i32, String> {
        self.check()?;
        Ok(self.version_of(plugin_code))
    }
}
