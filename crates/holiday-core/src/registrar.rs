//! Widget registrar: assets on install/uninstall, widget + placement rows on
//! enable/disable.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::cache::{CacheInvalidator, CacheScope};
use crate::error::{RegistrarError, StoreError};
use crate::fs::AssetFs;
use crate::model::{next_order_index, NewPlacement, Placement, Widget, WidgetDefinition, WidgetUpsert};
use crate::store::{RegistryStore, RegistryTx};

pub struct Registrar<S, F, C> {
    definition: WidgetDefinition,
    store: S,
    fs: F,
    cache: C,
}

impl<S, F, C> Registrar<S, F, C>
where
    S: RegistryStore,
    F: AssetFs,
    C: CacheInvalidator,
{
    pub fn new(definition: WidgetDefinition, store: S, fs: F, cache: C) -> Self {
        Self {
            definition,
            store,
            fs,
            cache,
        }
    }

    pub fn definition(&self) -> &WidgetDefinition {
        &self.definition
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn fs(&self) -> &F {
        &self.fs
    }

    /// Mirrors the asset tree. Persisted state is not touched.
    pub fn install(&mut self, asset_source: &Path, asset_target: &Path) -> Result<(), RegistrarError> {
        self.fs.mirror(asset_source, asset_target)?;
        info!(
            source = %asset_source.display(),
            target = %asset_target.display(),
            "assets installed"
        );
        Ok(())
    }

    /// Deletes the asset tree; an absent target counts as success.
    pub fn uninstall(&mut self, asset_target: &Path) -> Result<(), RegistrarError> {
        self.fs.remove(asset_target)?;
        info!(target = %asset_target.display(), "assets removed");
        Ok(())
    }

    /// Deploys the widget template and places the widget at the tail of
    /// `surface_id` on the definition's page.
    ///
    /// The widget row is upserted by content reference, so repeated calls
    /// never duplicate it. If the widget already sits on the surface the
    /// existing placement is returned unchanged. Widget and placement are
    /// written in one transaction: on any store error nothing new persists.
    pub fn enable(
        &mut self,
        surface_id: &str,
        widget_template: &Path,
        widget_deploy: &Path,
    ) -> Result<Placement, RegistrarError> {
        self.fs.copy_file(widget_template, widget_deploy)?;

        let placement = match self.register(surface_id) {
            Ok(placement) => placement,
            Err(err) => {
                warn!(
                    content_reference = %self.definition.content_reference,
                    surface = surface_id,
                    error = %err,
                    "widget registration rolled back"
                );
                return Err(err.into());
            }
        };
        info!(
            content_reference = %self.definition.content_reference,
            surface = %placement.surface_id,
            order_index = placement.order_index,
            "widget enabled"
        );
        Ok(placement)
    }

    fn register(&mut self, surface_id: &str) -> Result<Placement, StoreError> {
        let definition = &self.definition;
        let mut tx = self.store.begin()?;

        let widget = tx.upsert_widget(&WidgetUpsert::from_definition(definition))?;
        if let Some(existing) = tx.find_placement(&widget.id, definition.page_id, surface_id)? {
            tx.commit()?;
            debug!(placement_id = %existing.id, "widget already placed on surface");
            return Ok(existing);
        }

        let order_index = next_order_index(tx.max_order_index(definition.page_id, surface_id)?);
        if !tx.page_exists(definition.page_id)? {
            return Err(StoreError::NotFound(format!(
                "page layout {}",
                definition.page_id
            )));
        }
        let placement = tx.create_placement(&NewPlacement {
            widget_id: widget.id,
            page_id: definition.page_id,
            surface_id: surface_id.to_string(),
            order_index,
            visible: true,
        })?;
        tx.commit()?;
        Ok(placement)
    }

    /// Removes the deployed template, then the widget and all of its
    /// placements. Unknown widgets are a no-op. The presentation cache is
    /// cleared afterwards; a cache failure is only logged.
    pub fn disable(&mut self, widget_deploy: &Path, content_reference: &str) -> Result<(), RegistrarError> {
        self.fs.remove(widget_deploy)?;

        let mut tx = self.store.begin()?;
        let Some(widget) = tx.find_widget(content_reference)? else {
            debug!(content_reference, "no widget registered; nothing to disable");
            return Ok(());
        };
        let removed = tx.delete_placements_for(&widget.id)?;
        tx.delete_widget(&widget.id)?;
        tx.commit()?;
        info!(content_reference, placements = removed, "widget disabled");

        if let Err(err) = self.cache.invalidate(CacheScope::Templates) {
            warn!(error = %err, "cache invalidation failed");
        }
        Ok(())
    }

    /// The registered widget for this definition, if any.
    pub fn widget(&self) -> Result<Option<Widget>, RegistrarError> {
        Ok(self.store.find_widget(&self.definition.content_reference)?)
    }

    pub fn placements(&self) -> Result<Vec<Placement>, RegistrarError> {
        match self.widget()? {
            Some(widget) => Ok(self.store.placements_for(&widget.id)?),
            None => Ok(Vec::new()),
        }
    }
}
