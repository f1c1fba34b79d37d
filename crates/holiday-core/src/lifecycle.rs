//! The plugin's install / uninstall / enable / disable / update hooks,
//! composed from the registrar and a schema migrator.
//!
//! Filesystem steps and database steps run one after the other and are not
//! covered by a shared transaction. A crash between them can leave the asset
//! tree and the database out of step; re-running the hook repairs it.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::cache::CacheInvalidator;
use crate::error::RegistrarError;
use crate::fs::AssetFs;
use crate::migrate::SchemaMigrator;
use crate::model::{Placement, WidgetDefinition};
use crate::registrar::Registrar;
use crate::store::RegistryStore;

/// Where the plugin's files come from and where they are deployed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecyclePaths {
    /// Static assets shipped with the plugin.
    pub asset_source: PathBuf,
    /// Public plugin directory; assets land in `<asset_target>/assets`.
    pub asset_target: PathBuf,
    /// Widget template shipped with the plugin.
    pub widget_template: PathBuf,
    /// Host directory the widget template is deployed into.
    pub block_dir: PathBuf,
}

impl LifecyclePaths {
    /// Standard layout of a plugin's resource directory:
    /// `<resource>/assets` and `<resource>/template/Block/<ref>.twig`.
    pub fn from_resource_dir(
        resource_dir: &Path,
        asset_target: &Path,
        block_dir: &Path,
        definition: &WidgetDefinition,
    ) -> Self {
        Self {
            asset_source: resource_dir.join("assets"),
            asset_target: asset_target.to_path_buf(),
            widget_template: resource_dir
                .join("template")
                .join("Block")
                .join(definition.template_file_name()),
            block_dir: block_dir.to_path_buf(),
        }
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.asset_target.join("assets")
    }

    pub fn deploy_path(&self, definition: &WidgetDefinition) -> PathBuf {
        self.block_dir.join(definition.template_file_name())
    }
}

pub struct PluginLifecycle<S, F, C, M> {
    plugin_code: String,
    surface_id: String,
    paths: LifecyclePaths,
    registrar: Registrar<S, F, C>,
    migrator: M,
}

impl<S, F, C, M> PluginLifecycle<S, F, C, M>
where
    S: RegistryStore,
    F: AssetFs,
    C: CacheInvalidator,
    M: SchemaMigrator,
{
    pub fn new(
        plugin_code: impl Into<String>,
        surface_id: impl Into<String>,
        paths: LifecyclePaths,
        registrar: Registrar<S, F, C>,
        migrator: M,
    ) -> Self {
        Self {
            plugin_code: plugin_code.into(),
            surface_id: surface_id.into(),
            paths,
            registrar,
            migrator,
        }
    }

    pub fn plugin_code(&self) -> &str {
        &self.plugin_code
    }

    pub fn surface_id(&self) -> &str {
        &self.surface_id
    }

    pub fn paths(&self) -> &LifecyclePaths {
        &self.paths
    }

    pub fn registrar(&self) -> &Registrar<S, F, C> {
        &self.registrar
    }

    pub fn migrator_mut(&mut self) -> &mut M {
        &mut self.migrator
    }

    /// Creates the plugin tables, then copies the assets.
    pub fn install(&mut self) -> Result<(), RegistrarError> {
        let applied = self
            .migrator
            .apply_migrations(&self.plugin_code, None)
            .map_err(RegistrarError::Migration)?;
        let assets_dir = self.paths.assets_dir();
        self.registrar.install(&self.paths.asset_source, &assets_dir)?;
        info!(plugin = %self.plugin_code, migrations = applied, "plugin installed");
        Ok(())
    }

    /// Removes the widget, the assets and finally the plugin tables.
    pub fn uninstall(&mut self) -> Result<(), RegistrarError> {
        self.remove_widget()?;
        self.registrar.uninstall(&self.paths.asset_target)?;
        let reverted = self
            .migrator
            .revert_migrations(&self.plugin_code, 0)
            .map_err(RegistrarError::Migration)?;
        info!(plugin = %self.plugin_code, migrations = reverted, "plugin uninstalled");
        Ok(())
    }

    /// Places the widget on the configured surface.
    pub fn enable(&mut self) -> Result<Placement, RegistrarError> {
        let surface_id = self.surface_id.clone();
        self.enable_on(&surface_id)
    }

    pub fn enable_on(&mut self, surface_id: &str) -> Result<Placement, RegistrarError> {
        let deploy = self.paths.deploy_path(self.registrar.definition());
        let template = self.paths.widget_template.clone();
        self.registrar.enable(surface_id, &template, &deploy)
    }

    pub fn disable(&mut self) -> Result<(), RegistrarError> {
        self.remove_widget()
    }

    /// Nothing to migrate between releases of this plugin.
    pub fn update(&mut self) -> Result<(), RegistrarError> {
        info!(plugin = %self.plugin_code, "plugin update: nothing to do");
        Ok(())
    }

    pub fn schema_version(&mut self) -> Result<i32, RegistrarError> {
        self.migrator
            .current_version(&self.plugin_code)
            .map_err(RegistrarError::Migration)
    }

    pub fn assets_installed(&self) -> bool {
        self.paths.assets_dir().is_dir()
    }

    fn remove_widget(&mut self) -> Result<(), RegistrarError> {
        let deploy = self.paths.deploy_path(self.registrar.definition());
        let content_reference = self.registrar.definition().content_reference.clone();
        self.registrar.disable(&deploy, &content_reference)
    }
}
