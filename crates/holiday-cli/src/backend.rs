//! Backends the lifecycle commands run against.

use std::path::Path;

use holiday_core::{
    DirCacheInvalidator, LifecyclePaths, LocalFs, MemoryMigrator, MemoryStore, NoopCache,
    Placement, PluginLifecycle, Registrar, Widget, WidgetDefinition,
};
use holiday_db::{PluginMigrator, SqliteRegistryStore};
use serde::Serialize;

use crate::config::Config;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationRow {
    pub version: i32,
    pub description: String,
    pub applied: bool,
    pub applied_at: String,
}

/// Everything `status` reports about the installed plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub plugin_code: String,
    pub schema_version: i32,
    pub assets_installed: bool,
    pub migrations: Vec<MigrationRow>,
    pub widget: Option<Widget>,
    pub placements: Vec<Placement>,
}

pub trait LifecycleBackend {
    fn install(&mut self) -> Result<(), String>;
    fn uninstall(&mut self) -> Result<(), String>;
    /// Places the widget on `surface`, or on the configured surface.
    fn enable(&mut self, surface: Option<&str>) -> Result<Placement, String>;
    fn disable(&mut self) -> Result<(), String>;
    fn update(&mut self) -> Result<(), String>;
    fn status(&mut self) -> Result<StatusReport, String>;
}

type SqliteLifecycle = PluginLifecycle<SqliteRegistryStore, LocalFs, DirCacheInvalidator, PluginMigrator>;

pub struct SqliteLifecycleBackend {
    lifecycle: SqliteLifecycle,
}

impl SqliteLifecycleBackend {
    /// Opens the database twice: one connection for registry transactions,
    /// one for plugin migrations.
    pub fn open(cfg: &Config) -> Result<Self, String> {
        let mut db_cfg = holiday_db::Config::new(cfg.database_path());
        db_cfg.busy_timeout_ms = cfg.database.busy_timeout_ms;

        let store = SqliteRegistryStore::open(db_cfg.clone()).map_err(|err| err.to_string())?;
        let migrator_db = holiday_db::Db::open(db_cfg).map_err(|err| err.to_string())?;

        let definition = WidgetDefinition::holiday_calendar();
        let paths = LifecyclePaths::from_resource_dir(
            &cfg.resource_dir(),
            &cfg.asset_target(),
            &cfg.block_dir(),
            &definition,
        );
        let registrar = Registrar::new(
            definition,
            store,
            LocalFs,
            DirCacheInvalidator::new(cfg.cache_dir()),
        );
        Ok(Self {
            lifecycle: PluginLifecycle::new(
                cfg.plugin.code.clone(),
                cfg.plugin.surface.clone(),
                paths,
                registrar,
                PluginMigrator::holiday(migrator_db),
            ),
        })
    }

    fn migration_rows(&mut self) -> Result<Vec<MigrationRow>, String> {
        let code = self.lifecycle.plugin_code().to_string();
        let status = self
            .lifecycle
            .migrator_mut()
            .status(&code)
            .map_err(|err| err.to_string())?;
        Ok(status
            .into_iter()
            .map(|row| MigrationRow {
                version: row.version,
                description: row.description,
                applied: row.applied,
                applied_at: row.applied_at,
            })
            .collect())
    }
}

impl LifecycleBackend for SqliteLifecycleBackend {
    fn install(&mut self) -> Result<(), String> {
        self.lifecycle.install().map_err(|err| err.to_string())
    }

    fn uninstall(&mut self) -> Result<(), String> {
        self.lifecycle.uninstall().map_err(|err| err.to_string())
    }

    fn enable(&mut self, surface: Option<&str>) -> Result<Placement, String> {
        enable_on(&mut self.lifecycle, surface)
    }

    fn disable(&mut self) -> Result<(), String> {
        self.lifecycle.disable().map_err(|err| err.to_string())
    }

    fn update(&mut self) -> Result<(), String> {
        self.lifecycle.update().map_err(|err| err.to_string())
    }

    fn status(&mut self) -> Result<StatusReport, String> {
        let migrations = self.migration_rows()?;
        report(&mut self.lifecycle, migrations)
    }
}

type MemoryLifecycle = PluginLifecycle<MemoryStore, LocalFs, NoopCache, MemoryMigrator>;

/// Real filesystem, in-memory registry and migrations. Used by tests and
/// for dry runs.
pub struct InMemoryLifecycleBackend {
    lifecycle: MemoryLifecycle,
}

impl InMemoryLifecycleBackend {
    pub fn new(root: &Path) -> Self {
        let definition = WidgetDefinition::holiday_calendar();
        let paths = LifecyclePaths::from_resource_dir(
            &root.join("app/Plugin/Holiday/Resource"),
            &root.join("html/plugin/holiday"),
            &root.join("app/template/default/Block"),
            &definition,
        );
        let registrar = Registrar::new(definition, MemoryStore::new(), LocalFs, NoopCache);
        Self {
            lifecycle: PluginLifecycle::new(
                "Holiday",
                holiday_core::model::DEFAULT_SURFACE,
                paths,
                registrar,
                MemoryMigrator::new(1),
            ),
        }
    }

    pub fn lifecycle(&self) -> &MemoryLifecycle {
        &self.lifecycle
    }
}

impl LifecycleBackend for InMemoryLifecycleBackend {
    fn install(&mut self) -> Result<(), String> {
        self.lifecycle.install().map_err(|err| err.to_string())
    }

    fn uninstall(&mut self) -> Result<(), String> {
        self.lifecycle.uninstall().map_err(|err| err.to_string())
    }

    fn enable(&mut self, surface: Option<&str>) -> Result<Placement, String> {
        enable_on(&mut self.lifecycle, surface)
    }

    fn disable(&mut self) -> Result<(), String> {
        self.lifecycle.disable().map_err(|err| err.to_string())
    }

    fn update(&mut self) -> Result<(), String> {
        self.lifecycle.update().map_err(|err| err.to_string())
    }

    fn status(&mut self) -> Result<StatusReport, String> {
        let code = self.lifecycle.plugin_code().to_string();
        let migrator = self.lifecycle.migrator_mut();
        let current = migrator.version_of(&code);
        let migrations = (1..=migrator.latest_version())
            .map(|version| MigrationRow {
                version,
                description: format!("migration {version}"),
                applied: version <= current,
                applied_at: String::new(),
            })
            .collect();
        report(&mut self.lifecycle, migrations)
    }
}

fn enable_on<S, F, C, M>(
    lifecycle: &mut PluginLifecycle<S, F, C, M>,
    surface: Option<&str>,
) -> Result<Placement, String>
where
    S: holiday_core::RegistryStore,
    F: holiday_core::AssetFs,
    C: holiday_core::CacheInvalidator,
    M: holiday_core::SchemaMigrator,
{
    let result = match surface {
        Some(surface) => lifecycle.enable_on(surface),
        None => lifecycle.enable(),
    };
    result.map_err(|err| err.to_string())
}

fn report<S, F, C, M>(
    lifecycle: &mut PluginLifecycle<S, F, C, M>,
    migrations: Vec<MigrationRow>,
) -> Result<StatusReport, String>
where
    S: holiday_core::RegistryStore,
    F: holiday_core::AssetFs,
    C: holiday_core::CacheInvalidator,
    M: holiday_core::SchemaMigrator,
{
    let schema_version = lifecycle.schema_version().map_err(|err| err.to_string())?;
    let registrar = lifecycle.registrar();
    Ok(StatusReport {
        plugin_code: lifecycle.plugin_code().to_string(),
        schema_version,
        assets_installed: lifecycle.assets_installed(),
        migrations,
        widget: registrar.widget().map_err(|err| err.to_string())?,
        placements: registrar.placements().map_err(|err| err.to_string())?,
    })
}
