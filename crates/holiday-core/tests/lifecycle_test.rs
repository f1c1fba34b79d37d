//! Plugin hook sequencing with in-memory collaborators.
#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::fs;

use holiday_core::{
    LifecyclePaths, LocalFs, MemoryMigrator, MemoryStore, NoopCache, PluginLifecycle, Registrar,
    RegistrarError, WidgetDefinition,
};
use tempfile::TempDir;

type MemoryLifecycle = PluginLifecycle<MemoryStore, LocalFs, NoopCache, MemoryMigrator>;

fn setup() -> (TempDir, MemoryLifecycle) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let resource = tmp.path().join("plugin/Holiday/Resource");
    fs::create_dir_all(resource.join("assets/css")).unwrap();
    fs::write(resource.join("assets/css/holiday.css"), ".closed{}").unwrap();
    fs::create_dir_all(resource.join("template/Block")).unwrap();
    fs::write(
        resource.join("template/Block/holiday_calendar_block.twig"),
        "{# holiday calendar #}",
    )
    .unwrap();

    let definition = WidgetDefinition::holiday_calendar();
    let paths = LifecyclePaths::from_resource_dir(
        &resource,
        &tmp.path().join("html/plugin/holiday"),
        &tmp.path().join("app/template/default/Block"),
        &definition,
    );
    let registrar = Registrar::new(definition, MemoryStore::new(), LocalFs, NoopCache);
    let lifecycle = PluginLifecycle::new(
        "Holiday",
        "bottom-surface",
        paths,
        registrar,
        MemoryMigrator::new(1),
    );
    (tmp, lifecycle)
}

#[test]
fn paths_follow_resource_layout() {
    let (tmp, lifecycle) = setup();
    let paths = lifecycle.paths();
    assert_eq!(paths.asset_source, tmp.path().join("plugin/Holiday/Resource/assets"));
    assert_eq!(
        paths.widget_template,
        tmp.path()
            .join("plugin/Holiday/Resource/template/Block/holiday_calendar_block.twig")
    );
    assert_eq!(
        paths.deploy_path(&WidgetDefinition::holiday_calendar()),
        tmp.path().join("app/template/default/Block/holiday_calendar_block.twig")
    );
    assert_eq!(paths.assets_dir(), tmp.path().join("html/plugin/holiday/assets"));
}

#[test]
fn full_lifecycle_round_trip() {
    let (tmp, mut lifecycle) = setup();

    lifecycle.install().unwrap();
    assert!(lifecycle.assets_installed());
    assert!(tmp.path().join("html/plugin/holiday/assets/css/holiday.css").is_file());
    assert_eq!(lifecycle.schema_version().unwrap(), 1);

    let placement = lifecycle.enable().unwrap();
    assert_eq!(placement.surface_id, "bottom-surface");
    assert_eq!(placement.order_index, 1);
    let deployed = tmp.path().join("app/template/default/Block/holiday_calendar_block.twig");
    assert!(deployed.is_file());

    lifecycle.disable().unwrap();
    assert!(!deployed.exists());
    assert!(lifecycle.registrar().widget().unwrap().is_none());

    lifecycle.update().unwrap();

    lifecycle.uninstall().unwrap();
    assert!(!tmp.path().join("html/plugin/holiday").exists());
    assert_eq!(lifecycle.schema_version().unwrap(), 0);
}

#[test]
fn uninstall_while_enabled_removes_widget() {
    let (tmp, mut lifecycle) = setup();
    lifecycle.install().unwrap();
    lifecycle.enable().unwrap();

    lifecycle.uninstall().unwrap();

    assert!(lifecycle.registrar().store().widgets().is_empty());
    assert!(lifecycle.registrar().store().placements().is_empty());
    assert!(!tmp
        .path()
        .join("app/template/default/Block/holiday_calendar_block.twig")
        .exists());
}

#[test]
fn enable_on_named_surface() {
    let (_tmp, mut lifecycle) = setup();
    let placement = lifecycle.enable_on("footer").unwrap();
    assert_eq!(placement.surface_id, "footer");
}

#[test]
fn install_migration_failure_skips_asset_copy() {
    let (tmp, mut lifecycle) = setup();
    lifecycle.migrator_mut().fail_with("database is read-only");

    let err = lifecycle.install().unwrap_err();

    assert!(matches!(err, RegistrarError::Migration(ref msg) if msg.contains("read-only")));
    assert!(!tmp.path().join("html/plugin/holiday").exists());
}

#[test]
fn uninstall_twice_is_ok() {
    let (_tmp, mut lifecycle) = setup();
    lifecycle.install().unwrap();
    lifecycle.uninstall().unwrap();
    lifecycle.uninstall().unwrap();
    assert_eq!(lifecycle.schema_version().unwrap(), 0);
}
