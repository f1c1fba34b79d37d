#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::fs;
use std::path::Path;

use holiday_cli::backend::InMemoryLifecycleBackend;
use holiday_cli::commands::run_for_test;
use tempfile::TempDir;

fn seed_resources(root: &Path) {
    let resource = root.join("app/Plugin/Holiday/Resource");
    fs::create_dir_all(resource.join("assets/css")).unwrap();
    fs::write(resource.join("assets/css/holiday.css"), ".holiday{}").unwrap();
    fs::create_dir_all(resource.join("template/Block")).unwrap();
    fs::write(
        resource.join("template/Block/holiday_calendar_block.twig"),
        "<div class=\"holiday\"></div>",
    )
    .unwrap();
}

fn setup() -> (TempDir, InMemoryLifecycleBackend) {
    let tmp = tempfile::tempdir().unwrap();
    seed_resources(tmp.path());
    let backend = InMemoryLifecycleBackend::new(tmp.path());
    (tmp, backend)
}

#[test]
fn install_enable_disable_uninstall_flow() {
    let (tmp, mut backend) = setup();

    let install = run_for_test(&["install"], &mut backend);
    assert_eq!(install.exit_code, 0, "stderr: {}", install.stderr);
    assert_eq!(install.stdout, "Plugin installed\n");
    assert!(tmp.path().join("html/plugin/holiday/assets/css/holiday.css").is_file());

    let enable = run_for_test(&["enable"], &mut backend);
    assert_eq!(enable.exit_code, 0, "stderr: {}", enable.stderr);
    assert_eq!(
        enable.stdout,
        "Widget placed on bottom-surface (page 1, position 1)\n"
    );
    assert!(tmp
        .path()
        .join("app/template/default/Block/holiday_calendar_block.twig")
        .is_file());

    let disable = run_for_test(&["disable"], &mut backend);
    assert_eq!(disable.exit_code, 0);
    assert_eq!(disable.stdout, "Widget removed\n");
    assert!(backend.lifecycle().registrar().store().widgets().is_empty());

    let uninstall = run_for_test(&["uninstall"], &mut backend);
    assert_eq!(uninstall.exit_code, 0);
    assert!(!tmp.path().join("html/plugin/holiday").exists());
}

#[test]
fn enable_json_reports_placement() {
    let (_tmp, mut backend) = setup();
    let out = run_for_test(&["enable", "--surface", "footer", "--json"], &mut backend);
    assert_eq!(out.exit_code, 0, "stderr: {}", out.stderr);

    let value: serde_json::Value = serde_json::from_str(&out.stdout).unwrap();
    assert_eq!(value["surface_id"], "footer");
    assert_eq!(value["order_index"], 1);
    assert_eq!(value["page_id"], 1);
    assert_eq!(value["visible"], true);
}

#[test]
fn status_text_lists_placements() {
    let (_tmp, mut backend) = setup();
    assert_eq!(run_for_test(&["install"], &mut backend).exit_code, 0);
    assert_eq!(run_for_test(&["enable"], &mut backend).exit_code, 0);

    let out = run_for_test(&["status"], &mut backend);
    assert_eq!(out.exit_code, 0, "stderr: {}", out.stderr);
    assert!(out.stdout.contains("Plugin:          Holiday"));
    assert!(out.stdout.contains("Schema version:  1"));
    assert!(out.stdout.contains("Widget:          Holiday Block (holiday_calendar_block)"));
    assert!(out.stdout.contains("PAGE"));
    assert!(out.stdout.contains("bottom-surface"));
}

#[test]
fn status_json_before_install() {
    let (_tmp, mut backend) = setup();
    let out = run_for_test(&["status", "--json"], &mut backend);
    assert_eq!(out.exit_code, 0);

    let value: serde_json::Value = serde_json::from_str(&out.stdout).unwrap();
    assert_eq!(value["schema_version"], 0);
    assert_eq!(value["assets_installed"], false);
    assert!(value["widget"].is_null());
    assert_eq!(value["placements"].as_array().map(Vec::len), Some(0));
    assert_eq!(value["migrations"][0]["applied"], false);
}

#[test]
fn quiet_suppresses_acknowledgements() {
    let (_tmp, mut backend) = setup();
    let out = run_for_test(&["install", "--quiet"], &mut backend);
    assert_eq!(out.exit_code, 0);
    assert!(out.stdout.is_empty());
}

#[test]
fn enable_on_unknown_surface_fails_and_rolls_back() {
    let (_tmp, mut backend) = setup();
    let out = run_for_test(&["enable", "--surface", "nowhere"], &mut backend);
    assert_eq!(out.exit_code, 1);
    assert!(out.stdout.is_empty());
    assert!(out.stderr.starts_with("enable failed: registration failed:"), "{}", out.stderr);
    assert!(backend.lifecycle().registrar().store().widgets().is_empty());
}

#[test]
fn missing_template_reports_io_error() {
    let tmp = tempfile::tempdir().unwrap();
    let mut backend = InMemoryLifecycleBackend::new(tmp.path());
    let out = run_for_test(&["enable"], &mut backend);
    assert_eq!(out.exit_code, 1);
    assert!(out.stderr.contains("io: copy"), "{}", out.stderr);
}

#[test]
fn update_is_a_no_op() {
    let (_tmp, mut backend) = setup();
    let out = run_for_test(&["update", "--json"], &mut backend);
    assert_eq!(out.exit_code, 0);
    let value: serde_json::Value = serde_json::from_str(&out.stdout).unwrap();
    assert_eq!(value["action"], "update");
    assert_eq!(value["ok"], true);
}
