use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Migration sets embedded into the crate: (directory under `migrations/`,
/// name of the generated static).
const MIGRATION_SETS: &[(&str, &str)] = &[
    ("host", "HOST_MIGRATIONS"),
    ("plugin", "PLUGIN_MIGRATIONS"),
];

#[derive(Debug, Default)]
struct MigrationFiles {
    slug: String,
    up: Option<String>,
    down: Option<String>,
}

fn main() {
    let manifest_dir = PathBuf::from(env_var("CARGO_MANIFEST_DIR"));
    let migrations_root = manifest_dir.join("migrations");
    println!("cargo:rerun-if-changed={}", migrations_root.display());

    let out_dir = PathBuf::from(env_var("OUT_DIR"));
    let out_path = out_dir.join("migrations.rs");
    let mut out = match fs::File::create(&out_path) {
        Ok(file) => file,
        Err(err) => panic!("holiday-db build: create {}: {err}", out_path.display()),
    };

    if let Err(err) = writeln!(
        out,
        "/// Generated; do not edit. Source: migrations/\n\
         #[derive(Clone, Copy, Debug)]\n\
         pub struct EmbeddedMigration {{\n\
           pub version: i32,\n\
           pub description: &'static str,\n\
           pub up_sql: &'static str,\n\
           pub down_sql: &'static str,\n\
         }}\n"
    ) {
        panic!("holiday-db build: write header: {err}");
    }

    for (dir_name, static_name) in MIGRATION_SETS {
        let dir = migrations_root.join(dir_name);
        let by_version = scan_migrations(&dir);
        write_set(&mut out, dir_name, static_name, &by_version);
    }
}

fn scan_migrations(dir: &Path) -> BTreeMap<i32, MigrationFiles> {
    println!("cargo:rerun-if-changed={}", dir.display());

    let mut by_version: BTreeMap<i32, MigrationFiles> = BTreeMap::new();
    for entry in walkdir::WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => panic!("holiday-db build: read migrations dir {}: {err}", dir.display()),
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let file_name = match path.file_name().and_then(|v| v.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };
        println!("cargo:rerun-if-changed={}", path.display());

        let parsed = match parse_migration_filename(&file_name) {
            Some(parsed) => parsed,
            None => continue,
        };

        let slot = by_version.entry(parsed.version).or_default();
        slot.slug = parsed.slug;
        match parsed.direction {
            Direction::Up => slot.up = Some(file_name),
            Direction::Down => slot.down = Some(file_name),
        }
    }
    by_version
}

fn write_set(
    out: &mut fs::File,
    dir_name: &str,
    static_name: &str,
    by_version: &BTreeMap<i32, MigrationFiles>,
) {
    if let Err(err) = writeln!(out, "pub static {static_name}: &[EmbeddedMigration] = &[") {
        panic!("holiday-db build: write {static_name}: {err}");
    }

    for (version, files) in by_version {
        let description = files.slug.replace('_', " ");
        let up_sql = include_expr(dir_name, &files.up);
        let down_sql = include_expr(dir_name, &files.down);
        if let Err(err) = writeln!(
            out,
            "  EmbeddedMigration {{ version: {version}, description: {desc:?}, up_sql: {up}, down_sql: {down} }},",
            desc = description,
            up = up_sql,
            down = down_sql
        ) {
            panic!("holiday-db build: write migration {dir_name}/{version}: {err}");
        }
    }

    if let Err(err) = writeln!(out, "];\n") {
        panic!("holiday-db build: write footer for {static_name}: {err}");
    }
}

fn env_var(key: &str) -> String {
    match env::var(key) {
        Ok(value) => value,
        Err(err) => panic!("holiday-db build: missing env {key}: {err}"),
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Up,
    Down,
}

#[derive(Debug, Clone)]
struct ParsedName {
    version: i32,
    slug: String,
    direction: Direction,
}

fn parse_migration_filename(name: &str) -> Option<ParsedName> {
    let (version_part, rest) = name.split_once('_')?;
    let version: i32 = version_part.parse().ok()?;

    if let Some(slug) = rest.strip_suffix(".up.sql") {
        return Some(ParsedName {
            version,
            slug: slug.to_string(),
            direction: Direction::Up,
        });
    }
    if let Some(slug) = rest.strip_suffix(".down.sql") {
        return Some(ParsedName {
            version,
            slug: slug.to_string(),
            direction: Direction::Down,
        });
    }
    None
}

fn include_expr(dir_name: &str, file_name: &Option<String>) -> String {
    match file_name {
        Some(file) => {
            let rel = format!("/migrations/{dir_name}/{file}");
            format!("include_str!(concat!(env!(\"CARGO_MANIFEST_DIR\"), {rel:?}))")
        }
        None => "\"\"".to_string(),
    }
}
