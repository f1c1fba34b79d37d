//! CLI configuration: built-in defaults overlaid by an optional YAML file,
//! then by environment overrides.

use std::path::{Path, PathBuf};

use holiday_core::model::DEFAULT_SURFACE;
use serde::Deserialize;

/// Names the config file when `--config` is not given.
pub const CONFIG_ENV: &str = "HOLIDAY_CONFIG";
/// Overrides `database.path`.
pub const DB_PATH_ENV: &str = "HOLIDAY_DB_PATH";

#[derive(Debug, Clone)]
pub struct Config {
    pub global: GlobalConfig,
    pub database: DatabaseConfig,
    pub plugin: PluginConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct GlobalConfig {
    /// Host installation root; relative plugin paths resolve against it.
    pub root_dir: PathBuf,
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct PluginConfig {
    pub code: String,
    pub surface: String,
    pub resource_dir: PathBuf,
    pub asset_target: PathBuf,
    pub block_dir: PathBuf,
    pub cache_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Config {
    fn defaults(env: &dyn Fn(&str) -> Option<String>) -> Self {
        let home = env("HOME").unwrap_or_default();
        let data_dir = if home.trim().is_empty() {
            PathBuf::from(".")
        } else {
            PathBuf::from(&home)
                .join(".local")
                .join("share")
                .join("holiday")
        };
        Self {
            global: GlobalConfig {
                root_dir: PathBuf::from("."),
                data_dir,
            },
            database: DatabaseConfig {
                path: None,
                busy_timeout_ms: 5000,
            },
            plugin: PluginConfig {
                code: "Holiday".to_string(),
                surface: DEFAULT_SURFACE.to_string(),
                resource_dir: PathBuf::from("app/Plugin/Holiday/Resource"),
                asset_target: PathBuf::from("html/plugin/holiday"),
                block_dir: PathBuf::from("app/template/default/Block"),
                cache_dir: PathBuf::from("var/cache/prod"),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "console".to_string(),
            },
        }
    }

    pub fn database_path(&self) -> PathBuf {
        if let Some(path) = &self.database.path {
            return path.clone();
        }
        self.global.data_dir.join("holiday.db")
    }

    pub fn resource_dir(&self) -> PathBuf {
        self.rooted(&self.plugin.resource_dir)
    }

    pub fn asset_target(&self) -> PathBuf {
        self.rooted(&self.plugin.asset_target)
    }

    pub fn block_dir(&self) -> PathBuf {
        self.rooted(&self.plugin.block_dir)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.rooted(&self.plugin.cache_dir)
    }

    fn rooted(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.global.root_dir.join(path)
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let mut errors: Vec<String> = Vec::new();
        if self.plugin.code.trim().is_empty() {
            errors.push("plugin.code: plugin code is required".into());
        }
        if self.plugin.surface.trim().is_empty() || self.plugin.surface.contains(char::is_whitespace) {
            errors.push(format!(
                "plugin.surface: invalid surface id '{}'",
                self.plugin.surface
            ));
        }
        if !matches!(self.logging.format.as_str(), "console" | "compact") {
            errors.push(format!(
                "logging.format: expected console or compact, got '{}'",
                self.logging.format
            ));
        }
        if !errors.is_empty() {
            return Err(format!("invalid config: {}", errors.join("; ")));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct PartialConfig {
    #[serde(default)]
    global: PartialGlobalConfig,
    #[serde(default)]
    database: PartialDatabaseConfig,
    #[serde(default)]
    plugin: PartialPluginConfig,
    #[serde(default)]
    logging: PartialLoggingConfig,
}

#[derive(Debug, Default, Deserialize)]
struct PartialGlobalConfig {
    #[serde(default)]
    root_dir: String,
    #[serde(default)]
    data_dir: String,
}

#[derive(Debug, Default, Deserialize)]
struct PartialDatabaseConfig {
    #[serde(default)]
    path: String,
    #[serde(default)]
    busy_timeout_ms: i64,
}

#[derive(Debug, Default, Deserialize)]
struct PartialPluginConfig {
    #[serde(default)]
    code: String,
    #[serde(default)]
    surface: String,
    #[serde(default)]
    resource_dir: String,
    #[serde(default)]
    asset_target: String,
    #[serde(default)]
    block_dir: String,
    #[serde(default)]
    cache_dir: String,
}

#[derive(Debug, Default, Deserialize)]
struct PartialLoggingConfig {
    #[serde(default)]
    level: String,
    #[serde(default)]
    format: String,
}

/// Loads config with precedence defaults < config file < environment.
///
/// The file is `config_file` when given, else `$HOLIDAY_CONFIG`, else the
/// per-user default. An explicitly named file must be readable; a missing
/// default file is skipped.
pub fn load_config(config_file: Option<&str>) -> Result<(Config, Option<PathBuf>), String> {
    load_config_with_env(config_file, &|key| std::env::var(key).ok())
}

pub fn load_config_with_env(
    config_file: Option<&str>,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<(Config, Option<PathBuf>), String> {
    let mut cfg = Config::defaults(env);

    let explicit = config_file
        .map(str::to_string)
        .or_else(|| env(CONFIG_ENV))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from);

    let (path_to_try, required) = match explicit {
        Some(path) => (Some(path), true),
        None => (default_config_path(env), false),
    };

    let mut used = None;
    if let Some(path) = path_to_try {
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                let parsed: PartialConfig =
                    serde_yaml::from_str(&text).map_err(|err| format!("parse config: {err}"))?;
                apply_partial(&mut cfg, parsed, env)?;
                used = Some(path);
            }
            Err(err) => {
                if required {
                    return Err(format!(
                        "failed to load config file {}: {err}",
                        path.display()
                    ));
                }
            }
        }
    }

    if let Some(db_path) = env(DB_PATH_ENV).filter(|v| !v.trim().is_empty()) {
        cfg.database.path = Some(expand_tilde(db_path.trim(), env)?);
    }

    cfg.validate()?;
    Ok((cfg, used))
}

fn default_config_path(env: &dyn Fn(&str) -> Option<String>) -> Option<PathBuf> {
    if let Some(xdg) = env("XDG_CONFIG_HOME") {
        if !xdg.trim().is_empty() {
            return Some(PathBuf::from(xdg).join("holiday").join("config.yaml"));
        }
    }
    if let Some(home) = env("HOME") {
        if !home.trim().is_empty() {
            return Some(
                PathBuf::from(home)
                    .join(".config")
                    .join("holiday")
                    .join("config.yaml"),
            );
        }
    }
    None
}

fn apply_partial(
    cfg: &mut Config,
    partial: PartialConfig,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<(), String> {
    if !partial.global.root_dir.trim().is_empty() {
        cfg.global.root_dir = expand_tilde(partial.global.root_dir.trim(), env)?;
    }
    if !partial.global.data_dir.trim().is_empty() {
        cfg.global.data_dir = expand_tilde(partial.global.data_dir.trim(), env)?;
    }
    if !partial.database.path.trim().is_empty() {
        cfg.database.path = Some(expand_tilde(partial.database.path.trim(), env)?);
    }
    if partial.database.busy_timeout_ms < 0 {
        return Err(format!(
            "invalid config: database.busy_timeout_ms must be >= 0, got {}",
            partial.database.busy_timeout_ms
        ));
    }
    if partial.database.busy_timeout_ms > 0 {
        cfg.database.busy_timeout_ms = partial.database.busy_timeout_ms as u64;
    }

    let plugin = partial.plugin;
    if !plugin.code.trim().is_empty() {
        cfg.plugin.code = plugin.code.trim().to_string();
    }
    if !plugin.surface.trim().is_empty() {
        cfg.plugin.surface = plugin.surface.trim().to_string();
    }
    for (value, slot) in [
        (plugin.resource_dir, &mut cfg.plugin.resource_dir),
        (plugin.asset_target, &mut cfg.plugin.asset_target),
        (plugin.block_dir, &mut cfg.plugin.block_dir),
        (plugin.cache_dir, &mut cfg.plugin.cache_dir),
    ] {
        if !value.trim().is_empty() {
            *slot = expand_tilde(value.trim(), env)?;
        }
    }

    if !partial.logging.level.trim().is_empty() {
        cfg.logging.level = partial.logging.level.trim().to_string();
    }
    if !partial.logging.format.trim().is_empty() {
        cfg.logging.format = partial.logging.format.trim().to_string();
    }
    Ok(())
}

fn expand_tilde(input: &str, env: &dyn Fn(&str) -> Option<String>) -> Result<PathBuf, String> {
    let home = || env("HOME").ok_or_else(|| "failed to resolve HOME".to_string());
    if input == "~" {
        return Ok(PathBuf::from(home()?));
    }
    if let Some(rest) = input.strip_prefix("~/") {
        return Ok(PathBuf::from(home()?).join(rest));
    }
    Ok(Path::new(input).to_path_buf())
}
