use std::env;
use std::io::Write;
use std::sync::OnceLock;

pub mod backend;
pub mod commands;
pub mod config;
pub mod logging;

use backend::SqliteLifecycleBackend;

/// Version information set at build time.
static VERSION_STRING: OnceLock<String> = OnceLock::new();

/// Sets the string printed by `--version`. Call before `run_from_env`.
pub fn set_version(version: &str, commit: &str, date: &str) {
    let formatted = format!("{version} (commit: {commit}, built: {date})");
    let _ = VERSION_STRING.set(formatted);
}

fn get_version() -> &'static str {
    VERSION_STRING
        .get()
        .map(|value| value.as_str())
        .unwrap_or("dev (commit: none, built: unknown)")
}

/// Flags accepted before the subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalFlags {
    pub json: bool,
    pub quiet: bool,
    pub version: bool,
    pub config: String,
}

/// Returns the parsed flags and the index of the first non-global token.
pub fn parse_global_flags(args: &[String]) -> Result<(GlobalFlags, usize), String> {
    let mut flags = GlobalFlags::default();
    let mut index = 0usize;
    while let Some(token) = args.get(index) {
        match token.as_str() {
            "--json" => flags.json = true,
            "--quiet" | "-q" => flags.quiet = true,
            "--version" => flags.version = true,
            "--config" => {
                index += 1;
                match args.get(index) {
                    Some(val) if !val.starts_with('-') => flags.config = val.clone(),
                    _ => return Err("missing value for --config".to_string()),
                }
            }
            _ => break,
        }
        index += 1;
    }
    Ok((flags, index))
}

pub fn run_from_env() -> i32 {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    run_with_args(&args, &mut stdout, &mut stderr)
}

pub fn run_with_args(args: &[String], stdout: &mut dyn Write, stderr: &mut dyn Write) -> i32 {
    let (flags, index) = match parse_global_flags(args) {
        Ok(value) => value,
        Err(message) => {
            let _ = writeln!(stderr, "error: {message}");
            return 1;
        }
    };

    if flags.version {
        let _ = writeln!(stdout, "holiday version {}", get_version());
        return 0;
    }

    let remaining = args.get(index..).unwrap_or_default();
    match remaining.first().map(|arg| arg.as_str()) {
        None | Some("help") | Some("-h") | Some("--help") => {
            if let Err(err) = commands::write_help(stdout) {
                let _ = writeln!(stderr, "{err}");
                return 1;
            }
            0
        }
        Some(name) if commands::is_command(name) => {
            let config_file = Some(flags.config.as_str()).filter(|value| !value.is_empty());
            let (cfg, used) = match config::load_config(config_file) {
                Ok(value) => value,
                Err(message) => {
                    let _ = writeln!(stderr, "{message}");
                    return 1;
                }
            };
            if let Err(message) = logging::init_logging(&cfg.logging, flags.quiet) {
                let _ = writeln!(stderr, "{message}");
                return 1;
            }
            if let Some(path) = used {
                tracing::debug!(config = %path.display(), "config loaded");
            }

            let mut backend = match SqliteLifecycleBackend::open(&cfg) {
                Ok(backend) => backend,
                Err(message) => {
                    let _ = writeln!(stderr, "failed to open database: {message}");
                    return 1;
                }
            };
            let forwarded = forward_args(remaining, &flags);
            commands::run_with_backend(&forwarded, &mut backend, stdout, stderr)
        }
        Some(other) => {
            let _ = writeln!(stderr, "unknown holiday command: {other}");
            let _ = commands::write_help(stderr);
            1
        }
    }
}

fn forward_args(remaining: &[String], flags: &GlobalFlags) -> Vec<String> {
    let mut out = remaining.to_vec();
    if out.is_empty() {
        return out;
    }
    if flags.json {
        out.insert(1, "--json".to_string());
    }
    if flags.quiet {
        out.insert(1, "--quiet".to_string());
    }
    out
}
