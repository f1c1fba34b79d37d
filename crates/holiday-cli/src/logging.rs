use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Installs the global tracing subscriber, writing to stderr.
///
/// `RUST_LOG` wins over `logging.level`; `quiet` lowers the configured level
/// to warnings. A subscriber installed earlier in the process is kept.
pub fn init_logging(cfg: &LoggingConfig, quiet: bool) -> Result<(), String> {
    let filter = build_filter(cfg, quiet, std::env::var("RUST_LOG").ok())?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = match cfg.format.as_str() {
        "compact" => builder.compact().try_init(),
        _ => builder.try_init(),
    };
    Ok(())
}

fn build_filter(cfg: &LoggingConfig, quiet: bool, rust_log: Option<String>) -> Result<EnvFilter, String> {
    if let Some(directives) = rust_log.filter(|v| !v.trim().is_empty()) {
        return EnvFilter::try_new(directives).map_err(|err| format!("invalid RUST_LOG: {err}"));
    }
    let level = if quiet { "warn" } else { cfg.level.as_str() };
    EnvFilter::try_new(level).map_err(|err| format!("invalid logging.level '{level}': {err}"))
}

#[cfg(test)]
mod tests {
    use tracing_subscriber::filter::LevelFilter;

    use super::*;

    fn logging(level: &str) -> LoggingConfig {
        LoggingConfig {
            level: level.to_string(),
            format: "console".to_string(),
        }
    }

    #[test]
    fn configured_level_is_used_without_rust_log() {
        match build_filter(&logging("debug"), false, None) {
            Ok(filter) => assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG)),
            Err(err) => panic!("filter: {err}"),
        }
    }

    #[test]
    fn quiet_lowers_to_warn() {
        match build_filter(&logging("debug"), true, None) {
            Ok(filter) => assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN)),
            Err(err) => panic!("filter: {err}"),
        }
    }

    #[test]
    fn rust_log_overrides_config() {
        match build_filter(&logging("info"), true, Some("holiday_core=trace".into())) {
            Ok(filter) => assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE)),
            Err(err) => panic!("filter: {err}"),
        }
    }

    #[test]
    fn bad_level_is_reported() {
        match build_filter(&logging("holiday=loud"), false, None) {
            Ok(_) => panic!("expected invalid level"),
            Err(err) => assert!(err.contains("logging.level")),
        }
    }
}
