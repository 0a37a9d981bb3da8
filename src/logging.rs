use std::sync::Once;

use env_logger::{Builder, Env};
use log::LevelFilter;

static LOG_ONCE: Once = Once::new();

/// Used when neither the caller nor the environment picks a level. Stdout
/// carries the result record, so only problems reach stderr by default.
const DEFAULT_LEVEL: LevelFilter = LevelFilter::Warn;

fn env_level() -> LevelFilter {
    std::env::var("CO2MINI_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok()
        .as_deref()
        .and_then(|v| v.parse::<LevelFilter>().ok())
        .unwrap_or(DEFAULT_LEVEL)
}

fn level_to_str(level: LevelFilter) -> &'static str {
    match level {
        LevelFilter::Off => "off",
        LevelFilter::Error => "error",
        LevelFilter::Warn => "warn",
        LevelFilter::Info => "info",
        LevelFilter::Debug => "debug",
        LevelFilter::Trace => "trace",
    }
}

fn parse_level(input: Option<&str>) -> Option<LevelFilter> {
    input.and_then(|s| s.parse::<LevelFilter>().ok())
}

/// Resolve the effective level: explicit value, then `CO2MINI_LOG`, then `RUST_LOG`.
pub fn resolve_level(level: Option<&str>) -> LevelFilter {
    parse_level(level).unwrap_or_else(env_level)
}

/// Stderr logger configured with the level from [`resolve_level`].
///
/// Module directives in `RUST_LOG` still apply; the resolved level replaces
/// only its global default.
fn builder(level: Option<&str>) -> Builder {
    let level = resolve_level(level);
    let env = Env::default().default_filter_or(level_to_str(level));
    let mut builder = Builder::from_env(env);
    builder
        .filter_level(level)
        .format_timestamp_millis()
        .format_module_path(true)
        .format_target(true);
    builder
}

/// Initialize the stderr logger. Safe to call more than once; only the first
/// call installs a logger.
pub fn init_logging(level: Option<&str>) {
    LOG_ONCE.call_once(|| {
        let _ = builder(level).try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_level_wins() {
        assert_eq!(resolve_level(Some("trace")), LevelFilter::Trace);
        assert_eq!(resolve_level(Some("ERROR")), LevelFilter::Error);
    }

    #[test]
    fn garbage_level_is_ignored() {
        assert_eq!(parse_level(Some("loud")), None);
        assert_eq!(parse_level(None), None);
    }

    #[test]
    fn level_names_parse_back() {
        for level in [
            LevelFilter::Off,
            LevelFilter::Error,
            LevelFilter::Warn,
            LevelFilter::Info,
            LevelFilter::Debug,
            LevelFilter::Trace,
        ] {
            assert_eq!(parse_level(Some(level_to_str(level))), Some(level));
        }
    }

    #[test]
    fn co2mini_log_takes_precedence_over_rust_log() {
        std::env::set_var("CO2MINI_LOG", "debug");
        std::env::set_var("RUST_LOG", "error");

        assert_eq!(resolve_level(None), LevelFilter::Debug);
        assert_eq!(builder(None).build().filter(), LevelFilter::Debug);
        assert_eq!(builder(Some("trace")).build().filter(), LevelFilter::Trace);

        // Every init in this test binary resolves to debug, whichever runs first.
        init_logging(None);
        assert_eq!(log::max_level(), LevelFilter::Debug);
    }

    #[test]
    fn init_is_idempotent() {
        init_logging(Some("debug"));
        init_logging(Some("trace"));
        assert_eq!(log::max_level(), LevelFilter::Debug);
    }
}
