//! Tracing subscriber setup for the `switchyard` binary.

use tracing_subscriber::EnvFilter;

/// Log level used when neither `RUST_LOG` nor `SWITCHYARD_LOG_LEVEL` is set.
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Environment variable selecting the log level.
pub const ENV_LOG_LEVEL: &str = "SWITCHYARD_LOG_LEVEL";

/// Filter directive: `RUST_LOG` wins, then `SWITCHYARD_LOG_LEVEL`, then `warn`.
pub fn filter_directive() -> String {
    [std::env::var("RUST_LOG").ok(), std::env::var(ENV_LOG_LEVEL).ok()]
        .into_iter()
        .flatten()
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
}

/// Install the global fmt subscriber writing to stderr.
///
/// Stdout is reserved for command output. Calling this twice is harmless.
pub fn init_tracing() {
    let directive = filter_directive();
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|e| {
        eprintln!("Invalid log filter '{directive}': {e}; using '{DEFAULT_LOG_LEVEL}'");
        EnvFilter::new(DEFAULT_LOG_LEVEL)
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn reset() {
        // SAFETY: tests touching the environment are serialized.
        unsafe {
            std::env::remove_var("RUST_LOG");
            std::env::remove_var(ENV_LOG_LEVEL);
        }
    }

    #[test]
    #[serial]
    fn test_default_level() {
        reset();
        assert_eq!(filter_directive(), "warn");
    }

    #[test]
    #[serial]
    fn test_rust_log_takes_precedence() {
        reset();
        unsafe {
            std::env::set_var(ENV_LOG_LEVEL, "info");
        }
        assert_eq!(filter_directive(), "info");

        unsafe {
            std::env::set_var("RUST_LOG", "switchyard_engine=debug");
        }
        assert_eq!(filter_directive(), "switchyard_engine=debug");
        reset();
    }
}
