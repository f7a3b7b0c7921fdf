//! Switchyard reference host.
//!
//! Wires the demo command set from [`commands`] into a
//! [`switchyard_engine::Dispatcher`], with settings taken from the
//! environment and an optional TOML file.

pub mod commands;
pub mod filters;
pub mod logging;

use std::ffi::OsString;
use std::path::Path;

use switchyard_engine::{
    AppBuilder, Dispatcher, EngineSettings, RegistrationError, RuntimeConfig, ServiceCollection,
};

pub use commands::{AppInfo, DemoCommands};
pub use filters::{AuditFilter, AuditRecord, TracingFilter};

/// Environment variable naming an optional TOML settings file.
pub const ENV_CONFIG_PATH: &str = "SWITCHYARD_CONFIG";

/// Settings from `SWITCHYARD_CONFIG` (if set), overridden by the environment.
pub fn load_settings() -> anyhow::Result<EngineSettings> {
    let settings = match std::env::var(ENV_CONFIG_PATH) {
        Ok(path) if !path.is_empty() => EngineSettings::load(Path::new(&path))
            .map_err(|e| anyhow::anyhow!("Failed to load {path}: {e}"))?,
        _ => EngineSettings::default(),
    };
    Ok(settings.merge_env()?)
}

/// Runtime configuration for the demo host: stdout/stderr sinks, the
/// [`AppInfo`] service and the host's build version.
pub fn runtime_config(settings: &EngineSettings) -> RuntimeConfig {
    RuntimeConfig::from_settings(settings)
        .with_build_version(env!("CARGO_PKG_VERSION"))
        .with_services(ServiceCollection::new().with(AppInfo::current()))
}

pub fn build_dispatcher(config: RuntimeConfig) -> Result<Dispatcher, RegistrationError> {
    AppBuilder::from_registrar(&DemoCommands).build(config)
}

/// Process arguments as UTF-8 strings.
///
/// Fails with a one-line message naming the first argument that is not UTF-8.
pub fn utf8_args(args: impl IntoIterator<Item = OsString>) -> Result<Vec<String>, String> {
    args.into_iter()
        .map(|arg| {
            arg.into_string().map_err(|raw| {
                format!("Argument '{}' is not valid UTF-8.", raw.to_string_lossy())
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_args_pass_through() {
        let args = ["echo", "-m", "héllo"].map(OsString::from);
        assert_eq!(utf8_args(args).unwrap(), vec!["echo", "-m", "héllo"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_arg_is_rejected() {
        use std::os::unix::ffi::OsStringExt;

        let args = vec![
            OsString::from("echo"),
            OsString::from("-m"),
            OsString::from_vec(vec![b'a', 0xff]),
        ];
        assert_eq!(
            utf8_args(args),
            Err("Argument 'a\u{FFFD}' is not valid UTF-8.".to_string())
        );
    }
}
