//! Usage, help and version text.
//!
//! Output is deterministic: sections and rows follow declaration or
//! registration order, and columns are aligned to the widest entry.

use crate::registry::CommandRegistry;
use crate::spec::{CommandSpec, ParameterSpec};

const FALLBACK_VERSION: &str = "1.0.0";
const HELP_SHORTCUTS: &str = "[-h|--help] [--version]";

/// Version strings reported by `--version`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionInfo {
    /// Human-facing version, e.g. `1.2.0-beta+abc123`.
    pub informational: Option<String>,
    /// Plain build version, usually `CARGO_PKG_VERSION` of the host.
    pub build: Option<String>,
}

impl VersionInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_informational(mut self, version: impl Into<String>) -> Self {
        self.informational = Some(version.into());
        self
    }

    pub fn with_build(mut self, version: impl Into<String>) -> Self {
        self.build = Some(version.into());
        self
    }
}

/// Informational version, else build version, else `1.0.0`.
pub fn render_version(info: &VersionInfo) -> String {
    [info.informational.as_deref(), info.build.as_deref()]
        .into_iter()
        .flatten()
        .find(|v| !v.is_empty())
        .unwrap_or(FALLBACK_VERSION)
        .to_string()
}

/// Help for a single command.
pub fn render_command(spec: &CommandSpec) -> String {
    let mut usage = vec!["Usage:".to_string()];
    if !spec.is_root() {
        usage.push(spec.full_name());
    }
    if spec.parameters().iter().any(ParameterSpec::is_positional) {
        usage.push("[arguments...]".to_string());
    }
    if spec.parameters().iter().any(is_option) {
        usage.push("[options...]".to_string());
    }
    usage.push(HELP_SHORTCUTS.to_string());

    let mut sections = vec![usage.join(" ")];
    sections.extend(spec.summary().map(str::to_string));
    sections.extend(parameter_sections(spec));
    sections.join("\n\n")
}

/// Top-level help: the root command's own sections, if any, followed by the
/// table of named commands.
pub fn render_root(registry: &CommandRegistry) -> String {
    let mut sections = vec![format!("Usage: [command] {HELP_SHORTCUTS}")];

    if let Some(root) = registry.root() {
        sections.extend(root.spec().summary().map(str::to_string));
        sections.extend(parameter_sections(root.spec()));
    }

    let rows: Vec<(String, String)> = registry
        .iter()
        .filter(|cmd| !cmd.spec().is_root())
        .map(|cmd| {
            let spec = cmd.spec();
            let name = std::iter::once(spec.full_name())
                .chain(spec.aliases())
                .collect::<Vec<_>>()
                .join(", ");
            (name, spec.summary().unwrap_or_default().to_string())
        })
        .collect();
    if !rows.is_empty() {
        sections.push(table("Commands:", &rows));
    }

    sections.join("\n\n")
}

fn is_option(param: &ParameterSpec) -> bool {
    !param.is_positional() && !param.from_external_service()
}

fn parameter_sections(spec: &CommandSpec) -> Vec<String> {
    let mut sections = Vec::new();

    let arguments: Vec<(String, String)> = spec
        .parameters()
        .iter()
        .filter(|p| p.is_positional())
        .enumerate()
        .map(|(index, p)| {
            let mut left = format!("[{index}] {}", p.name());
            if let Some(hint) = p.kind().hint() {
                left.push_str(&format!(" <{hint}>"));
            }
            (left, describe(p))
        })
        .collect();
    if !arguments.is_empty() {
        sections.push(table("Arguments:", &arguments));
    }

    let options: Vec<(String, String)> = spec
        .parameters()
        .iter()
        .filter(|p| is_option(p))
        .map(|p| {
            let mut left = match p.short_alias() {
                Some(alias) => format!("-{alias}, --{}", p.option_name()),
                None => format!("--{}", p.option_name()),
            };
            if let Some(hint) = p.kind().hint() {
                left.push_str(&format!(" <{hint}>"));
            }
            (left, describe(p))
        })
        .collect();
    if !options.is_empty() {
        sections.push(table("Options:", &options));
    }

    sections
}

fn describe(param: &ParameterSpec) -> String {
    let marker = if param.required() {
        Some("(required)".to_string())
    } else {
        param
            .default_value()
            .map(|default| format!("[default={}]", default.to_token()))
    };

    [param.description().map(str::to_string), marker]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
}

fn table(title: &str, rows: &[(String, String)]) -> String {
    let width = rows
        .iter()
        .map(|(left, _)| left.chars().count())
        .max()
        .unwrap_or(0);

    let mut lines = vec![title.to_string()];
    for (left, right) in rows {
        let line = format!("  {left:<width$}    {right}");
        lines.push(line.trim_end().to_string());
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::handler;
    use crate::registry::RegisteredCommand;
    use crate::spec::ScalarType;
    use crate::value::ArgValue;
    use pretty_assertions::assert_eq;

    fn noop() -> crate::filter::CommandHandler {
        handler(|_ctx, _token| async { Ok(()) })
    }

    #[test]
    fn test_command_help_layout() {
        let spec = CommandSpec::new("copy")
            .with_summary("Copy files.")
            .with_parameter(
                ParameterSpec::positional("source", ScalarType::Path).with_description("Source file."),
            )
            .with_parameter(ParameterSpec::variadic("targets", ScalarType::Path))
            .with_parameter(
                ParameterSpec::flag("dry_run")
                    .with_alias('n')
                    .with_description("Print actions only."),
            )
            .with_parameter(ParameterSpec::scalar("retries", ScalarType::Int).with_default(3i64))
            .with_parameter(ParameterSpec::nullable("mode", ScalarType::enumeration(["Fast", "Safe"])));

        let expected = "\
Usage: copy [arguments...] [options...] [-h|--help] [--version]

Copy files.

Arguments:
  [0] source <path>        Source file. (required)
  [1] targets <path...>

Options:
  -n, --dry-run            Print actions only.
  --retries <int>          [default=3]
  --mode <(Fast|Safe)?>    (required)";

        assert_eq!(render_command(&spec), expected);
    }

    #[test]
    fn test_minimal_help_has_no_sections() {
        let spec = CommandSpec::new("ping");
        assert_eq!(
            render_command(&spec),
            "Usage: ping [-h|--help] [--version]"
        );
    }

    #[test]
    fn test_service_parameters_are_hidden() {
        struct Clock;
        let spec = CommandSpec::new("now")
            .with_parameter(ParameterSpec::service::<Clock>("clock"))
            .with_parameter(ParameterSpec::scalar("format", ScalarType::String).with_default("%H:%M"));

        assert_eq!(
            render_command(&spec),
            "Usage: now [options...] [-h|--help] [--version]\n\nOptions:\n  --format <string>    [default=%H:%M]"
        );
    }

    #[test]
    fn test_root_help_lists_commands_in_registration_order() {
        let mut registry = CommandRegistry::new();
        registry
            .register(RegisteredCommand::new(
                CommandSpec::new("user list").with_alias("users").with_summary("List users."),
                noop(),
            ))
            .unwrap();
        registry
            .register(RegisteredCommand::new(
                CommandSpec::new("add").with_summary("Add two numbers."),
                noop(),
            ))
            .unwrap();

        let expected = "\
Usage: [command] [-h|--help] [--version]

Commands:
  user list, users    List users.
  add                 Add two numbers.";
        assert_eq!(render_root(&registry), expected);
    }

    #[test]
    fn test_root_help_includes_root_options() {
        let mut registry = CommandRegistry::new();
        registry
            .register(RegisteredCommand::new(
                CommandSpec::root()
                    .with_parameter(ParameterSpec::scalar("msg", ScalarType::String).with_alias('m')),
                noop(),
            ))
            .unwrap();

        assert_eq!(
            render_root(&registry),
            "Usage: [command] [-h|--help] [--version]\n\nOptions:\n  -m, --msg <string>    (required)"
        );
    }

    #[test]
    fn test_default_marker_uses_canonical_token() {
        let param = ParameterSpec::array("ids", ScalarType::Int)
            .with_default(vec![ArgValue::Int(1), ArgValue::Int(2)]);
        assert_eq!(describe(&param), "[default=[1,2]]");
    }

    #[test]
    fn test_version_fallbacks() {
        assert_eq!(render_version(&VersionInfo::new()), "1.0.0");
        assert_eq!(render_version(&VersionInfo::new().with_build("0.3.1")), "0.3.1");
        assert_eq!(
            render_version(
                &VersionInfo::new()
                    .with_build("0.3.1")
                    .with_informational("0.3.1-beta+abc")
            ),
            "0.3.1-beta+abc"
        );
    }
}
