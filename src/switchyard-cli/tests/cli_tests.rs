//! Black-box tests that invoke the `switchyard` binary.

use assert_cmd::Command;
use predicates::prelude::*;

fn switchyard() -> Command {
    let mut cmd = Command::cargo_bin("switchyard").unwrap();
    cmd.env_remove("SWITCHYARD_CONFIG")
        .env_remove("SWITCHYARD_VERSION")
        .env_remove("SWITCHYARD_SHUTDOWN_TIMEOUT_MS")
        .env_remove("RUST_LOG")
        .env("SWITCHYARD_LOG_LEVEL", "off");
    cmd
}

mod dispatch {
    use super::*;

    #[test]
    fn test_add_prints_sum() {
        switchyard()
            .args(["add", "--x", "10", "--y", "20"])
            .assert()
            .success()
            .stdout("30\n");
    }

    #[test]
    fn test_missing_value_reports_parse_error() {
        switchyard()
            .args(["add", "--x"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains(
                "Argument 'x' failed to parse, provided value: ",
            ));
    }

    #[test]
    fn test_unrecognized_bare_token() {
        switchyard()
            .args(["add", "--x", "10", "y", "20"])
            .assert()
            .code(1)
            .stderr("Argument 'y' is not recognized.\n");
    }

    #[test]
    fn test_validation_failure() {
        switchyard()
            .args(["show", "--value", "100"])
            .assert()
            .code(1)
            .stderr("The field value must be between 0 and 1.\n")
            .stdout("");
    }

    #[test]
    fn test_explicit_exit_code() {
        switchyard().args(["exit", "3"]).assert().code(3);
    }

    #[test]
    fn test_service_injection_and_flag_alias() {
        switchyard()
            .args(["greet", "ann", "-l"])
            .assert()
            .success()
            .stdout(predicate::str::starts_with("HELLO, ANN! (SWITCHYARD-CLI "));
    }

    #[test]
    fn test_multi_segment_command_with_audit_filter() {
        switchyard()
            .env("USER", "tester")
            .args(["user", "add", "ann", "-e", "ann@example.com", "--tags", "ops,dev"])
            .assert()
            .success()
            .stdout(
                "{\"name\":\"ann\",\"email\":\"ann@example.com\",\"admin\":false,\"tags\":[\"ops\",\"dev\"],\"audited_by\":\"tester\"}\n",
            );
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_argument_fails_cleanly() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        switchyard()
            .args(["echo", "-m"])
            .arg(OsStr::from_bytes(b"\xff"))
            .assert()
            .code(1)
            .stderr("Argument '\u{FFFD}' is not valid UTF-8.\n")
            .stdout("");
    }

    #[test]
    fn test_enum_option_is_case_insensitive() {
        switchyard()
            .args(["user", "list", "--format", "json", "--limit", "1"])
            .assert()
            .success()
            .stdout("[{\"email\":\"ada@example.com\",\"name\":\"ada\"}]\n");
    }
}

mod help {
    use super::*;

    #[test]
    fn test_no_arguments_shows_command_table() {
        switchyard()
            .assert()
            .success()
            .stdout(predicate::str::starts_with("Usage: [command] [-h|--help] [--version]"))
            .stdout(predicate::str::contains("user add, useradd"));
    }

    #[test]
    fn test_unknown_command_fails_with_help() {
        switchyard()
            .arg("frobnicate")
            .assert()
            .code(1)
            .stderr("Argument 'frobnicate' is not recognized.\n")
            .stdout(predicate::str::contains("Commands:"));
    }

    #[test]
    fn test_command_help() {
        switchyard()
            .args(["echo", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("-m, --msg <string>"))
            .stdout(predicate::str::contains("[default=1]"));
    }

    #[test]
    fn test_required_arguments_omitted_shows_help() {
        switchyard()
            .arg("add")
            .assert()
            .success()
            .stdout(predicate::str::starts_with("Usage: add [options...]"));
    }

    #[test]
    fn test_version_prefers_informational() {
        switchyard()
            .arg("--version")
            .assert()
            .success()
            .stdout(format!("{}\n", env!("CARGO_PKG_VERSION")));

        switchyard()
            .env("SWITCHYARD_VERSION", "9.9.9-demo")
            .arg("--version")
            .assert()
            .success()
            .stdout("9.9.9-demo\n");
    }
}

mod settings {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_invalid_env_setting_fails_startup() {
        switchyard()
            .env("SWITCHYARD_SHUTDOWN_TIMEOUT_MS", "soon")
            .arg("--version")
            .assert()
            .failure()
            .stderr(predicate::str::contains("SWITCHYARD_SHUTDOWN_TIMEOUT_MS"));
    }

    #[test]
    fn test_toml_settings_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "informational_version = \"4.2.0\"").unwrap();

        switchyard()
            .env("SWITCHYARD_CONFIG", file.path())
            .arg("--version")
            .assert()
            .success()
            .stdout("4.2.0\n");
    }
}
