//! Demo commands registered by the `switchyard` binary.

use std::time::Duration;

use serde::Serialize;
use switchyard_engine::{
    ArgValue, CommandHandler, CommandSpec, FilterSpec, InvocationContext, OperationCancelled,
    ParameterSpec, Registrar, Rule, ScalarType, handler,
};

use crate::filters::{AuditFilter, AuditRecord, TracingFilter};

/// Host metadata injected into commands that ask for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    pub name: String,
    pub version: String,
}

impl AppInfo {
    pub fn current() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// The demo command set.
#[derive(Debug, Default)]
pub struct DemoCommands;

impl Registrar for DemoCommands {
    fn global_filters(&self) -> Vec<FilterSpec> {
        vec![FilterSpec::of::<TracingFilter>()]
    }

    fn commands(&self) -> Vec<(CommandSpec, CommandHandler)> {
        vec![
            (add_spec(), handler(|ctx, _token| async move { add(&ctx) })),
            (show_spec(), handler(|ctx, _token| async move { show(&ctx) })),
            (greet_spec(), handler(|ctx, _token| async move { greet(&ctx) })),
            (echo_spec(), handler(|ctx, _token| async move { echo(&ctx) })),
            (user_add_spec(), handler(|ctx, _token| async move { user_add(&ctx) })),
            (user_list_spec(), handler(|ctx, _token| async move { user_list(&ctx) })),
            (wait_spec(), handler(wait)),
            (exit_spec(), handler(|ctx, _token| async move { exit(&ctx) })),
        ]
    }
}

fn add_spec() -> CommandSpec {
    CommandSpec::new("add")
        .with_summary("Add two integers.")
        .with_parameter(ParameterSpec::scalar("x", ScalarType::Int).with_description("Left operand."))
        .with_parameter(ParameterSpec::scalar("y", ScalarType::Int).with_description("Right operand."))
}

fn add(ctx: &InvocationContext) -> anyhow::Result<()> {
    let x: i64 = ctx.values().get("x")?;
    let y: i64 = ctx.values().get("y")?;
    let sum = x
        .checked_add(y)
        .ok_or_else(|| anyhow::anyhow!("{x} + {y} overflows a 64-bit integer"))?;
    ctx.log().emit(&sum.to_string());
    Ok(())
}

fn show_spec() -> CommandSpec {
    CommandSpec::new("show")
        .with_summary("Print a ratio between 0 and 1.")
        .with_parameter(
            ParameterSpec::scalar("value", ScalarType::Float)
                .with_rule(Rule::range(0.0, 1.0))
                .with_description("Ratio to print."),
        )
}

fn show(ctx: &InvocationContext) -> anyhow::Result<()> {
    let value: f64 = ctx.values().get("value")?;
    ctx.log().emit(&value.to_string());
    Ok(())
}

fn greet_spec() -> CommandSpec {
    CommandSpec::new("greet")
        .with_summary("Greet someone.")
        .with_parameter(ParameterSpec::service::<AppInfo>("app"))
        .with_parameter(
            ParameterSpec::positional("name", ScalarType::String).with_description("Who to greet."),
        )
        .with_parameter(
            ParameterSpec::flag("loud")
                .with_alias('l')
                .with_description("Shout."),
        )
}

fn greet(ctx: &InvocationContext) -> anyhow::Result<()> {
    let app = ctx.values().service::<AppInfo>("app")?;
    let name: String = ctx.values().get("name")?;
    let loud: bool = ctx.values().get("loud")?;

    let line = format!("Hello, {name}! ({} {})", app.name, app.version);
    if loud {
        ctx.log().emit(&line.to_uppercase());
    } else {
        ctx.log().emit(&line);
    }
    Ok(())
}

fn echo_spec() -> CommandSpec {
    CommandSpec::new("echo")
        .with_summary("Print a message.")
        .with_parameter(
            ParameterSpec::scalar("msg", ScalarType::String)
                .with_alias('m')
                .with_rule(Rule::min_length(1))
                .with_description("Message to print."),
        )
        .with_parameter(
            ParameterSpec::scalar("repeat", ScalarType::UInt)
                .with_alias('r')
                .with_default(1u64)
                .with_rule(Rule::range(1.0, 10.0)),
        )
        .with_parameter(ParameterSpec::scalar("separator", ScalarType::String).with_default(" "))
}

fn echo(ctx: &InvocationContext) -> anyhow::Result<()> {
    let msg: String = ctx.values().get("msg")?;
    let repeat: u64 = ctx.values().get("repeat")?;
    let separator: String = ctx.values().get("separator")?;

    let repeated = (0..repeat).map(|_| msg.as_str()).collect::<Vec<_>>();
    ctx.log().emit(&repeated.join(&separator));
    Ok(())
}

const EMAIL_PATTERN: &str = r"[^@\s]+@[^@\s]+\.[^@\s]+";

#[derive(Debug, Serialize)]
struct User<'a> {
    name: &'a str,
    email: &'a str,
    admin: bool,
    tags: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    audited_by: Option<&'a str>,
}

fn user_add_spec() -> CommandSpec {
    let email = ParameterSpec::scalar("email", ScalarType::String)
        .with_alias('e')
        .with_rule(Rule::pattern(EMAIL_PATTERN).expect("email pattern compiles"))
        .with_description("Contact address.");

    CommandSpec::new("user add")
        .with_summary("Create a user and print it as JSON.")
        .with_alias("useradd")
        .with_filter(FilterSpec::of::<AuditFilter>())
        .with_parameter(ParameterSpec::positional("name", ScalarType::String))
        .with_parameter(email)
        .with_parameter(ParameterSpec::flag("admin").with_alias('a'))
        .with_parameter(
            ParameterSpec::array("tags", ScalarType::String)
                .with_default(Vec::<ArgValue>::new())
                .with_rule(Rule::max_length(5)),
        )
}

fn user_add(ctx: &InvocationContext) -> anyhow::Result<()> {
    let name: String = ctx.values().get("name")?;
    let email: String = ctx.values().get("email")?;
    let admin: bool = ctx.values().get("admin")?;
    let tags: Vec<String> = ctx.values().get("tags")?;
    let audit = ctx.state::<AuditRecord>();

    let user = User {
        name: &name,
        email: &email,
        admin,
        tags: &tags,
        audited_by: audit.as_deref().map(|record| record.user.as_str()),
    };
    ctx.log().emit(&serde_json::to_string(&user)?);
    Ok(())
}

const DEMO_USERS: &[(&str, &str)] = &[
    ("ada", "ada@example.com"),
    ("grace", "grace@example.com"),
    ("linus", "linus@example.com"),
];

fn user_list_spec() -> CommandSpec {
    CommandSpec::new("user list")
        .with_summary("List demo users.")
        .with_parameter(
            ParameterSpec::scalar("format", ScalarType::enumeration(["Table", "Json"]))
                .with_alias('f')
                .with_default(ArgValue::Enum("Table".to_string())),
        )
        .with_parameter(
            ParameterSpec::nullable("limit", ScalarType::UInt).with_default(ArgValue::Null),
        )
}

fn user_list(ctx: &InvocationContext) -> anyhow::Result<()> {
    let format: String = ctx.values().get("format")?;
    let limit: Option<u64> = ctx.values().get("limit")?;
    let take = limit.map_or(DEMO_USERS.len(), |l| l as usize);

    let users = DEMO_USERS.iter().take(take);
    if format == "Json" {
        let rows: Vec<_> = users
            .map(|(name, email)| serde_json::json!({ "name": name, "email": email }))
            .collect();
        ctx.log().emit(&serde_json::to_string(&rows)?);
    } else {
        for (name, email) in users {
            ctx.log().emit(&format!("{name:<8}{email}"));
        }
    }
    Ok(())
}

fn wait_spec() -> CommandSpec {
    CommandSpec::new("wait")
        .with_summary("Sleep until done or interrupted.")
        .with_parameter(
            ParameterSpec::scalar("seconds", ScalarType::Float)
                .with_alias('s')
                .with_default(30.0)
                .with_rule(Rule::range(0.0, 3600.0)),
        )
        .with_parameter(
            ParameterSpec::flag("ignore_cancel").with_description("Keep sleeping after an interrupt."),
        )
}

async fn wait(ctx: InvocationContext, token: switchyard_engine::CancellationToken) -> anyhow::Result<()> {
    let seconds: f64 = ctx.values().get("seconds")?;
    let ignore_cancel: bool = ctx.values().get("ignore_cancel")?;
    let sleep = tokio::time::sleep(Duration::from_secs_f64(seconds));

    if ignore_cancel {
        sleep.await;
        ctx.log().emit("Done.");
        return Ok(());
    }

    tokio::select! {
        _ = sleep => {
            ctx.log().emit("Done.");
            Ok(())
        }
        _ = token.cancelled() => {
            ctx.log().emit("Cancelled.");
            Err(OperationCancelled.into())
        }
    }
}

fn exit_spec() -> CommandSpec {
    CommandSpec::new("exit")
        .with_summary("Exit with the given code.")
        .with_parameter(ParameterSpec::positional("code", ScalarType::Int))
}

fn exit(ctx: &InvocationContext) -> anyhow::Result<()> {
    let code: i32 = ctx.values().get("code")?;
    ctx.set_exit_code(code);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use switchyard_engine::{AppBuilder, BufferSink, RuntimeConfig, ServiceCollection, exit_code};

    fn dispatcher(out: &BufferSink) -> switchyard_engine::Dispatcher {
        let config = RuntimeConfig::new()
            .with_log(out.clone())
            .with_services(ServiceCollection::new().with(AppInfo::current()));
        AppBuilder::from_registrar(&DemoCommands).build(config).unwrap()
    }

    #[test]
    fn test_all_commands_register() {
        let out = BufferSink::new();
        let d = dispatcher(&out);
        let names: Vec<String> = d.registry().iter().map(|c| c.name()).collect();
        assert_eq!(
            names,
            vec!["add", "show", "greet", "echo", "user add", "user list", "wait", "exit"]
        );
    }

    #[test]
    fn test_greet_requires_app_info() {
        let result = AppBuilder::from_registrar(&DemoCommands).build(RuntimeConfig::new());
        assert!(matches!(
            result,
            Err(switchyard_engine::RegistrationError::MissingService { ref command, .. }) if command == "greet"
        ));
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_exit_code_passthrough() {
        let out = BufferSink::new();
        assert_eq!(dispatcher(&out).run(["exit", "3"]).await, 3);
        assert_eq!(dispatcher(&out).run(["exit", "-2"]).await, -2);
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_user_add_validation() {
        let out = BufferSink::new();
        let d = dispatcher(&out);

        let code = d.run(["user", "add", "ann", "--email", "not-an-email"]).await;
        assert_eq!(code, exit_code::FAILURE);
        assert_eq!(
            out.lines(),
            vec![r"The field email must match the regular expression '[^@\s]+@[^@\s]+\.[^@\s]+'."]
        );
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_command_output_goes_to_log_sink() {
        let out = BufferSink::new();
        let d = dispatcher(&out);

        assert_eq!(d.run(["add", "--x", "2", "--y", "40"]).await, exit_code::SUCCESS);
        assert_eq!(d.run(["echo", "-m", "hi", "-r", "3", "--separator", "-"]).await, exit_code::SUCCESS);
        assert_eq!(d.run(["user", "list", "--limit", "2"]).await, exit_code::SUCCESS);
        assert_eq!(
            out.lines(),
            vec![
                "42",
                "hi-hi-hi",
                "ada     ada@example.com",
                "grace   grace@example.com",
            ]
        );
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_echo_repeat_out_of_range() {
        let out = BufferSink::new();
        let code = dispatcher(&out).run(["echo", "-m", "hi", "-r", "11"]).await;
        assert_eq!(code, exit_code::FAILURE);
        assert_eq!(out.lines(), vec!["The field repeat must be between 1 and 10."]);
    }
}
