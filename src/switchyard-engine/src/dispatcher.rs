//! Runs one command per call: resolve, bind, validate, execute.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, warn};

use crate::binder::{self, BindOutcome};
use crate::cancellation::CancellationController;
use crate::config::RuntimeConfig;
use crate::context::InvocationContext;
use crate::error::{BindError, OperationCancelled, UnhandledExecutionError, ValidationError};
use crate::filter::FilterChain;
use crate::help;
use crate::registry::{CommandRegistry, RegisteredCommand};
use crate::spec::{CommandSpec, ParameterKind};
use crate::validation;
use crate::value::{ArgValue, BoundArguments};

/// Process exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = 1;
    /// 128 + SIGINT.
    pub const CANCELLED: i32 = 130;
}

/// Executes commands from an immutable registry.
pub struct Dispatcher {
    registry: CommandRegistry,
    config: RuntimeConfig,
}

impl Dispatcher {
    pub(crate) fn new(registry: CommandRegistry, config: RuntimeConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Run the command selected by `argv` (program name excluded) and return
    /// the process exit code. Per-call errors are logged, never returned.
    pub async fn run<I, S>(&self, argv: I) -> i32
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let argv: Vec<String> = argv.into_iter().map(Into::into).collect();

        let Some((command, tokens)) = self.registry.resolve(&argv) else {
            return self.not_found(&argv);
        };
        debug!(command = %command.name(), tokens = tokens.len(), "Resolved command");

        let spec = command.spec();
        let bound = match binder::bind(spec, tokens) {
            Ok(BindOutcome::Bound(bound)) => bound,
            Ok(BindOutcome::ShowHelp) => {
                let text = if spec.is_root() {
                    help::render_root(&self.registry)
                } else {
                    help::render_command(spec)
                };
                self.config.log().emit(&text);
                return exit_code::SUCCESS;
            }
            Ok(BindOutcome::ShowVersion) => {
                self.config
                    .log()
                    .emit(&help::render_version(self.config.version()));
                return exit_code::SUCCESS;
            }
            Err(e) => {
                debug!(command = %command.name(), error = %e, "Binding failed");
                self.config.log_error().emit(&e.to_string());
                return exit_code::FAILURE;
            }
        };

        let values = match self.inject_services(spec, bound) {
            Ok(values) => values,
            Err(message) => {
                self.config.log_error().emit(&message);
                return exit_code::FAILURE;
            }
        };

        if let Err(e) = validation::validate(spec, &values) {
            self.config.log_error().emit(&e.message);
            return exit_code::FAILURE;
        }

        let (log, log_error) = self.config.sinks();
        let ctx = InvocationContext::new(command.name(), tokens.to_vec(), values)
            .with_sinks(log, log_error);
        self.execute(command, ctx).await
    }

    /// Synchronous entry point; drives [`run`](Self::run) on a fresh runtime.
    ///
    /// Must not be called from inside a Tokio runtime.
    pub fn run_blocking<I, S>(&self, argv: I) -> i32
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
            Ok(runtime) => runtime.block_on(self.run(argv)),
            Err(e) => {
                error!(error = %e, "Failed to start async runtime");
                self.config
                    .log_error()
                    .emit(&format!("Failed to start async runtime: {e}"));
                exit_code::FAILURE
            }
        }
    }

    fn not_found(&self, argv: &[String]) -> i32 {
        let root_help = help::render_root(&self.registry);

        match argv {
            [] => {
                self.config.log().emit(&root_help);
                exit_code::SUCCESS
            }
            [only] if only == "-h" || only == "--help" => {
                self.config.log().emit(&root_help);
                exit_code::SUCCESS
            }
            [only] if only == "--version" => {
                self.config
                    .log()
                    .emit(&help::render_version(self.config.version()));
                exit_code::SUCCESS
            }
            [first, ..] => {
                debug!(token = %first, "No command matched");
                self.config
                    .log_error()
                    .emit(&BindError::ArgumentNameNotFound(first.clone()).to_string());
                self.config.log().emit(&root_help);
                exit_code::FAILURE
            }
        }
    }

    /// Rebuild the bound values in declaration order with services filled in.
    fn inject_services(
        &self,
        spec: &CommandSpec,
        bound: BoundArguments,
    ) -> Result<BoundArguments, String> {
        let mut values = BoundArguments::new();

        for param in spec.parameters() {
            let value = match param.kind() {
                ParameterKind::Service(key) => match self.config.services().resolve(key) {
                    Some(handle) => ArgValue::Service(handle),
                    None => match param.default_value() {
                        Some(default) => default.clone(),
                        None => {
                            return Err(format!(
                                "Service '{}' for parameter '{}' could not be resolved.",
                                key.type_name(),
                                param.name()
                            ));
                        }
                    },
                },
                _ => match bound.raw(param.name()) {
                    Some(value) => value.clone(),
                    None => continue,
                },
            };
            values.insert(param.name(), value);
        }

        Ok(values)
    }

    async fn execute(&self, command: &RegisteredCommand, ctx: InvocationContext) -> i32 {
        let name = command.name();
        let chain = FilterChain::build(command.spec().filters(), Arc::clone(command.handler()));
        let controller = CancellationController::install(self.config.shutdown_timeout());
        let token = controller.token();
        let timeout = controller.timeout_token();
        let start = Instant::now();

        let mut task = tokio::spawn({
            let ctx = ctx.clone();
            async move { chain.invoke(ctx, token).await }
        });

        let joined = tokio::select! {
            joined = &mut task => Some(joined),
            _ = timeout.cancelled() => None,
        };

        let cancelled = controller.is_cancellation_requested();
        controller.complete();
        drop(controller);

        debug!(
            command = %name,
            cancelled,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Command finished"
        );

        match joined {
            None => {
                task.abort();
                warn!(command = %name, "Command ignored cancellation; abandoned after timeout");
                exit_code::CANCELLED
            }
            Some(Ok(Ok(()))) if cancelled => exit_code::CANCELLED,
            Some(Ok(Ok(()))) => ctx.exit_code().unwrap_or(exit_code::SUCCESS),
            Some(Ok(Err(e))) => self.classify(&name, e),
            Some(Err(join_error)) => {
                let failure = if join_error.is_panic() {
                    let payload = join_error.into_panic();
                    let message = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic payload".to_string());
                    UnhandledExecutionError::Panicked {
                        command: name.clone(),
                        message,
                    }
                } else {
                    UnhandledExecutionError::Aborted {
                        command: name.clone(),
                    }
                };
                error!(command = %name, error = %failure, "Command task failed");
                self.config
                    .log_error()
                    .emit(&format!("{:?}", anyhow::Error::new(failure)));
                exit_code::FAILURE
            }
        }
    }

    fn classify(&self, command: &str, e: anyhow::Error) -> i32 {
        if e.downcast_ref::<OperationCancelled>().is_some() {
            debug!(command, "Command observed cancellation");
            return exit_code::CANCELLED;
        }

        if let Some(validation) = e.downcast_ref::<ValidationError>() {
            self.config.log_error().emit(&validation.message);
            return exit_code::FAILURE;
        }

        debug!(command, error = %e, "Command failed");
        self.config.log_error().emit(&format!("{e:?}"));
        exit_code::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::AppBuilder;
    use crate::log::BufferSink;
    use crate::spec::{ParameterSpec, ScalarType};
    use pretty_assertions::assert_eq;
    use serial_test::serial;

    fn explode() -> anyhow::Result<()> {
        panic!("kaboom")
    }

    fn dispatcher(out: &BufferSink) -> Dispatcher {
        let mut builder = AppBuilder::new();
        builder.add(
            CommandSpec::new("sum")
                .with_parameter(ParameterSpec::scalar("x", ScalarType::Int))
                .with_parameter(ParameterSpec::scalar("y", ScalarType::Int)),
            |ctx, _token| async move {
                let x: i64 = ctx.values().get("x")?;
                let y: i64 = ctx.values().get("y")?;
                ctx.set_exit_code(i32::try_from(x + y)?);
                Ok(())
            },
        );
        builder.add(CommandSpec::new("boom"), |_ctx, _token| async move { explode() });
        builder.add(CommandSpec::new("stop"), |_ctx, _token| async move {
            Err(OperationCancelled.into())
        });
        builder
            .build(RuntimeConfig::new().with_log(out.clone()))
            .unwrap()
    }

    #[tokio::test]
    #[serial]
    async fn test_exit_code_set_by_command() {
        let out = BufferSink::new();
        assert_eq!(dispatcher(&out).run(["sum", "--x", "2", "--y", "3"]).await, 5);
        assert!(out.lines().is_empty());
    }

    #[tokio::test]
    #[serial]
    async fn test_panic_becomes_failure() {
        let out = BufferSink::new();
        assert_eq!(dispatcher(&out).run(["boom"]).await, exit_code::FAILURE);
        assert!(out.contents().contains("kaboom"));
    }

    #[tokio::test]
    #[serial]
    async fn test_operation_cancelled_is_silent() {
        let out = BufferSink::new();
        assert_eq!(dispatcher(&out).run(["stop"]).await, exit_code::CANCELLED);
        assert!(out.lines().is_empty());
    }

    #[tokio::test]
    #[serial]
    async fn test_unknown_command_reports_and_shows_root_help() {
        let out = BufferSink::new();
        let d = dispatcher(&out);

        assert_eq!(d.run(["nope"]).await, exit_code::FAILURE);
        let lines = out.lines();
        assert_eq!(lines[0], "Argument 'nope' is not recognized.");
        assert!(lines[1].starts_with("Usage: [command]"));

        out.clear();
        assert_eq!(d.run(Vec::<String>::new()).await, exit_code::SUCCESS);
        assert!(out.contents().contains("Commands:"));
    }

    #[tokio::test]
    #[serial]
    async fn test_missing_required_shows_help() {
        let out = BufferSink::new();
        assert_eq!(dispatcher(&out).run(["sum"]).await, exit_code::SUCCESS);
        assert!(out.contents().starts_with("Usage: sum [options...]"));
    }
}
