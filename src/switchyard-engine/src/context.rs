//! Per-invocation context handed to filters and the command body.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::log::{LogSink, StderrSink, StdoutSink};
use crate::value::BoundArguments;

/// State for one command invocation.
///
/// Cloning is cheap; clones share the bound values, the state slot and the
/// exit-code cell. Output written through [`log`](Self::log) and
/// [`log_error`](Self::log_error) reaches the sinks of the dispatcher's
/// [`RuntimeConfig`](crate::RuntimeConfig).
#[derive(Clone)]
pub struct InvocationContext {
    command_name: String,
    arguments: Arc<[String]>,
    values: Arc<BoundArguments>,
    state: Option<Arc<dyn Any + Send + Sync>>,
    exit_code: Arc<Mutex<Option<i32>>>,
    log: Arc<dyn LogSink>,
    log_error: Arc<dyn LogSink>,
}

impl InvocationContext {
    /// A context writing to stdout and stderr.
    pub fn new(
        command_name: impl Into<String>,
        arguments: impl Into<Arc<[String]>>,
        values: BoundArguments,
    ) -> Self {
        Self {
            command_name: command_name.into(),
            arguments: arguments.into(),
            values: Arc::new(values),
            state: None,
            exit_code: Arc::new(Mutex::new(None)),
            log: Arc::new(StdoutSink),
            log_error: Arc::new(StderrSink),
        }
    }

    /// Route command output to `log` and error output to `log_error`.
    pub fn with_sinks(mut self, log: Arc<dyn LogSink>, log_error: Arc<dyn LogSink>) -> Self {
        self.log = log;
        self.log_error = log_error;
        self
    }

    /// Sink for the command's normal output.
    pub fn log(&self) -> &dyn LogSink {
        self.log.as_ref()
    }

    /// Sink for the command's error output.
    pub fn log_error(&self) -> &dyn LogSink {
        self.log_error.as_ref()
    }

    /// Space-joined name of the running command; empty for the root command.
    pub fn command_name(&self) -> &str {
        &self.command_name
    }

    /// Tokens that followed the command name.
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// Bound values, services included.
    pub fn values(&self) -> &BoundArguments {
        &self.values
    }

    /// Attach host state for downstream filters and the body.
    pub fn with_state<T: Any + Send + Sync>(mut self, state: T) -> Self {
        self.state = Some(Arc::new(state));
        self
    }

    pub fn state<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.state
            .as_ref()
            .and_then(|state| Arc::clone(state).downcast::<T>().ok())
    }

    /// Set the process exit code reported when the invocation completes.
    pub fn set_exit_code(&self, code: i32) {
        *self.exit_code.lock() = Some(code);
    }

    pub fn exit_code(&self) -> Option<i32> {
        *self.exit_code.lock()
    }
}

impl fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("command_name", &self.command_name)
            .field("arguments", &self.arguments)
            .field("values", &self.values)
            .field("has_state", &self.state.is_some())
            .field("exit_code", &self.exit_code())
            .finish()
    }
}
