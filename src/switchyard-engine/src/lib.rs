//! # Switchyard Engine
//!
//! Runtime dispatch for command-line applications whose commands are declared
//! up front as plain data. Given a registry of commands the engine parses
//! process arguments into typed values, validates them, runs a filter
//! pipeline around the command body and turns the outcome into an exit code.
//!
//! ## Features
//!
//! - **Binding**: options (`--name`, `-a`), flags, positionals, variadics,
//!   arrays (comma-separated or JSON) and JSON objects
//! - **Validation**: declarative rules, all failures reported together
//! - **Filters**: async interceptors around the command body
//! - **Cancellation**: SIGINT/SIGQUIT/SIGTERM cancel a cooperative token;
//!   commands that ignore it are abandoned after a grace period
//! - **Help**: deterministic usage text for each command and for the root
//!
//! ## Example
//!
//! ```rust,ignore
//! use switchyard_engine::{AppBuilder, CommandSpec, ParameterSpec, RuntimeConfig, ScalarType};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut builder = AppBuilder::new();
//!     builder.add(
//!         CommandSpec::new("greet")
//!             .with_parameter(ParameterSpec::scalar("name", ScalarType::String).with_alias('n')),
//!         |ctx, _token| async move {
//!             let name: String = ctx.values().get("name")?;
//!             println!("Hello, {name}!");
//!             Ok(())
//!         },
//!     );
//!
//!     let dispatcher = builder.build(RuntimeConfig::new())?;
//!     let code = dispatcher.run(std::env::args().skip(1)).await;
//!     std::process::exit(code);
//! }
//! ```

pub mod binder;
pub mod builder;
pub mod cancellation;
pub mod coercion;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod help;
pub mod log;
pub mod registry;
pub mod services;
pub mod spec;
pub mod validation;
pub mod value;

// Re-exports for convenience
pub use binder::{BindOutcome, bind};
pub use builder::{AppBuilder, Registrar};
pub use cancellation::{CancellationController, CancellationState, DEFAULT_SHUTDOWN_TIMEOUT};
pub use config::{EngineSettings, RuntimeConfig};
pub use context::InvocationContext;
pub use dispatcher::{Dispatcher, exit_code};
pub use error::{
    ArgumentAccessError, BindError, OperationCancelled, RegistrationError, SettingsError,
    UnhandledExecutionError, ValidationError,
};
pub use filter::{CommandHandler, Filter, FilterChain, FilterSpec, Next, handler};
pub use help::VersionInfo;
pub use log::{BufferSink, LogSink, StderrSink, StdoutSink};
pub use registry::{CommandRegistry, RegisteredCommand};
pub use services::{ServiceCollection, ServiceHandle, ServiceKey, ServiceProvider};
pub use spec::{CommandSpec, CustomScalar, ParameterKind, ParameterSpec, ScalarType};
pub use validation::{Rule, ValidationFailure};
pub use value::{ArgValue, BoundArguments, FromArgValue};

// Filters and command bodies receive this token.
pub use tokio_util::sync::CancellationToken;
