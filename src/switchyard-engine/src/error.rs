//! Error types for registration, binding, validation and execution.

use thiserror::Error;

/// Errors raised while registering commands and filters.
///
/// These are programmer errors: `AppBuilder::build` returns the first one and
/// no dispatcher is produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// Two commands (or a command and an alias) share a full name.
    #[error("Command name '{0}' is already registered.")]
    DuplicateCommandName(String),

    /// A filter descriptor declares a constructor that does not take exactly
    /// one dependency (the next link in the chain).
    #[error(
        "Filter '{filter}' must declare exactly one constructor dependency (the next filter), found {found}."
    )]
    FilterConstructor { filter: String, found: usize },

    /// The same registration call site added more than one command.
    #[error("Command '{command}' was registered in a loop at {location}; register each command once.")]
    CommandRegisteredInLoop { command: String, location: String },

    /// A parameter list violates a structural invariant.
    #[error("Invalid parameter list for command '{command}': {reason}")]
    InvalidParameter { command: String, reason: String },

    /// A required service-backed parameter cannot be resolved.
    #[error(
        "Command '{command}' requires service '{service}' for parameter '{parameter}', but no service provider supplies it."
    )]
    MissingService {
        command: String,
        parameter: String,
        service: String,
    },
}

/// Errors raised while binding argument tokens to parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    /// An option-shaped or bare token matched no parameter.
    #[error("Argument '{0}' is not recognized.")]
    ArgumentNameNotFound(String),

    /// A raw value could not be coerced to the parameter's type.
    #[error("Argument '{name}' failed to parse, provided value: {value}")]
    ArgumentParse { name: String, value: String },

    /// A required parameter received no value.
    #[error("Required argument '{0}' was not specified.")]
    RequiredArgumentMissing(String),
}

impl BindError {
    pub(crate) fn parse(name: &str, value: &str) -> Self {
        Self::ArgumentParse {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

/// Aggregated validation failures, one line per failing rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Returned by a command or filter that stopped because the cooperative
/// cancellation token fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Error)]
#[error("The operation was cancelled.")]
pub struct OperationCancelled;

/// A command task failed outside the normal error path.
#[derive(Debug, Error)]
pub enum UnhandledExecutionError {
    /// The command task panicked.
    #[error("Command '{command}' panicked: {message}")]
    Panicked { command: String, message: String },

    /// The command task was aborted before it produced a result.
    #[error("Command '{command}' was aborted before completing.")]
    Aborted { command: String },
}

/// Failure to read values back out of [`crate::BoundArguments`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentAccessError {
    #[error("No bound value for parameter '{0}'.")]
    Missing(String),

    #[error("Parameter '{name}' holds a {actual} value, expected {expected}.")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },
}

/// Errors loading [`crate::EngineSettings`].
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid value for {var}: {value}")]
    InvalidEnv { var: String, value: String },
}
