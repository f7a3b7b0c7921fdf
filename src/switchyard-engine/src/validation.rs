//! Declarative validation rules and their aggregation.

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::error::ValidationError;
use crate::spec::CommandSpec;
use crate::value::{ArgValue, BoundArguments};

type Predicate = Arc<dyn Fn(&ArgValue) -> bool + Send + Sync>;

#[derive(Clone)]
enum RuleKind {
    Range { min: f64, max: f64 },
    Required,
    MinLength(usize),
    MaxLength(usize),
    Pattern(Regex),
    Custom(Predicate),
}

/// A predicate over one bound value plus the message shown when it fails.
#[derive(Clone)]
pub struct Rule {
    kind: RuleKind,
    message: String,
}

impl Rule {
    /// Inclusive numeric range.
    pub fn range(min: f64, max: f64) -> Self {
        Self {
            kind: RuleKind::Range { min, max },
            message: format!("must be between {min} and {max}"),
        }
    }

    /// Rejects `null` and empty strings.
    pub fn required() -> Self {
        Self {
            kind: RuleKind::Required,
            message: "is required".to_string(),
        }
    }

    pub fn min_length(len: usize) -> Self {
        Self {
            kind: RuleKind::MinLength(len),
            message: format!("must be a string or array type with a minimum length of '{len}'"),
        }
    }

    pub fn max_length(len: usize) -> Self {
        Self {
            kind: RuleKind::MaxLength(len),
            message: format!("must be a string or array type with a maximum length of '{len}'"),
        }
    }

    /// The whole value must match `pattern`.
    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        let anchored = Regex::new(&format!("^(?:{pattern})$"))?;
        Ok(Self {
            kind: RuleKind::Pattern(anchored),
            message: format!("must match the regular expression '{pattern}'"),
        })
    }

    pub fn custom<F>(message: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&ArgValue) -> bool + Send + Sync + 'static,
    {
        Self {
            kind: RuleKind::Custom(Arc::new(predicate)),
            message: message.into(),
        }
    }

    /// Replace the failure message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether `value` satisfies the rule. `null` satisfies everything but `required`.
    pub fn check(&self, value: &ArgValue) -> bool {
        if value.is_null() {
            return !matches!(self.kind, RuleKind::Required);
        }

        match &self.kind {
            RuleKind::Range { min, max } => value
                .as_f64()
                .is_some_and(|v| v >= *min && v <= *max),
            RuleKind::Required => !matches!(value, ArgValue::Str(s) if s.is_empty()),
            RuleKind::MinLength(len) => value.length().is_some_and(|l| l >= *len),
            RuleKind::MaxLength(len) => value.length().is_some_and(|l| l <= *len),
            RuleKind::Pattern(re) => re.is_match(&value.to_token()),
            RuleKind::Custom(predicate) => predicate(value),
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// One failed rule on one parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub parameter: String,
    pub message: String,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "The field {} {}.", self.parameter, self.message)
    }
}

/// Evaluate every rule of every parameter, in declaration order.
pub fn failures(spec: &CommandSpec, bound: &BoundArguments) -> Vec<ValidationFailure> {
    let mut out = Vec::new();

    for param in spec.parameters() {
        if param.rules().is_empty() {
            continue;
        }
        let value = bound.raw(param.name()).unwrap_or(&ArgValue::Null);
        for rule in param.rules() {
            if !rule.check(value) {
                out.push(ValidationFailure {
                    parameter: param.name().to_string(),
                    message: rule.message().to_string(),
                });
            }
        }
    }

    out
}

/// Validate bound values, joining all failures with newlines.
pub fn validate(spec: &CommandSpec, bound: &BoundArguments) -> Result<(), ValidationError> {
    let failures = failures(spec, bound);
    if failures.is_empty() {
        return Ok(());
    }

    let message = failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n");
    Err(ValidationError::new(message))
}
