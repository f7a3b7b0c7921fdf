//! Command and parameter descriptors.
//!
//! Descriptors are plain data built by the host (or a registrar) before the
//! dispatcher starts. Builder methods consume `self`; once a [`CommandSpec`]
//! is registered it is only reachable through shared references.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::error::RegistrationError;
use crate::filter::FilterSpec;
use crate::services::ServiceKey;
use crate::validation::Rule;
use crate::value::ArgValue;

/// Parser for a host-defined scalar type.
pub type CustomParseFn = Arc<dyn Fn(&str) -> Option<ArgValue> + Send + Sync>;

/// A host-defined scalar type with its own parser.
#[derive(Clone)]
pub struct CustomScalar {
    name: String,
    parse: CustomParseFn,
}

impl CustomScalar {
    /// A scalar named `name` in help output, parsed by `parse`.
    pub fn new<F>(name: impl Into<String>, parse: F) -> Self
    where
        F: Fn(&str) -> Option<ArgValue> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            parse: Arc::new(parse),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the parser; `None` means the token is rejected.
    pub fn parse(&self, raw: &str) -> Option<ArgValue> {
        (self.parse)(raw)
    }
}

impl fmt::Debug for CustomScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomScalar")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Scalar value types understood by the coercion layer.
#[derive(Debug, Clone)]
pub enum ScalarType {
    String,
    Char,
    Bool,
    Int,
    UInt,
    Float,
    /// Enum with the given member names, matched case-insensitively.
    Enum(Vec<String>),
    /// RFC 3339 timestamp.
    DateTime,
    /// `YYYY-MM-DD`.
    Date,
    Uuid,
    Path,
    Custom(CustomScalar),
}

impl ScalarType {
    /// An enum type with the given member names.
    pub fn enumeration<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScalarType::Enum(members.into_iter().map(Into::into).collect())
    }

    /// Type hint shown in help output.
    pub fn hint(&self) -> String {
        match self {
            ScalarType::String => "string".to_string(),
            ScalarType::Char => "char".to_string(),
            ScalarType::Bool => "bool".to_string(),
            ScalarType::Int => "int".to_string(),
            ScalarType::UInt => "uint".to_string(),
            ScalarType::Float => "double".to_string(),
            ScalarType::Enum(members) => members.join("|"),
            ScalarType::DateTime => "datetime".to_string(),
            ScalarType::Date => "date".to_string(),
            ScalarType::Uuid => "uuid".to_string(),
            ScalarType::Path => "path".to_string(),
            ScalarType::Custom(custom) => custom.name().to_string(),
        }
    }

    /// Hint with enum alternatives parenthesised, so a suffix applies to all of them.
    fn grouped_hint(&self) -> String {
        match self {
            ScalarType::Enum(members) if members.len() > 1 => format!("({})", self.hint()),
            _ => self.hint(),
        }
    }
}

/// How a parameter receives its value.
#[derive(Debug, Clone)]
pub enum ParameterKind {
    /// Boolean switch; presence means `true`.
    Flag,
    Scalar(ScalarType),
    /// Scalar that may hold `null`; defaults to `null` only when a default is given.
    Nullable(ScalarType),
    /// Comma-separated or JSON array value.
    Array(ScalarType),
    /// JSON-shaped value, always decoded as JSON.
    Object,
    /// Bare token matched by position.
    Positional(ScalarType),
    /// Trailing parameter that consumes every remaining token.
    Variadic(ScalarType),
    /// Supplied by the service provider, never by tokens.
    Service(ServiceKey),
}

impl ParameterKind {
    /// Type hint shown in help output; `None` for flags and services.
    pub fn hint(&self) -> Option<String> {
        match self {
            ParameterKind::Flag | ParameterKind::Service(_) => None,
            ParameterKind::Scalar(ty) | ParameterKind::Positional(ty) => Some(ty.hint()),
            ParameterKind::Nullable(ty) => Some(format!("{}?", ty.grouped_hint())),
            ParameterKind::Array(ty) => Some(format!("{}[]", ty.grouped_hint())),
            ParameterKind::Variadic(ty) => Some(format!("{}...", ty.grouped_hint())),
            ParameterKind::Object => Some("json".to_string()),
        }
    }
}

/// Descriptor of one command parameter.
#[derive(Debug, Clone)]
pub struct ParameterSpec {
    name: String,
    short_alias: Option<char>,
    kind: ParameterKind,
    default: Option<ArgValue>,
    rules: Vec<Rule>,
    description: Option<String>,
}

impl ParameterSpec {
    /// A parameter with no alias, default, rules or description.
    pub fn new(name: impl Into<String>, kind: ParameterKind) -> Self {
        Self {
            name: name.into(),
            short_alias: None,
            kind,
            default: None,
            rules: Vec::new(),
            description: None,
        }
    }

    /// Boolean switch, `false` unless present.
    pub fn flag(name: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::Flag)
    }

    /// Single value passed as `--name value`.
    pub fn scalar(name: impl Into<String>, ty: ScalarType) -> Self {
        Self::new(name, ParameterKind::Scalar(ty))
    }

    /// Single value that may also be `null`.
    pub fn nullable(name: impl Into<String>, ty: ScalarType) -> Self {
        Self::new(name, ParameterKind::Nullable(ty))
    }

    /// List value, comma-separated or a JSON array.
    pub fn array(name: impl Into<String>, ty: ScalarType) -> Self {
        Self::new(name, ParameterKind::Array(ty))
    }

    /// Arbitrary JSON value.
    pub fn object(name: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::Object)
    }

    /// Value taken from the next bare token.
    pub fn positional(name: impl Into<String>, ty: ScalarType) -> Self {
        Self::new(name, ParameterKind::Positional(ty))
    }

    /// Every remaining bare token.
    pub fn variadic(name: impl Into<String>, ty: ScalarType) -> Self {
        Self::new(name, ParameterKind::Variadic(ty))
    }

    /// A parameter resolved from the service provider by type.
    pub fn service<T: std::any::Any>(name: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::Service(ServiceKey::of::<T>()))
    }

    /// Single-letter alias, used as `-a`.
    pub fn with_alias(mut self, alias: char) -> Self {
        self.short_alias = Some(alias);
        self
    }

    /// Value used when the parameter is not supplied. Makes it optional.
    pub fn with_default(mut self, value: impl Into<ArgValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Add a validation rule. Rules run in the order they were added.
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Text shown in the help tables.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declared name, as used by [`BoundArguments::get`](crate::BoundArguments::get).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Option spelling of the name: `dry_run` and `dryRun` become `dry-run`.
    pub fn option_name(&self) -> String {
        to_kebab_case(&self.name)
    }

    /// The `-a` alias, if any.
    pub fn short_alias(&self) -> Option<char> {
        self.short_alias
    }

    /// How the parameter receives its value.
    pub fn kind(&self) -> &ParameterKind {
        &self.kind
    }

    /// Default applied when the parameter is not supplied.
    pub fn default_value(&self) -> Option<&ArgValue> {
        self.default.as_ref()
    }

    /// Validation rules, in declaration order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Help text.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// True iff there is no default and the kind is neither Flag nor Variadic.
    pub fn required(&self) -> bool {
        self.default.is_none()
            && !matches!(self.kind, ParameterKind::Flag | ParameterKind::Variadic(_))
    }

    /// Whether the value comes from the service provider.
    pub fn from_external_service(&self) -> bool {
        matches!(self.kind, ParameterKind::Service(_))
    }

    /// Positional and variadic parameters take bare tokens.
    pub fn is_positional(&self) -> bool {
        matches!(
            self.kind,
            ParameterKind::Positional(_) | ParameterKind::Variadic(_)
        )
    }

    /// Whether `--name` / `-a` may address this parameter.
    pub(crate) fn accepts_option(&self) -> bool {
        !matches!(
            self.kind,
            ParameterKind::Positional(_) | ParameterKind::Service(_)
        )
    }

    pub(crate) fn matches_name(&self, name: &str) -> bool {
        self.name == name || self.option_name() == name
    }
}

/// Descriptor of one command.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    segments: Vec<String>,
    parameters: Vec<ParameterSpec>,
    filters: Vec<FilterSpec>,
    summary: Option<String>,
    aliases: Vec<Vec<String>>,
}

impl CommandSpec {
    /// Create a command; dots and whitespace both separate name segments.
    pub fn new(full_name: impl AsRef<str>) -> Self {
        Self {
            segments: split_name(full_name.as_ref()),
            parameters: Vec::new(),
            filters: Vec::new(),
            summary: None,
            aliases: Vec::new(),
        }
    }

    /// The command run when no named command matches.
    pub fn root() -> Self {
        Self::new("")
    }

    /// Append a parameter.
    pub fn with_parameter(mut self, parameter: ParameterSpec) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Append several parameters, keeping their order.
    pub fn with_parameters(mut self, parameters: impl IntoIterator<Item = ParameterSpec>) -> Self {
        self.parameters.extend(parameters);
        self
    }

    /// Add a command filter. It runs after the global filters.
    pub fn with_filter(mut self, filter: FilterSpec) -> Self {
        self.filters.push(filter);
        self
    }

    /// One-line description for help output.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Alternative name; may have several segments.
    pub fn with_alias(mut self, alias: impl AsRef<str>) -> Self {
        self.aliases.push(split_name(alias.as_ref()));
        self
    }

    /// Space-joined full name; empty for the root command.
    pub fn full_name(&self) -> String {
        self.segments.join(" ")
    }

    /// Name segments, e.g. `["user", "add"]`.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether this is the root command.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Aliases, space-joined.
    pub fn aliases(&self) -> Vec<String> {
        self.aliases.iter().map(|segments| segments.join(" ")).collect()
    }

    pub(crate) fn alias_segments(&self) -> &[Vec<String>] {
        &self.aliases
    }

    /// Parameters in declaration order.
    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    /// Look up a parameter by declared name.
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Filters in execution order.
    pub fn filters(&self) -> &[FilterSpec] {
        &self.filters
    }

    /// One-line description, if set.
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Whether any token-bound parameter must be supplied.
    pub fn has_required_parameters(&self) -> bool {
        self.parameters
            .iter()
            .any(|p| p.required() && !p.from_external_service())
    }

    pub(crate) fn prepend_filters(&mut self, globals: &[FilterSpec]) {
        if globals.is_empty() {
            return;
        }
        let own = std::mem::take(&mut self.filters);
        self.filters = globals.iter().cloned().chain(own).collect();
    }

    /// Check the structural invariants of the parameter list.
    pub(crate) fn check_parameters(&self) -> Result<(), RegistrationError> {
        let invalid = |reason: String| RegistrationError::InvalidParameter {
            command: self.full_name(),
            reason,
        };

        let mut names = HashSet::new();
        let mut aliases = HashSet::new();
        let mut seen_variadic: Option<&str> = None;

        for param in &self.parameters {
            if param.name.is_empty() {
                return Err(invalid("parameter names must not be empty".to_string()));
            }
            if !names.insert(param.name.as_str()) {
                return Err(invalid(format!("duplicate parameter name '{}'", param.name)));
            }

            if let Some(alias) = param.short_alias {
                if !alias.is_ascii_alphabetic() {
                    return Err(invalid(format!(
                        "short alias '-{alias}' of '{}' must be an ASCII letter",
                        param.name
                    )));
                }
                if !aliases.insert(alias) {
                    return Err(invalid(format!("duplicate short alias '-{alias}'")));
                }
            }

            match &param.kind {
                ParameterKind::Variadic(_) => {
                    if let Some(previous) = seen_variadic {
                        return Err(invalid(format!(
                            "only one variadic parameter is allowed, found '{previous}' and '{}'",
                            param.name
                        )));
                    }
                    seen_variadic = Some(param.name.as_str());
                }
                ParameterKind::Positional(_) => {
                    if let Some(variadic) = seen_variadic {
                        return Err(invalid(format!(
                            "positional parameter '{}' follows variadic parameter '{variadic}'",
                            param.name
                        )));
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }
}

fn split_name(name: &str) -> Vec<String> {
    name.split(|c: char| c == '.' || c.is_whitespace())
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

fn to_kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;

    for c in name.chars() {
        if c == '_' || c == '-' {
            out.push('-');
            prev_lower = false;
        } else if c.is_uppercase() {
            if prev_lower {
                out.push('-');
            }
            out.extend(c.to_lowercase());
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
        }
    }

    out
}
