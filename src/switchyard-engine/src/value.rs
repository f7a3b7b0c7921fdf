//! Typed argument values and the per-invocation binding result.

use std::any::Any;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate};
use indexmap::IndexMap;
use uuid::Uuid;

use crate::error::ArgumentAccessError;
use crate::services::ServiceHandle;

/// A strongly typed value produced by binding.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Char(char),
    Str(String),
    /// Enum member, normalised to its declared spelling.
    Enum(String),
    DateTime(DateTime<FixedOffset>),
    Date(NaiveDate),
    Uuid(Uuid),
    Path(PathBuf),
    Json(serde_json::Value),
    Array(Vec<ArgValue>),
    /// Value injected from the service provider; never produced from tokens.
    Service(ServiceHandle),
}

impl ArgValue {
    /// Short name of the variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ArgValue::Null => "null",
            ArgValue::Bool(_) => "bool",
            ArgValue::Int(_) => "int",
            ArgValue::UInt(_) => "uint",
            ArgValue::Float(_) => "double",
            ArgValue::Char(_) => "char",
            ArgValue::Str(_) => "string",
            ArgValue::Enum(_) => "enum",
            ArgValue::DateTime(_) => "datetime",
            ArgValue::Date(_) => "date",
            ArgValue::Uuid(_) => "uuid",
            ArgValue::Path(_) => "path",
            ArgValue::Json(_) => "json",
            ArgValue::Array(_) => "array",
            ArgValue::Service(_) => "service",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ArgValue::Null)
    }

    /// Numeric view used by range rules.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ArgValue::Int(v) => Some(*v as f64),
            ArgValue::UInt(v) => Some(*v as f64),
            ArgValue::Float(v) => Some(*v),
            ArgValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Length used by length rules: characters for text, elements for arrays.
    pub fn length(&self) -> Option<usize> {
        match self {
            ArgValue::Str(s) => Some(s.chars().count()),
            ArgValue::Array(items) => Some(items.len()),
            ArgValue::Json(serde_json::Value::Array(items)) => Some(items.len()),
            ArgValue::Json(serde_json::Value::String(s)) => Some(s.chars().count()),
            _ => None,
        }
    }

    /// Render the value as a single token that binds back to an equal value.
    ///
    /// Arrays render as JSON arrays so elements containing commas survive.
    pub fn to_token(&self) -> String {
        match self {
            ArgValue::Null => "null".to_string(),
            ArgValue::Bool(v) => v.to_string(),
            ArgValue::Int(v) => v.to_string(),
            ArgValue::UInt(v) => v.to_string(),
            ArgValue::Float(v) => v.to_string(),
            ArgValue::Char(v) => v.to_string(),
            ArgValue::Str(v) | ArgValue::Enum(v) => v.clone(),
            ArgValue::DateTime(v) => v.to_rfc3339(),
            ArgValue::Date(v) => v.format("%Y-%m-%d").to_string(),
            ArgValue::Uuid(v) => v.to_string(),
            ArgValue::Path(v) => v.display().to_string(),
            ArgValue::Json(v) => v.to_string(),
            ArgValue::Array(_) => self.to_json().to_string(),
            ArgValue::Service(handle) => format!("<service:{}>", handle.type_name()),
        }
    }

    /// JSON view of the value.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;

        match self {
            ArgValue::Null | ArgValue::Service(_) => Value::Null,
            ArgValue::Bool(v) => Value::Bool(*v),
            ArgValue::Int(v) => Value::from(*v),
            ArgValue::UInt(v) => Value::from(*v),
            ArgValue::Float(v) => serde_json::Number::from_f64(*v)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(v.to_string())),
            ArgValue::Json(v) => v.clone(),
            ArgValue::Array(items) => Value::Array(items.iter().map(ArgValue::to_json).collect()),
            other => Value::String(other.to_token()),
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_token())
    }
}

macro_rules! arg_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for ArgValue {
                fn from(value: $ty) -> Self {
                    ArgValue::$variant(value.into())
                }
            }
        )*
    };
}

arg_value_from! {
    bool => Bool,
    i32 => Int,
    i64 => Int,
    u32 => UInt,
    u64 => UInt,
    f64 => Float,
    char => Char,
    String => Str,
    &str => Str,
    PathBuf => Path,
    Uuid => Uuid,
    NaiveDate => Date,
    DateTime<FixedOffset> => DateTime,
    serde_json::Value => Json,
    Vec<ArgValue> => Array,
}

/// Conversion from a bound [`ArgValue`] into a Rust type.
pub trait FromArgValue: Sized {
    /// Type name reported when the conversion fails.
    const EXPECTED: &'static str;

    fn from_arg(value: &ArgValue) -> Option<Self>;
}

macro_rules! from_arg_int {
    ($($ty:ty),*) => {
        $(
            impl FromArgValue for $ty {
                const EXPECTED: &'static str = stringify!($ty);

                fn from_arg(value: &ArgValue) -> Option<Self> {
                    match value {
                        ArgValue::Int(v) => <$ty>::try_from(*v).ok(),
                        ArgValue::UInt(v) => <$ty>::try_from(*v).ok(),
                        _ => None,
                    }
                }
            }
        )*
    };
}

from_arg_int!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

impl FromArgValue for f64 {
    const EXPECTED: &'static str = "f64";

    fn from_arg(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::Float(v) => Some(*v),
            ArgValue::Int(v) => Some(*v as f64),
            ArgValue::UInt(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl FromArgValue for bool {
    const EXPECTED: &'static str = "bool";

    fn from_arg(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromArgValue for char {
    const EXPECTED: &'static str = "char";

    fn from_arg(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::Char(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromArgValue for String {
    const EXPECTED: &'static str = "String";

    fn from_arg(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::Str(v) | ArgValue::Enum(v) => Some(v.clone()),
            ArgValue::Char(v) => Some(v.to_string()),
            _ => None,
        }
    }
}

impl FromArgValue for PathBuf {
    const EXPECTED: &'static str = "PathBuf";

    fn from_arg(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::Path(v) => Some(v.clone()),
            ArgValue::Str(v) => Some(PathBuf::from(v)),
            _ => None,
        }
    }
}

impl FromArgValue for Uuid {
    const EXPECTED: &'static str = "Uuid";

    fn from_arg(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::Uuid(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromArgValue for NaiveDate {
    const EXPECTED: &'static str = "NaiveDate";

    fn from_arg(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::Date(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromArgValue for DateTime<FixedOffset> {
    const EXPECTED: &'static str = "DateTime";

    fn from_arg(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::DateTime(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromArgValue for serde_json::Value {
    const EXPECTED: &'static str = "serde_json::Value";

    fn from_arg(value: &ArgValue) -> Option<Self> {
        Some(value.to_json())
    }
}

impl FromArgValue for ArgValue {
    const EXPECTED: &'static str = "ArgValue";

    fn from_arg(value: &ArgValue) -> Option<Self> {
        Some(value.clone())
    }
}

impl<T: FromArgValue> FromArgValue for Vec<T> {
    const EXPECTED: &'static str = "array";

    fn from_arg(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::Array(items) => items.iter().map(T::from_arg).collect(),
            _ => None,
        }
    }
}

impl<T: FromArgValue> FromArgValue for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;

    fn from_arg(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::Null => Some(None),
            other => T::from_arg(other).map(Some),
        }
    }
}

/// Values bound for one invocation, in parameter declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundArguments {
    values: IndexMap<String, ArgValue>,
}

impl BoundArguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, name: impl Into<String>, value: ArgValue) {
        self.values.insert(name.into(), value);
    }

    /// The raw bound value.
    pub fn raw(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    /// Convert a bound value into `T`.
    pub fn get<T: FromArgValue>(&self, name: &str) -> Result<T, ArgumentAccessError> {
        let value = self
            .values
            .get(name)
            .ok_or_else(|| ArgumentAccessError::Missing(name.to_string()))?;

        T::from_arg(value).ok_or_else(|| ArgumentAccessError::TypeMismatch {
            name: name.to_string(),
            expected: T::EXPECTED,
            actual: value.kind_name(),
        })
    }

    /// Fetch an injected service.
    pub fn service<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, ArgumentAccessError> {
        match self.values.get(name) {
            Some(ArgValue::Service(handle)) => {
                handle
                    .downcast::<T>()
                    .ok_or_else(|| ArgumentAccessError::TypeMismatch {
                        name: name.to_string(),
                        expected: std::any::type_name::<T>(),
                        actual: handle.type_name(),
                    })
            }
            Some(other) => Err(ArgumentAccessError::TypeMismatch {
                name: name.to_string(),
                expected: std::any::type_name::<T>(),
                actual: other.kind_name(),
            }),
            None => Err(ArgumentAccessError::Missing(name.to_string())),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }
}
