//! Token → typed value coercion.
//!
//! Every scalar kind maps to one plain function; the binder looks the
//! function up once per parameter with [`lookup`] and applies it to each raw
//! token. Coercion never guesses: a value that does not match the kind's
//! canonical text form yields `None`.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate};
use uuid::Uuid;

use crate::spec::ScalarType;
use crate::value::ArgValue;

/// Coerces one raw token for the given scalar type.
pub type CoerceFn = fn(&ScalarType, &str) -> Option<ArgValue>;

/// Return the coercion function for a scalar kind.
pub fn lookup(ty: &ScalarType) -> CoerceFn {
    match ty {
        ScalarType::String => coerce_string,
        ScalarType::Char => coerce_char,
        ScalarType::Bool => coerce_bool,
        ScalarType::Int => coerce_int,
        ScalarType::UInt => coerce_uint,
        ScalarType::Float => coerce_float,
        ScalarType::Enum(_) => coerce_enum,
        ScalarType::DateTime => coerce_datetime,
        ScalarType::Date => coerce_date,
        ScalarType::Uuid => coerce_uuid,
        ScalarType::Path => coerce_path,
        ScalarType::Custom(_) => coerce_custom,
    }
}

/// Coerce a single token.
pub fn coerce(ty: &ScalarType, raw: &str) -> Option<ArgValue> {
    lookup(ty)(ty, raw)
}

/// Parse `true`/`false`, ignoring case.
pub fn parse_bool(raw: &str) -> Option<bool> {
    if raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Coerce an array value: a JSON array when bracket-prefixed, otherwise a
/// comma-separated list where commas inside `[]` or `{}` do not split.
pub fn coerce_array(ty: &ScalarType, raw: &str) -> Option<Vec<ArgValue>> {
    let coerce_one = lookup(ty);

    if raw.trim_start().starts_with('[') {
        let items: Vec<serde_json::Value> = serde_json::from_str(raw).ok()?;
        return items
            .iter()
            .map(|item| match item {
                serde_json::Value::String(s) => coerce_one(ty, s),
                other => coerce_one(ty, &other.to_string()),
            })
            .collect();
    }

    if raw.is_empty() {
        return Some(Vec::new());
    }

    split_top_level(raw)
        .into_iter()
        .map(|part| coerce_one(ty, part))
        .collect()
}

/// Decode an object value; any JSON document is accepted.
pub fn coerce_object(raw: &str) -> Option<ArgValue> {
    serde_json::from_str(raw).ok().map(ArgValue::Json)
}

fn split_top_level(raw: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (idx, c) in raw.char_indices() {
        match c {
            '[' | '{' => depth += 1,
            ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&raw[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&raw[start..]);
    parts
}

fn coerce_string(_: &ScalarType, raw: &str) -> Option<ArgValue> {
    Some(ArgValue::Str(raw.to_string()))
}

fn coerce_char(_: &ScalarType, raw: &str) -> Option<ArgValue> {
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(ArgValue::Char(c)),
        _ => None,
    }
}

fn coerce_bool(_: &ScalarType, raw: &str) -> Option<ArgValue> {
    parse_bool(raw).map(ArgValue::Bool)
}

fn coerce_int(_: &ScalarType, raw: &str) -> Option<ArgValue> {
    raw.parse::<i64>().ok().map(ArgValue::Int)
}

fn coerce_uint(_: &ScalarType, raw: &str) -> Option<ArgValue> {
    raw.parse::<u64>().ok().map(ArgValue::UInt)
}

fn coerce_float(_: &ScalarType, raw: &str) -> Option<ArgValue> {
    raw.parse::<f64>().ok().map(ArgValue::Float)
}

fn coerce_enum(ty: &ScalarType, raw: &str) -> Option<ArgValue> {
    let ScalarType::Enum(members) = ty else {
        return None;
    };
    members
        .iter()
        .find(|member| member.eq_ignore_ascii_case(raw))
        .map(|member| ArgValue::Enum(member.clone()))
}

fn coerce_datetime(_: &ScalarType, raw: &str) -> Option<ArgValue> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(ArgValue::DateTime)
}

fn coerce_date(_: &ScalarType, raw: &str) -> Option<ArgValue> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(ArgValue::Date)
}

fn coerce_uuid(_: &ScalarType, raw: &str) -> Option<ArgValue> {
    Uuid::parse_str(raw).ok().map(ArgValue::Uuid)
}

fn coerce_path(_: &ScalarType, raw: &str) -> Option<ArgValue> {
    if raw.is_empty() {
        return None;
    }
    Some(ArgValue::Path(PathBuf::from(raw)))
}

fn coerce_custom(ty: &ScalarType, raw: &str) -> Option<ArgValue> {
    match ty {
        ScalarType::Custom(custom) => custom.parse(raw),
        _ => None,
    }
}
