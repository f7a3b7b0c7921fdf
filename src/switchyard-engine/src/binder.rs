//! Binding of raw argument tokens to a command's parameters.

use crate::coercion::{self, parse_bool};
use crate::error::BindError;
use crate::spec::{CommandSpec, ParameterKind, ParameterSpec};
use crate::value::{ArgValue, BoundArguments};

/// Result of a successful bind.
#[derive(Debug, Clone, PartialEq)]
pub enum BindOutcome {
    Bound(BoundArguments),
    /// Help was requested (or required arguments were omitted entirely).
    ShowHelp,
    ShowVersion,
}

/// Check the help/version shortcuts for a command's remaining tokens.
///
/// Zero tokens show help only when a required parameter exists; a single
/// `-h`/`--help` shows help; a single `--version` shows the version.
pub fn shortcut(spec: &CommandSpec, tokens: &[String]) -> Option<BindOutcome> {
    match tokens {
        [] if spec.has_required_parameters() => Some(BindOutcome::ShowHelp),
        [only] => match only.as_str() {
            "-h" | "--help" => Some(BindOutcome::ShowHelp),
            "--version" => Some(BindOutcome::ShowVersion),
            _ => None,
        },
        _ => None,
    }
}

/// Bind `tokens` against `spec`.
///
/// Service-backed parameters are left unbound; the dispatcher injects them.
pub fn bind(spec: &CommandSpec, tokens: &[String]) -> Result<BindOutcome, BindError> {
    if let Some(outcome) = shortcut(spec, tokens) {
        return Ok(outcome);
    }

    let params = spec.parameters();
    let mut slots: Vec<Option<ArgValue>> = vec![None; params.len()];
    let positionals: Vec<usize> = params
        .iter()
        .enumerate()
        .filter(|(_, p)| p.is_positional())
        .map(|(idx, _)| idx)
        .collect();
    let mut next_positional = 0;
    let mut options_ended = false;
    let mut i = 0;

    while i < tokens.len() {
        let token = tokens[i].as_str();

        if !options_ended && token == "--" {
            options_ended = true;
            i += 1;
            continue;
        }

        let target = if options_ended {
            None
        } else {
            find_option(params, token)?
        };

        let Some(idx) = target else {
            // Bare token: next positional in declaration order.
            let Some(&idx) = positionals.get(next_positional) else {
                return Err(BindError::ArgumentNameNotFound(token.to_string()));
            };
            let param = &params[idx];
            match param.kind() {
                ParameterKind::Variadic(ty) => {
                    slots[idx] = Some(collect_variadic(param, ty, &tokens[i..])?);
                    break;
                }
                ParameterKind::Positional(ty) => {
                    let value = coercion::coerce(ty, token)
                        .ok_or_else(|| BindError::parse(param.name(), token))?;
                    slots[idx] = Some(value);
                    next_positional += 1;
                    i += 1;
                    continue;
                }
                _ => unreachable!("positional list only holds positional parameters"),
            }
        };

        let param = &params[idx];
        let raw = tokens.get(i + 1).map(String::as_str);

        match param.kind() {
            ParameterKind::Flag => {
                match raw.and_then(parse_bool) {
                    Some(value) => {
                        slots[idx] = Some(ArgValue::Bool(value));
                        i += 2;
                    }
                    None => {
                        slots[idx] = Some(ArgValue::Bool(true));
                        i += 1;
                    }
                }
                continue;
            }
            ParameterKind::Variadic(ty) => {
                slots[idx] = Some(collect_variadic(param, ty, &tokens[i + 1..])?);
                break;
            }
            kind => {
                let raw = raw.unwrap_or("");
                let value = match kind {
                    ParameterKind::Scalar(ty) | ParameterKind::Nullable(ty) => {
                        coercion::coerce(ty, raw)
                    }
                    ParameterKind::Array(ty) => {
                        coercion::coerce_array(ty, raw).map(ArgValue::Array)
                    }
                    ParameterKind::Object => coercion::coerce_object(raw),
                    _ => None,
                };
                slots[idx] = Some(value.ok_or_else(|| BindError::parse(param.name(), raw))?);
                i += 2;
            }
        }
    }

    finish(params, slots).map(BindOutcome::Bound)
}

/// Resolve an option-shaped token to a parameter index.
///
/// Returns `Ok(None)` for bare tokens, including negative numbers and a lone `-`.
fn find_option(params: &[ParameterSpec], token: &str) -> Result<Option<usize>, BindError> {
    if !token.starts_with('-') || token == "-" || token.parse::<f64>().is_ok() {
        return Ok(None);
    }

    let found = if let Some(name) = token.strip_prefix("--") {
        params
            .iter()
            .position(|p| p.accepts_option() && p.matches_name(name))
    } else {
        let alias = &token[1..];
        let mut chars = alias.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => params
                .iter()
                .position(|p| p.accepts_option() && p.short_alias() == Some(c)),
            _ => None,
        }
    };

    found
        .map(Some)
        .ok_or_else(|| BindError::ArgumentNameNotFound(token.to_string()))
}

fn collect_variadic(
    param: &ParameterSpec,
    ty: &crate::spec::ScalarType,
    rest: &[String],
) -> Result<ArgValue, BindError> {
    let coerce_one = coercion::lookup(ty);
    rest.iter()
        .map(|raw| coerce_one(ty, raw).ok_or_else(|| BindError::parse(param.name(), raw)))
        .collect::<Result<Vec<_>, _>>()
        .map(ArgValue::Array)
}

fn finish(
    params: &[ParameterSpec],
    slots: Vec<Option<ArgValue>>,
) -> Result<BoundArguments, BindError> {
    let mut bound = BoundArguments::new();

    for (param, slot) in params.iter().zip(slots) {
        if param.from_external_service() {
            continue;
        }

        let value = match slot {
            Some(value) => value,
            None => match (param.default_value(), param.kind()) {
                (Some(default), _) => default.clone(),
                (None, ParameterKind::Flag) => ArgValue::Bool(false),
                (None, ParameterKind::Variadic(_)) => ArgValue::Array(Vec::new()),
                (None, _) => {
                    return Err(BindError::RequiredArgumentMissing(param.name().to_string()));
                }
            },
        };
        bound.insert(param.name(), value);
    }

    Ok(bound)
}
