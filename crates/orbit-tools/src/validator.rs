//! Recursive structural validation of argument values against
//! [`ParameterSchema`]s.
//!
//! Data mismatches produce [`OrbitError::Validation`] naming the offending
//! path (`$.route[1].token`). A schema that cannot be evaluated (unknown
//! `type`, uncompilable `pattern`) produces [`OrbitError::Config`] instead.
//! The first mismatch ends validation.

use crate::schema::{ParameterSchema, ToolSchema};
use orbit_core::{OrbitError, OrbitResult};
use parking_lot::RwLock;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::warn;

/// Validate a tool's top-level argument bundle.
pub fn validate_args(args: &Value, schema: &ToolSchema) -> OrbitResult<()> {
    validate_at(args, &schema.parameters, "$")
}

/// Validate `value` against `schema`.
pub fn validate(value: &Value, schema: &ParameterSchema) -> OrbitResult<()> {
    validate_at(value, schema, "$")
}

/// Walk a schema and report the first configuration problem, without any data.
pub fn check_schema(schema: &ParameterSchema) -> OrbitResult<()> {
    check_at(schema, "$")
}

fn check_at(schema: &ParameterSchema, path: &str) -> OrbitResult<()> {
    match schema.kind.as_str() {
        "string" => {
            if let Some(pattern) = &schema.pattern {
                compile_pattern(pattern, path)?;
            }
            Ok(())
        }
        "number" | "boolean" => Ok(()),
        "array" => match &schema.items {
            Some(items) => check_at(items, &format!("{path}[]")),
            None => Ok(()),
        },
        "object" => {
            for (name, sub) in &schema.properties {
                check_at(sub, &format!("{path}.{name}"))?;
            }
            Ok(())
        }
        other => Err(unknown_type(other, path)),
    }
}

fn validate_at(value: &Value, schema: &ParameterSchema, path: &str) -> OrbitResult<()> {
    match schema.kind.as_str() {
        "string" => {
            let s = value
                .as_str()
                .ok_or_else(|| mismatch(path, "string", value))?;
            if let Some(pattern) = &schema.pattern {
                if !compile_pattern(pattern, path)?.is_match(s) {
                    return Err(OrbitError::Validation(format!(
                        "{path}: '{s}' does not match pattern '{pattern}'"
                    )));
                }
            }
            if let Some(allowed) = &schema.allowed {
                if !allowed.iter().any(|a| a == s) {
                    return Err(OrbitError::Validation(format!(
                        "{path}: '{s}' is not one of {allowed:?}"
                    )));
                }
            }
            Ok(())
        }
        "number" => {
            let n = value
                .as_f64()
                .ok_or_else(|| mismatch(path, "number", value))?;
            if let Some(min) = schema.minimum {
                if n < min {
                    return Err(OrbitError::Validation(format!(
                        "{path}: {n} is below minimum {min}"
                    )));
                }
            }
            if let Some(max) = schema.maximum {
                if n > max {
                    return Err(OrbitError::Validation(format!(
                        "{path}: {n} is above maximum {max}"
                    )));
                }
            }
            Ok(())
        }
        "boolean" => {
            if value.is_boolean() {
                Ok(())
            } else {
                Err(mismatch(path, "boolean", value))
            }
        }
        "array" => {
            let elements = value
                .as_array()
                .ok_or_else(|| mismatch(path, "array", value))?;
            if let Some(items) = &schema.items {
                for (i, element) in elements.iter().enumerate() {
                    validate_at(element, items, &format!("{path}[{i}]"))?;
                }
            }
            Ok(())
        }
        "object" => {
            let fields = value
                .as_object()
                .ok_or_else(|| mismatch(path, "object", value))?;
            for name in &schema.required {
                if !fields.contains_key(name) {
                    return Err(OrbitError::Validation(format!(
                        "{path}: missing required property '{name}'"
                    )));
                }
            }
            for (name, field) in fields {
                match schema.properties.get(name) {
                    Some(sub) => validate_at(field, sub, &format!("{path}.{name}"))?,
                    None => warn!(path = %path, property = %name, "Unknown parameter"),
                }
            }
            Ok(())
        }
        other => Err(unknown_type(other, path)),
    }
}

/// Compiled, anchored patterns keyed by their source text.
static PATTERNS: LazyLock<RwLock<HashMap<String, Regex>>> = LazyLock::new(Default::default);

/// Patterns must match the whole value, so the user pattern is anchored.
/// Each distinct pattern is compiled once per process.
fn compile_pattern(pattern: &str, path: &str) -> OrbitResult<Regex> {
    if let Some(re) = PATTERNS.read().get(pattern) {
        return Ok(re.clone());
    }
    let re = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
        OrbitError::Config(format!("{path}: invalid pattern '{pattern}': {e}"))
    })?;
    PATTERNS.write().insert(pattern.to_string(), re.clone());
    Ok(re)
}

#[cfg(test)]
pub(crate) fn is_pattern_cached(pattern: &str) -> bool {
    PATTERNS.read().contains_key(pattern)
}

fn unknown_type(kind: &str, path: &str) -> OrbitError {
    OrbitError::Config(format!("{path}: unsupported schema type '{kind}'"))
}

fn mismatch(path: &str, expected: &str, value: &Value) -> OrbitError {
    OrbitError::Validation(format!(
        "{path}: expected {expected}, got {}",
        json_type_name(value)
    ))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
