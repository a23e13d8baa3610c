//! Parameter validation and normalization before a command leaves the bridge.
//!
//! `validate_and_convert` runs the schema checks for one `(tool, action)`,
//! converts geometry parameters to their canonical form, then hands the
//! result to the tool's hook. The string/path helpers below are shared by
//! the hooks in `tools`.

use crate::error::ValidationError;
use crate::schema::{value_type_name, ToolSchema};
use serde_json::{Map, Value};

/// Validate `params` for `action` of `tool` and return a normalized copy.
///
/// Unknown actions skip the required-parameter checks but still get their
/// geometry parameters converted and still go through the hook.
pub fn validate_and_convert(
    tool: &ToolSchema,
    action: &str,
    params: &Map<String, Value>,
) -> Result<Map<String, Value>, ValidationError> {
    let mut normalized = params.clone();

    if let Some(schema) = tool.find_action(action) {
        for (name, expected) in &schema.required {
            let value = normalized.get(*name).ok_or_else(|| {
                ValidationError::for_param(
                    *name,
                    format!("{} '{}' requires '{}'", tool.name, action, name),
                )
            })?;
            if value.is_null() {
                continue;
            }
            if !expected.matches(value) {
                return Err(ValidationError::for_param(
                    *name,
                    format!(
                        "Parameter '{}' for {} '{}' must be {}, got {}",
                        name,
                        tool.name,
                        action,
                        expected.name(),
                        value_type_name(value)
                    ),
                ));
            }
        }
    } else {
        log::debug!(
            "No schema for {} '{}', skipping required-parameter checks",
            tool.name,
            action
        );
    }

    for (name, kind) in &tool.geometry {
        if let Some(value) = normalized.get_mut(*name) {
            if value.is_null() {
                continue;
            }
            *value = kind.convert(value, name)?;
        }
    }

    if let Some(hook) = tool.hook {
        hook(action, &normalized)?;
    }

    Ok(normalized)
}

/// Validate an object name: 1-128 chars, no path separators or control characters.
pub fn validate_object_name(param: &str, name: &str) -> Result<(), ValidationError> {
    let len = name.chars().count();
    if name.trim().is_empty() || len > 128 {
        return Err(ValidationError::for_param(
            param,
            format!("Parameter '{param}' must be 1-128 characters, got {len}"),
        ));
    }
    if name.chars().any(|c| c.is_control() || c == '/' || c == '\\') {
        return Err(ValidationError::for_param(
            param,
            format!("Parameter '{param}' may not contain slashes or control characters"),
        ));
    }
    Ok(())
}

/// Validate a project asset path: `Assets/...`, forward slashes, no `..`
/// segments, and the given extension when one is required.
pub fn validate_asset_path(
    param: &str,
    path: &str,
    extension: Option<&str>,
) -> Result<(), ValidationError> {
    if path.len() > 512 {
        return Err(ValidationError::for_param(
            param,
            format!("Parameter '{param}' must be at most 512 characters"),
        ));
    }
    if path.contains('\\') {
        return Err(ValidationError::for_param(
            param,
            format!("Parameter '{param}' must use forward slashes: {path}"),
        ));
    }
    if !path.starts_with("Assets/") {
        return Err(ValidationError::for_param(
            param,
            format!("Parameter '{param}' must start with 'Assets/': {path}"),
        ));
    }
    if path.split('/').any(|segment| segment == "..") {
        return Err(ValidationError::for_param(
            param,
            format!("Parameter '{param}' must not contain '..' segments: {path}"),
        ));
    }
    if let Some(ext) = extension {
        if !path.ends_with(ext) || path.len() == "Assets/".len() + ext.len() {
            return Err(ValidationError::for_param(
                param,
                format!("Parameter '{param}' must name a '{ext}' file: {path}"),
            ));
        }
    }
    Ok(())
}

/// Validate enum membership of a string parameter.
pub fn validate_one_of(param: &str, value: &str, allowed: &[&str]) -> Result<(), ValidationError> {
    if allowed.contains(&value) {
        return Ok(());
    }
    Err(ValidationError::for_param(
        param,
        format!(
            "Parameter '{param}' must be one of {}, got '{value}'",
            allowed.join(", ")
        ),
    ))
}

/// Validate a unit-interval number (anchors, pivots, normalized values).
pub fn validate_unit_range(param: &str, field: &str, value: f64) -> Result<(), ValidationError> {
    if (0.0..=1.0).contains(&value) {
        return Ok(());
    }
    Err(ValidationError::for_param(
        param,
        format!("Parameter '{param}' field '{field}' must be between 0.0 and 1.0, got {value}"),
    ))
}
