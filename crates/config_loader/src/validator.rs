//! Config validation module
//!
//! Rules:
//! - field constraints declared on the contract types (`validator` derive)
//! - backend base_url uses http or https
//! - sink names are unique

use std::collections::HashSet;

use contracts::{ContractError, MonitorConfig};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// Validate a MonitorConfig
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &MonitorConfig) -> Result<(), ContractError> {
    validate_fields(config)?;
    validate_backend_scheme(config)?;
    validate_sink_names(config)?;
    Ok(())
}

/// Declarative field constraints
fn validate_fields(config: &MonitorConfig) -> Result<(), ContractError> {
    match config.validate() {
        Ok(()) => Ok(()),
        Err(errors) => {
            let (field, message) = first_violation(&errors, "")
                .unwrap_or_else(|| ("config".to_string(), errors.to_string()));
            Err(ContractError::config_validation(field, message))
        }
    }
}

/// Walk nested validation errors depth-first, in field-name order
fn first_violation(errors: &ValidationErrors, prefix: &str) -> Option<(String, String)> {
    let mut entries: Vec<_> = errors.errors().iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    for (field, kind) in entries {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                if let Some(error) = field_errors.first() {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("failed '{}' check", error.code));
                    return Some((path, message));
                }
            }
            ValidationErrorsKind::Struct(inner) => {
                if let Some(found) = first_violation(inner, &path) {
                    return Some(found);
                }
            }
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    if let Some(found) = first_violation(inner, &format!("{path}[{index}]")) {
                        return Some(found);
                    }
                }
            }
        }
    }
    None
}

/// The gateway only speaks HTTP
fn validate_backend_scheme(config: &MonitorConfig) -> Result<(), ContractError> {
    let url = config.backend.base_url.to_ascii_lowercase();
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ContractError::config_validation(
            "backend.base_url",
            format!("expected an http(s) URL, got '{}'", config.backend.base_url),
        ))
    }
}

/// Sink names are used as metric labels and must be unique
fn validate_sink_names(config: &MonitorConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for sink in &config.sinks {
        if !seen.insert(&sink.name) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
    }
    Ok(())
}
