//! Rule compilation.
//!
//! Configured [`OverrideRule`]s are turned into typed [`CompiledRule`]s once,
//! at construction. Everything that can be checked without a response is
//! checked here; all problems are reported together.

use axum::body::Bytes;
use axum::http::{HeaderName, HeaderValue, StatusCode};

use crate::config::schema::{BodyMode, OverrideConfig, OverrideRule};
use crate::config::validation::ValidationError;

/// An override rule with parsed status codes and headers.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub(crate) from: Vec<StatusCode>,
    pub(crate) to: StatusCode,
    pub(crate) set_headers: Vec<(HeaderName, Vec<HeaderValue>)>,
    pub(crate) remove_headers: Vec<HeaderName>,
    pub(crate) body: Bytes,
    pub(crate) mode: BodyMode,
}

impl CompiledRule {
    /// Compile rule number `index` (zero based, reported one based).
    pub fn compile(index: usize, rule: &OverrideRule) -> Result<Self, Vec<ValidationError>> {
        let number = index + 1;
        let mut errors = Vec::new();

        if rule.from.is_empty() {
            errors.push(ValidationError::EmptyMatchSet { rule: number });
        }

        let mut from = Vec::with_capacity(rule.from.len());
        for &code in &rule.from {
            match status(number, code) {
                Ok(status) => from.push(status),
                Err(e) => errors.push(e),
            }
        }

        let to = status(number, rule.to).map_err(|e| errors.push(e)).ok();

        let mut remove_headers = Vec::with_capacity(rule.remove_headers.len());
        for name in &rule.remove_headers {
            match header_name(number, name) {
                Ok(name) => remove_headers.push(name),
                Err(e) => errors.push(e),
            }
        }

        let mut set_headers = Vec::with_capacity(rule.headers.len());
        for (name, values) in &rule.headers {
            let parsed_name = match header_name(number, name) {
                Ok(name) => name,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };

            let mut parsed_values = Vec::with_capacity(values.len());
            for value in values {
                match HeaderValue::from_str(value) {
                    Ok(value) => parsed_values.push(value),
                    Err(_) => errors.push(ValidationError::InvalidHeaderValue {
                        rule: number,
                        name: name.clone(),
                    }),
                }
            }
            set_headers.push((parsed_name, parsed_values));
        }

        match to {
            Some(to) if errors.is_empty() => Ok(Self {
                from,
                to,
                set_headers,
                remove_headers,
                body: Bytes::copy_from_slice(rule.body.as_bytes()),
                mode: rule.mode.clone(),
            }),
            _ => Err(errors),
        }
    }

    /// Whether this rule fires for a response that started with `status`.
    pub fn matches(&self, status: StatusCode) -> bool {
        self.from.contains(&status)
    }

    pub fn target(&self) -> StatusCode {
        self.to
    }

    pub fn mode(&self) -> &BodyMode {
        &self.mode
    }
}

/// Compile every rule of an override set, collecting all errors.
///
/// The instance name is checked too, since it becomes the marker header value.
pub fn compile_rules(config: &OverrideConfig) -> Result<Vec<CompiledRule>, Vec<ValidationError>> {
    let mut errors = Vec::new();
    if let Err(e) = instance_marker(&config.name) {
        errors.push(e);
    }

    if config.overrides.is_empty() {
        errors.push(ValidationError::NoOverrides);
        return Err(errors);
    }

    let mut rules = Vec::with_capacity(config.overrides.len());
    for (index, rule) in config.overrides.iter().enumerate() {
        match CompiledRule::compile(index, rule) {
            Ok(rule) => rules.push(rule),
            Err(rule_errors) => errors.extend(rule_errors),
        }
    }

    if errors.is_empty() {
        Ok(rules)
    } else {
        Err(errors)
    }
}

/// Parse an instance name into the value of the diagnostic marker header.
pub fn instance_marker(name: &str) -> Result<HeaderValue, ValidationError> {
    HeaderValue::from_str(name).map_err(|_| ValidationError::InvalidInstanceName {
        name: name.to_string(),
    })
}

fn status(rule: usize, code: u16) -> Result<StatusCode, ValidationError> {
    StatusCode::from_u16(code).map_err(|_| ValidationError::InvalidStatus { rule, code })
}

fn header_name(rule: usize, name: &str) -> Result<HeaderName, ValidationError> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|_| ValidationError::InvalidHeaderName {
        rule,
        name: name.to_string(),
    })
}
