//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and value ranges
//! - Compile-check override rules (status codes, header names and values)
//! - Check the instance name can be sent as the marker header value
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system
//! - Body modes are checked when a rule fires, not here

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::rewrite::rule::compile_rules;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("at least one override rule is required")]
    NoOverrides,

    #[error("instance name {name:?} is not a valid header value")]
    InvalidInstanceName { name: String },

    #[error("override #{rule}: `from` must list at least one status code")]
    EmptyMatchSet { rule: usize },

    #[error("override #{rule}: invalid status code {code}")]
    InvalidStatus { rule: usize, code: u16 },

    #[error("override #{rule}: invalid header name {name:?}")]
    InvalidHeaderName { rule: usize, name: String },

    #[error("override #{rule}: invalid value for header {name:?}")]
    InvalidHeaderValue { rule: usize, name: String },

    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroRequestTimeout,
}

/// Validate the whole proxy configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    check_address(&mut errors, "upstream.address", &config.upstream.address);

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    if let Err(rule_errors) = compile_rules(&config.response_override) {
        errors.extend(rule_errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
