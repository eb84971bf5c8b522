//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (the canonical domain is routed)
//! - Validate value shapes (bind addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function over the deserialized config
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{DirectoryConfig, ServerConfig};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address {value:?} is not a socket address")]
    BindAddress { value: String },

    #[error("observability.metrics_address {value:?} is not a socket address")]
    MetricsAddress { value: String },

    #[error("management.domains must not be empty")]
    NoManagementDomains,

    #[error("domains must not be empty")]
    NoDomains,

    #[error("domain entries must not be blank")]
    BlankDomain,

    #[error("static.domain {domain:?} is not listed in domains")]
    CanonicalNotRouted { domain: String },

    #[error("endpoint names must not be blank")]
    BlankEndpoint,
}

/// Check a server configuration, collecting every problem found.
pub fn validate_server(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress {
            value: config.listener.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress {
            value: config.observability.metrics_address.clone(),
        });
    }
    if config.management.domains.is_empty() {
        errors.push(ValidationError::NoManagementDomains);
    }
    if config.management.domains.iter().any(|d| d.trim().is_empty()) {
        errors.push(ValidationError::BlankDomain);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check one tenant configuration, collecting every problem found.
pub fn validate_directory(config: &DirectoryConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.domains.is_empty() {
        errors.push(ValidationError::NoDomains);
    }
    if config.domains.iter().any(|d| d.trim().is_empty()) {
        errors.push(ValidationError::BlankDomain);
    }
    if config.endpoints.iter().any(|e| e.trim().is_empty()) {
        errors.push(ValidationError::BlankEndpoint);
    }
    if let Some(site) = &config.static_site {
        if !config.domains.iter().any(|d| d == &site.domain) {
            errors.push(ValidationError::CanonicalNotRouted {
                domain: site.domain.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
