//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows and lifetimes within bounds,
//!   probabilities in [0, 1])
//! - Check that hosted mode carries the keys it needs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ApiConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{ApiConfig, BackendMode};

/// Minimum length of a configured CSRF secret.
pub const MIN_CSRF_SECRET_LEN: usize = 32;

/// Longest accepted rate-limit window.
pub const MAX_WINDOW_SECS: u64 = 24 * 60 * 60;

/// Longest accepted invitation lifetime.
pub const MAX_INVITATION_TTL_SECS: u64 = 90 * 24 * 60 * 60;

/// Longest accepted CSRF token lifetime.
pub const MAX_CSRF_AGE_SECS: u64 = 7 * 24 * 60 * 60;

/// Push an error unless `value` lies in `1..=max`.
fn check_range(errors: &mut Vec<ValidationError>, field: impl Into<String>, value: u64, max: u64) {
    if value == 0 {
        errors.push(ValidationError::new(field, "must be > 0"));
    } else if value > max {
        errors.push(ValidationError::new(field, format!("must be <= {}", max)));
    }
}

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &ApiConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            "must be a socket address",
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }
    if config.timeouts.backend_secs == 0 {
        errors.push(ValidationError::new("timeouts.backend_secs", "must be > 0"));
    }

    if config.backend.mode == BackendMode::Hosted {
        if url::Url::parse(&config.backend.url).is_err() {
            errors.push(ValidationError::new("backend.url", "must be an absolute URL"));
        }
        if config.backend.anon_key.is_empty() {
            errors.push(ValidationError::new("backend.anon_key", "required in hosted mode"));
        }
        if config.backend.service_key.is_empty() {
            errors.push(ValidationError::new(
                "backend.service_key",
                "required in hosted mode",
            ));
        }
    }

    if !config.csrf.secret.is_empty() && config.csrf.secret.len() < MIN_CSRF_SECRET_LEN {
        errors.push(ValidationError::new(
            "csrf.secret",
            format!("must be at least {} bytes", MIN_CSRF_SECRET_LEN),
        ));
    }
    check_range(
        &mut errors,
        "csrf.max_age_secs",
        config.csrf.max_age_secs,
        MAX_CSRF_AGE_SECS,
    );

    let rl = &config.rate_limit;
    if rl.max_requests == 0 {
        errors.push(ValidationError::new("rate_limit.max_requests", "must be > 0"));
    }
    check_range(&mut errors, "rate_limit.window_secs", rl.window_secs, MAX_WINDOW_SECS);
    if !(0.0..=1.0).contains(&rl.cleanup_probability) {
        errors.push(ValidationError::new(
            "rate_limit.cleanup_probability",
            "must be within [0, 1]",
        ));
    }
    for (i, rule) in rl.rules.iter().enumerate() {
        let field = |name: &str| format!("rate_limit.rules[{}].{}", i, name);
        if rule.name.is_empty() {
            errors.push(ValidationError::new(field("name"), "must not be empty"));
        }
        if !rule.path_prefix.starts_with('/') {
            errors.push(ValidationError::new(field("path_prefix"), "must start with '/'"));
        }
        if rule.max_requests == 0 {
            errors.push(ValidationError::new(field("max_requests"), "must be > 0"));
        }
        check_range(&mut errors, field("window_secs"), rule.window_secs, MAX_WINDOW_SECS);
    }

    check_range(
        &mut errors,
        "invitations.ttl_secs",
        config.invitations.ttl_secs,
        MAX_INVITATION_TTL_SECS,
    );
    if url::Url::parse(&config.invitations.app_url).is_err() {
        errors.push(ValidationError::new("invitations.app_url", "must be an absolute URL"));
    }

    if !config.mail.api_key.is_empty() && url::Url::parse(&config.mail.api_url).is_err() {
        errors.push(ValidationError::new("mail.api_url", "must be an absolute URL"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "must be a socket address",
        ));
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be > 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RouteLimitConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ApiConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ApiConfig::default();
        config.rate_limit.window_secs = 0;
        config.rate_limit.cleanup_probability = 1.5;
        config.csrf.secret = "short".to_string();
        config.rate_limit.rules.push(RouteLimitConfig {
            name: String::new(),
            path_prefix: "api".to_string(),
            max_requests: 0,
            window_secs: 1,
        });

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"rate_limit.window_secs"));
        assert!(fields.contains(&"rate_limit.cleanup_probability"));
        assert!(fields.contains(&"csrf.secret"));
        assert!(fields.contains(&"rate_limit.rules[2].name"));
        assert!(fields.contains(&"rate_limit.rules[2].path_prefix"));
        assert!(fields.contains(&"rate_limit.rules[2].max_requests"));
        assert_eq!(errors.len(), 6);
    }

    #[test]
    fn test_hosted_mode_requires_keys() {
        let mut config = ApiConfig::default();
        config.backend.mode = BackendMode::Hosted;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "backend.anon_key");
        assert_eq!(errors[1].field, "backend.service_key");
    }

    #[test]
    fn test_rejects_oversized_durations() {
        let mut config = ApiConfig::default();
        config.rate_limit.window_secs = u64::MAX;
        config.rate_limit.rules[0].window_secs = MAX_WINDOW_SECS + 1;
        config.invitations.ttl_secs = u64::MAX;
        config.csrf.max_age_secs = u64::MAX;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "csrf.max_age_secs",
                "rate_limit.window_secs",
                "rate_limit.rules[0].window_secs",
                "invitations.ttl_secs",
            ]
        );
        assert_eq!(errors[1].message, format!("must be <= {}", MAX_WINDOW_SECS));
    }

    #[test]
    fn test_upper_bounds_are_inclusive() {
        let mut config = ApiConfig::default();
        config.rate_limit.window_secs = MAX_WINDOW_SECS;
        config.invitations.ttl_secs = MAX_INVITATION_TTL_SECS;
        config.csrf.max_age_secs = MAX_CSRF_AGE_SECS;
        assert!(validate_config(&config).is_ok());
    }
}
