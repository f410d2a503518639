//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the API.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the restaurant API.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ApiConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Hosted backend (data store + auth) settings.
    pub backend: BackendConfig,

    /// CSRF token settings.
    pub csrf: CsrfConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Staff invitation settings.
    pub invitations: InvitationConfig,

    /// Outbound email settings.
    pub mail: MailConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Security hardening settings.
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Timeout for calls to the hosted backend in seconds.
    pub backend_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            backend_secs: 10,
        }
    }
}

/// Which backend implementation serves identity and tenant data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// Hosted backend-as-a-service reached over HTTP.
    Hosted,
    /// Process-local store. Development and tests only.
    Memory,
}

/// Hosted backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    pub mode: BackendMode,

    /// Base URL of the hosted project (e.g., "https://xyz.example.co").
    pub url: String,

    /// Public (anon) key sent as `apikey` on auth calls.
    pub anon_key: String,

    /// Service-role key used for data access.
    pub service_key: String,

    /// Table holding restaurant memberships.
    pub members_table: String,

    /// Table holding pending invitations.
    pub invitations_table: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            mode: BackendMode::Memory,
            url: "http://localhost:54321".to_string(),
            anon_key: String::new(),
            service_key: String::new(),
            members_table: "restaurant_members".to_string(),
            invitations_table: "restaurant_invitations".to_string(),
        }
    }
}

/// CSRF protection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// Enable CSRF verification on mutating requests.
    pub enabled: bool,

    /// HMAC secret. Empty means a random secret is generated per process.
    pub secret: String,

    /// Token lifetime in seconds.
    pub max_age_secs: u64,

    /// Path prefixes that skip verification (e.g., inbound webhooks).
    pub exempt_prefixes: Vec<String>,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            secret: String::new(),
            max_age_secs: 2 * 60 * 60,
            exempt_prefixes: vec!["/api/webhooks".to_string()],
        }
    }
}

/// A named fixed-window limit applied to requests under a path prefix.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteLimitConfig {
    /// Rule identifier for logging/metrics and the limiter key.
    pub name: String,

    /// Path prefix to match.
    pub path_prefix: String,

    /// Requests allowed per window.
    pub max_requests: u32,

    /// Window length in seconds.
    pub window_secs: u64,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Requests allowed per window when no route rule matches.
    pub max_requests: u32,

    /// Default window length in seconds.
    pub window_secs: u64,

    /// Route-specific rules, checked in order; first prefix match wins.
    pub rules: Vec<RouteLimitConfig>,

    /// Chance per check of sweeping expired windows.
    pub cleanup_probability: f64,

    /// Key clients by the first `X-Forwarded-For` entry instead of the peer IP.
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 120,
            window_secs: 60,
            rules: vec![
                RouteLimitConfig {
                    name: "invitations".to_string(),
                    path_prefix: "/api/invitations".to_string(),
                    max_requests: 10,
                    window_secs: 60,
                },
                RouteLimitConfig {
                    name: "csrf".to_string(),
                    path_prefix: "/api/csrf-token".to_string(),
                    max_requests: 30,
                    window_secs: 60,
                },
            ],
            cleanup_probability: 0.01,
            trust_forwarded_for: false,
        }
    }
}

/// Staff invitation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InvitationConfig {
    /// Invitation lifetime in seconds.
    pub ttl_secs: u64,

    /// Public application URL used to build accept links.
    pub app_url: String,
}

impl Default for InvitationConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 7 * 24 * 60 * 60,
            app_url: "http://localhost:3000".to_string(),
        }
    }
}

/// Outbound email configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MailConfig {
    /// Transactional email API endpoint.
    pub api_url: String,

    /// API key. Empty means emails are only logged.
    pub api_key: String,

    /// Sender address.
    pub from: String,

    /// Fixed pause between consecutive sends in milliseconds.
    pub send_delay_ms: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.resend.com/emails".to_string(),
            api_key: String::new(),
            from: "Restaurant <noreply@localhost>".to_string(),
            send_delay_ms: 600,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security response headers.
    pub enable_headers: bool,
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            max_body_size: 256 * 1024,
        }
    }
}
