//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ApiConfig (validated, immutable)
//!     → shared via ArcSwap to middleware and handlers
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of Arc<ApiConfig>
//!     → next request observes new limits and CSRF exemptions
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Listener, backend and mail settings are read once at startup

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ApiConfig, BackendConfig, BackendMode, CsrfConfig, InvitationConfig, ListenerConfig,
    LogFormat, MailConfig, ObservabilityConfig, RateLimitConfig, RouteLimitConfig,
    SecurityConfig, TimeoutConfig,
};
