//! Restaurant API Library
//!
//! Shared request guard for the kitchen and booking applications: roles and
//! per-module permissions, CSRF tokens, fixed-window rate limiting, and the
//! routes built on top of them.

pub mod auth;
pub mod backend;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod mail;
pub mod observability;
pub mod security;

pub use config::schema::ApiConfig;
pub use http::{ApiServer, Services};
pub use lifecycle::Shutdown;
