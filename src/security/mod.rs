//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (fixed window per client and rule)     429
//!     → csrf.rs (signed token on mutating verbs)              403
//!     → handler (auth::pipeline)
//!     → headers.rs (security response headers)
//! ```
//!
//! # Design Decisions
//! - Defense in depth: multiple layers of protection
//! - Fail closed: reject on any security check failure
//! - No trust in client input; X-Forwarded-For only when configured

pub mod csrf;
pub mod headers;
pub mod rate_limit;

pub use csrf::{CsrfError, CsrfSigner, CSRF_HEADER};
pub use rate_limit::{FixedWindowLimiter, RateLimitDecision, RateLimitRule};
