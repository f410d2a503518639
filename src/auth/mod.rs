//! Authorization subsystem.
//!
//! # Data Flow
//! ```text
//! handler
//!     → pipeline.rs (bearer token → user → member → requirement)
//!     → roles.rs (role ranks, module/action grants)
//!     → AuthContext or typed ApiError (401/403/404/500)
//! ```
//!
//! # Design Decisions
//! - Fail closed: a missing grant is a deny
//! - Owner implicitly holds every permission
//! - Handlers call the guard first and act only on success

pub mod pipeline;
pub mod roles;

pub use pipeline::{bearer_token, AuthContext, Guard, Requirement};
pub use roles::{Action, Member, Permissions, Role, TenantId, UserId};
