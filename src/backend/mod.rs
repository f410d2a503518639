//! Hosted backend subsystem: identity, memberships and invitations.
//!
//! # Data Flow
//! ```text
//! bearer token
//!     → IdentityProvider (who is calling?)
//!     → MemberStore (what is their role in this restaurant?)
//!     → InvitationStore (staff onboarding)
//! ```
//!
//! # Design Decisions
//! - The data store and session issuance live outside this process; only
//!   the traits below are relied on by the guard pipeline
//! - `hosted.rs` talks to the hosted backend over HTTP
//! - `memory.rs` backs tests and local development
//! - A lookup that finds nothing is `Ok(None)`, never an error

pub mod hosted;
pub mod memory;

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::roles::{Member, Permissions, Role, TenantId, UserId};

pub use hosted::HostedBackend;
pub use memory::MemoryBackend;

/// Errors raised by backend calls.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport failure or timeout reaching the backend.
    #[error("backend request failed: {0}")]
    Transport(String),

    /// The backend answered with an unexpected status.
    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The backend answered with a body we could not decode.
    #[error("invalid backend response: {0}")]
    Decode(String),

    /// A write conflicted with existing data (e.g., duplicate membership).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A write targeted a record that does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BackendError::Decode(e.to_string())
        } else {
            BackendError::Transport(e.to_string())
        }
    }
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Current time in unix seconds, the unit of every stored timestamp.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Authenticated user as reported by the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
}

/// Pending or accepted staff invitation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    pub id: Uuid,
    #[serde(rename = "restaurant_id")]
    pub tenant_id: TenantId,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub permissions: Permissions,
    pub token: String,
    pub invited_by: UserId,
    /// Unix seconds.
    pub created_at: u64,
    /// Unix seconds.
    pub expires_at: u64,
    /// Unix seconds; set once accepted.
    #[serde(default)]
    pub accepted_at: Option<u64>,
}

impl Invitation {
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted_at.is_some()
    }
}

/// Resolves bearer tokens to users.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `Ok(None)` means the token is unknown, expired or revoked.
    async fn user_for_token(&self, token: &str) -> BackendResult<Option<UserIdentity>>;
}

/// Restaurant membership lookups and updates.
#[async_trait]
pub trait MemberStore: Send + Sync {
    async fn find_member(&self, tenant: TenantId, user: UserId) -> BackendResult<Option<Member>>;

    async fn list_members(&self, tenant: TenantId) -> BackendResult<Vec<Member>>;

    /// Replace role and permissions; `Ok(None)` if the member does not exist.
    async fn update_member(
        &self,
        tenant: TenantId,
        user: UserId,
        role: Role,
        permissions: Permissions,
    ) -> BackendResult<Option<Member>>;
}

/// Staff invitation persistence.
#[async_trait]
pub trait InvitationStore: Send + Sync {
    async fn create_invitation(&self, invitation: Invitation) -> BackendResult<Invitation>;

    async fn find_invitation(&self, token: &str) -> BackendResult<Option<Invitation>>;

    /// Create the membership for `user` and mark the invitation accepted.
    /// Fails with [`BackendError::Conflict`] if the user is already a member.
    async fn accept_invitation(
        &self,
        invitation: &Invitation,
        user: &UserIdentity,
        accepted_at: u64,
    ) -> BackendResult<Member>;
}
