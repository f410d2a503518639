//! Authorize-then-act pipeline.
//!
//! ```text
//! Authorization: Bearer <token>
//!     → IdentityProvider::user_for_token      401 / 500
//!     → MemberStore::find_member(tenant)      404 / 500
//!     → Requirement::check(member)            403
//!     → AuthContext handed to the handler
//! ```
//!
//! A caller without membership gets 404 rather than 403 so that probing
//! tenant ids reveals nothing.

use std::sync::Arc;

use axum::http::{header::AUTHORIZATION, HeaderMap};

use crate::auth::roles::{Action, Member, Role, TenantId};
use crate::backend::{IdentityProvider, MemberStore, UserIdentity};
use crate::http::error::ApiError;
use crate::observability::metrics;

/// What a route demands of the caller's membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// Any membership in the tenant.
    Member,
    /// A specific module grant.
    Permission { module: &'static str, action: Action },
    /// One of the listed roles.
    AnyRole(&'static [Role]),
    /// The given role or above.
    MinRole(Role),
}

impl Requirement {
    pub fn permission(module: &'static str, action: Action) -> Self {
        Requirement::Permission { module, action }
    }

    /// `Ok(())` if the member satisfies this requirement.
    pub fn check(&self, member: &Member) -> Result<(), ApiError> {
        let allowed = match self {
            Requirement::Member => true,
            Requirement::Permission { module, action } => member.can(module, *action),
            Requirement::AnyRole(roles) => roles.contains(&member.role),
            Requirement::MinRole(min) => member.role.at_least(*min),
        };
        if allowed {
            Ok(())
        } else {
            Err(ApiError::Forbidden(self.denial_message()))
        }
    }

    fn denial_message(&self) -> String {
        match self {
            Requirement::Member => "Membership required".to_string(),
            Requirement::Permission { module, action } => {
                format!("Missing permission: {} {}", action, module)
            }
            Requirement::AnyRole(roles) => {
                let names: Vec<&str> = roles.iter().map(|r| r.as_str()).collect();
                format!("Requires role: {}", names.join(" or "))
            }
            Requirement::MinRole(min) => format!("Requires role {} or above", min),
        }
    }
}

/// Outcome of a successful authorization.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: UserIdentity,
    pub member: Member,
}

/// Extract the bearer token from request headers.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Shared guard used by every tenant-scoped handler.
#[derive(Clone)]
pub struct Guard {
    identity: Arc<dyn IdentityProvider>,
    members: Arc<dyn MemberStore>,
}

impl Guard {
    pub fn new(identity: Arc<dyn IdentityProvider>, members: Arc<dyn MemberStore>) -> Self {
        Self { identity, members }
    }

    /// Resolve the caller from the `Authorization` header.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<UserIdentity, ApiError> {
        let Some(token) = bearer_token(headers) else {
            tracing::warn!("Missing or malformed authorization header");
            metrics::record_auth_rejection("missing_token");
            return Err(ApiError::Unauthorized(
                "Missing or invalid authorization header".to_string(),
            ));
        };

        match self.identity.user_for_token(token).await? {
            Some(user) => Ok(user),
            None => {
                tracing::warn!("Bearer token rejected by identity provider");
                metrics::record_auth_rejection("invalid_token");
                Err(ApiError::Unauthorized("Invalid or expired session".to_string()))
            }
        }
    }

    /// Authenticate, load the caller's membership in `tenant` and check
    /// `requirement`.
    pub async fn authorize(
        &self,
        headers: &HeaderMap,
        tenant: TenantId,
        requirement: Requirement,
    ) -> Result<AuthContext, ApiError> {
        let user = self.authenticate(headers).await?;

        let Some(member) = self.members.find_member(tenant, user.id).await? else {
            tracing::warn!(user_id = %user.id, tenant_id = %tenant, "Caller is not a member");
            metrics::record_auth_rejection("not_member");
            return Err(ApiError::NotFound("Restaurant not found".to_string()));
        };

        if let Err(e) = requirement.check(&member) {
            tracing::warn!(
                user_id = %user.id,
                tenant_id = %tenant,
                role = %member.role,
                requirement = ?requirement,
                "Authorization denied"
            );
            metrics::record_auth_rejection("forbidden");
            return Err(e);
        }

        tracing::debug!(user_id = %user.id, tenant_id = %tenant, role = %member.role, "Authorized");
        Ok(AuthContext { user, member })
    }
}
