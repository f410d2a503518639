//! Staff invitations: create (and email) an invite, accept it.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::roles::TEAM_MODULE;
use crate::auth::{Action, Permissions, Requirement, Role, TenantId};
use crate::backend::{unix_now, BackendError, Invitation};
use crate::http::error::ApiError;
use crate::http::handlers::members::MemberView;
use crate::http::handlers::{json_body, parse_id};
use crate::http::server::AppState;
use crate::mail::templates;

const TOKEN_BYTES: usize = 32;
const SECS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Debug, Deserialize)]
pub struct CreateInvitationRequest {
    pub email: String,
    pub role: String,
    #[serde(default)]
    pub permissions: Option<Permissions>,
}

/// Invitation as returned to the inviter. The token only travels by email.
#[derive(Debug, Serialize)]
pub struct InvitationView {
    pub id: Uuid,
    pub restaurant_id: TenantId,
    pub email: String,
    pub role: Role,
    pub expires_at: u64,
}

/// Loose address check: one `@`, something on both sides, a dot in the
/// domain, no whitespace.
fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

fn generate_token() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::thread_rng().gen();
    hex::encode(bytes)
}

/// `POST /api/restaurants/{tenant_id}/invitations`
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(tenant_id): Path<String>,
    payload: Result<Json<CreateInvitationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<InvitationView>), ApiError> {
    let tenant: TenantId = parse_id(&tenant_id, "restaurant id")?;
    let ctx = state
        .guard
        .authorize(&headers, tenant, Requirement::permission(TEAM_MODULE, Action::Create))
        .await?;

    let body = json_body(payload)?;
    let email = body.email.trim().to_lowercase();
    if !is_plausible_email(&email) {
        return Err(ApiError::BadRequest("Invalid email address".to_string()));
    }
    let role: Role = body
        .role
        .parse()
        .map_err(|e: crate::auth::roles::ParseError| ApiError::BadRequest(e.to_string()))?;
    if role == Role::Owner {
        return Err(ApiError::BadRequest("Cannot invite an owner".to_string()));
    }
    if role == Role::Admin && ctx.member.role != Role::Owner {
        return Err(ApiError::Forbidden(
            "Only the owner can invite admins".to_string(),
        ));
    }

    let permissions = body.permissions.unwrap_or_else(|| role.default_permissions());
    if !ctx.member.can_delegate(&permissions) {
        return Err(ApiError::Forbidden(
            "Cannot grant permissions you do not hold".to_string(),
        ));
    }

    let config = state.config.load_full();
    let now = unix_now();
    let invitation = Invitation {
        id: Uuid::new_v4(),
        tenant_id: tenant,
        email,
        role,
        permissions,
        token: generate_token(),
        invited_by: ctx.user.id,
        created_at: now,
        expires_at: now.saturating_add(config.invitations.ttl_secs),
        accepted_at: None,
    };
    let stored = state.invitations.create_invitation(invitation).await?;

    let accept_url = format!(
        "{}/invite/{}",
        config.invitations.app_url.trim_end_matches('/'),
        stored.token
    );
    let ttl_days = config.invitations.ttl_secs.div_ceil(SECS_PER_DAY);
    let message = templates::invitation(
        &stored.email,
        ctx.user.email.as_deref(),
        stored.role,
        &accept_url,
        ttl_days,
    );
    if let Err(e) = state.mail.enqueue(message) {
        // The invitation stands; the inviter can resend.
        tracing::error!(invitation_id = %stored.id, error = %e, "Failed to queue invitation email");
    }

    tracing::info!(
        tenant_id = %tenant,
        invitation_id = %stored.id,
        role = %stored.role,
        invited_by = %ctx.user.id,
        "Invitation created"
    );

    Ok((
        StatusCode::CREATED,
        Json(InvitationView {
            id: stored.id,
            restaurant_id: stored.tenant_id,
            email: stored.email,
            role: stored.role,
            expires_at: stored.expires_at,
        }),
    ))
}

/// `POST /api/invitations/{token}/accept`
pub async fn accept(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(token): Path<String>,
) -> Result<(StatusCode, Json<MemberView>), ApiError> {
    let user = state.guard.authenticate(&headers).await?;

    let invitation = state
        .invitations
        .find_invitation(&token)
        .await?
        .ok_or_else(|| ApiError::NotFound("Invitation not found".to_string()))?;

    let now = unix_now();
    if invitation.is_accepted() {
        return Err(ApiError::Gone("Invitation has already been used".to_string()));
    }
    if invitation.is_expired(now) {
        return Err(ApiError::Gone("Invitation has expired".to_string()));
    }

    let email_matches = user
        .email
        .as_deref()
        .is_some_and(|e| e.eq_ignore_ascii_case(&invitation.email));
    if !email_matches {
        tracing::warn!(user_id = %user.id, invitation_id = %invitation.id, "Invitation email mismatch");
        return Err(ApiError::Forbidden(
            "Invitation was sent to a different email address".to_string(),
        ));
    }

    let already_member = state
        .members
        .find_member(invitation.tenant_id, user.id)
        .await?
        .is_some();
    if already_member {
        return Err(ApiError::Conflict("Already a member of this restaurant".to_string()));
    }

    let member = state
        .invitations
        .accept_invitation(&invitation, &user, now)
        .await
        .map_err(|e| match e {
            BackendError::Conflict(_) => {
                ApiError::Conflict("Already a member of this restaurant".to_string())
            }
            other => other.into(),
        })?;

    tracing::info!(
        tenant_id = %member.tenant_id,
        user_id = %member.user_id,
        role = %member.role,
        "Invitation accepted"
    );
    Ok((StatusCode::CREATED, Json(member.into())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_check() {
        assert!(is_plausible_email("cook@example.com"));
        assert!(is_plausible_email("a.b+c@sub.example.co"));
        assert!(!is_plausible_email("cook"));
        assert!(!is_plausible_email("@example.com"));
        assert!(!is_plausible_email("cook@localhost"));
        assert!(!is_plausible_email("cook@@example.com"));
        assert!(!is_plausible_email("co ok@example.com"));
        assert!(!is_plausible_email("cook@.example.com"));
    }

    #[test]
    fn test_token_shape() {
        let a = generate_token();
        assert_eq!(a.len(), TOKEN_BYTES * 2);
        assert_ne!(a, generate_token());
    }
}
