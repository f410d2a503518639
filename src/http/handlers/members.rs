//! Membership routes: who am I, who is on the team, change a member's role.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::roles::TEAM_MODULE;
use crate::auth::{Action, Member, Permissions, Requirement, Role, TenantId, UserId};
use crate::http::error::ApiError;
use crate::http::handlers::{json_body, parse_id};
use crate::http::server::AppState;

/// Member as returned to clients; permissions are the effective set.
#[derive(Debug, Serialize)]
pub struct MemberView {
    pub restaurant_id: TenantId,
    pub user_id: UserId,
    pub email: Option<String>,
    pub role: Role,
    pub permissions: Permissions,
}

impl From<Member> for MemberView {
    fn from(member: Member) -> Self {
        Self {
            permissions: member.effective_permissions(),
            restaurant_id: member.tenant_id,
            user_id: member.user_id,
            email: member.email,
            role: member.role,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateMemberRequest {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub permissions: Option<Permissions>,
}

/// `GET /api/restaurants/{tenant_id}/me`
pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(tenant_id): Path<String>,
) -> Result<Json<MemberView>, ApiError> {
    let tenant: TenantId = parse_id(&tenant_id, "restaurant id")?;
    let ctx = state
        .guard
        .authorize(&headers, tenant, Requirement::Member)
        .await?;
    Ok(Json(ctx.member.into()))
}

/// `GET /api/restaurants/{tenant_id}/members`
pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(tenant_id): Path<String>,
) -> Result<Json<Vec<MemberView>>, ApiError> {
    let tenant: TenantId = parse_id(&tenant_id, "restaurant id")?;
    state
        .guard
        .authorize(&headers, tenant, Requirement::permission(TEAM_MODULE, Action::View))
        .await?;

    let members = state.members.list_members(tenant).await?;
    Ok(Json(members.into_iter().map(MemberView::from).collect()))
}

/// `PATCH /api/restaurants/{tenant_id}/members/{user_id}`
pub async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((tenant_id, user_id)): Path<(String, String)>,
    payload: Result<Json<UpdateMemberRequest>, JsonRejection>,
) -> Result<Json<MemberView>, ApiError> {
    let tenant: TenantId = parse_id(&tenant_id, "restaurant id")?;
    let target_id: UserId = parse_id(&user_id, "user id")?;
    let ctx = state
        .guard
        .authorize(&headers, tenant, Requirement::MinRole(Role::Admin))
        .await?;

    let body = json_body(payload)?;
    if body.role.is_none() && body.permissions.is_none() {
        return Err(ApiError::BadRequest(
            "Provide a role, permissions, or both".to_string(),
        ));
    }
    let new_role = body
        .role
        .as_deref()
        .map(str::parse::<Role>)
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    if new_role == Some(Role::Owner) {
        return Err(ApiError::BadRequest(
            "Ownership cannot be assigned through member updates".to_string(),
        ));
    }

    let target = state
        .members
        .find_member(tenant, target_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;

    if target.role == Role::Owner {
        return Err(ApiError::Forbidden("The owner cannot be modified".to_string()));
    }
    let touches_admin = target.role == Role::Admin || new_role == Some(Role::Admin);
    if touches_admin && ctx.member.role != Role::Owner {
        return Err(ApiError::Forbidden(
            "Only the owner can manage admins".to_string(),
        ));
    }

    let role = new_role.unwrap_or(target.role);
    let permissions = match body.permissions {
        Some(permissions) => permissions,
        None if role != target.role => role.default_permissions(),
        None => target.permissions,
    };
    if !ctx.member.can_delegate(&permissions) {
        return Err(ApiError::Forbidden(
            "Cannot grant permissions you do not hold".to_string(),
        ));
    }

    let updated = state
        .members
        .update_member(tenant, target_id, role, permissions)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;

    tracing::info!(
        tenant_id = %tenant,
        actor = %ctx.user.id,
        target = %target_id,
        role = %updated.role,
        "Member updated"
    );
    Ok(Json(updated.into()))
}
