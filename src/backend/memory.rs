//! In-process backend for tests and local development.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use crate::auth::roles::{Member, Permissions, Role, TenantId, UserId};
use crate::backend::{
    BackendError, BackendResult, IdentityProvider, Invitation, InvitationStore, MemberStore,
    UserIdentity,
};

/// A thread-safe store of sessions, memberships and invitations.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    /// bearer token -> user
    sessions: Arc<DashMap<String, UserIdentity>>,
    /// (restaurant, user) -> member
    members: Arc<DashMap<(TenantId, UserId), Member>>,
    /// invitation token -> invitation
    invitations: Arc<DashMap<String, Invitation>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session token for a user.
    pub fn add_session(&self, token: &str, user: UserIdentity) {
        self.sessions.insert(token.to_string(), user);
    }

    /// Drop a session token.
    pub fn revoke_session(&self, token: &str) {
        self.sessions.remove(token);
    }

    /// Insert or replace a membership.
    pub fn put_member(&self, member: Member) {
        self.members.insert((member.tenant_id, member.user_id), member);
    }

    /// Insert or replace an invitation.
    pub fn put_invitation(&self, invitation: Invitation) {
        self.invitations.insert(invitation.token.clone(), invitation);
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

#[async_trait]
impl IdentityProvider for MemoryBackend {
    async fn user_for_token(&self, token: &str) -> BackendResult<Option<UserIdentity>> {
        Ok(self.sessions.get(token).map(|r| r.value().clone()))
    }
}

#[async_trait]
impl MemberStore for MemoryBackend {
    async fn find_member(&self, tenant: TenantId, user: UserId) -> BackendResult<Option<Member>> {
        Ok(self.members.get(&(tenant, user)).map(|r| r.value().clone()))
    }

    async fn list_members(&self, tenant: TenantId) -> BackendResult<Vec<Member>> {
        let mut members: Vec<Member> = self
            .members
            .iter()
            .filter(|r| r.key().0 == tenant)
            .map(|r| r.value().clone())
            .collect();
        members.sort_by(|a, b| b.role.rank().cmp(&a.role.rank()).then(a.user_id.cmp(&b.user_id)));
        Ok(members)
    }

    async fn update_member(
        &self,
        tenant: TenantId,
        user: UserId,
        role: Role,
        permissions: Permissions,
    ) -> BackendResult<Option<Member>> {
        Ok(self.members.get_mut(&(tenant, user)).map(|mut r| {
            let member = r.value_mut();
            member.role = role;
            member.permissions = permissions;
            member.clone()
        }))
    }
}

#[async_trait]
impl InvitationStore for MemoryBackend {
    async fn create_invitation(&self, invitation: Invitation) -> BackendResult<Invitation> {
        if self.invitations.contains_key(&invitation.token) {
            return Err(BackendError::Conflict("invitation token already exists".to_string()));
        }
        self.invitations.insert(invitation.token.clone(), invitation.clone());
        Ok(invitation)
    }

    async fn find_invitation(&self, token: &str) -> BackendResult<Option<Invitation>> {
        Ok(self.invitations.get(token).map(|r| r.value().clone()))
    }

    async fn accept_invitation(
        &self,
        invitation: &Invitation,
        user: &UserIdentity,
        accepted_at: u64,
    ) -> BackendResult<Member> {
        let key = (invitation.tenant_id, user.id);
        if self.members.contains_key(&key) {
            return Err(BackendError::Conflict("already a member".to_string()));
        }

        let mut stored = self
            .invitations
            .get_mut(&invitation.token)
            .ok_or_else(|| BackendError::NotFound("invitation".to_string()))?;
        stored.accepted_at = Some(accepted_at);
        drop(stored);

        let member = Member {
            tenant_id: invitation.tenant_id,
            user_id: user.id,
            email: user.email.clone(),
            role: invitation.role,
            permissions: invitation.permissions.clone(),
        };
        self.members.insert(key, member.clone());
        Ok(member)
    }
}
