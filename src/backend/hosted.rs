//! HTTP client for the hosted backend-as-a-service.
//!
//! # Responsibilities
//! - Resolve session tokens through the auth endpoint (`/auth/v1/user`)
//! - Read and write membership and invitation rows through the REST
//!   endpoint (`/rest/v1/{table}`) using `eq.` filters
//!
//! # Design Decisions
//! - Auth calls carry the caller's own bearer token plus the public key
//! - Data calls use the service-role key; tenant scoping is enforced here,
//!   by the guard pipeline, not by row-level policies
//! - 401/403 from the auth endpoint means "no such session", not an error

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde_json::json;
use std::time::Duration;

use crate::auth::roles::{Member, Permissions, Role, TenantId, UserId};
use crate::backend::{
    BackendError, BackendResult, IdentityProvider, Invitation, InvitationStore, MemberStore,
    UserIdentity,
};
use crate::config::BackendConfig;

/// Client for the hosted auth and REST endpoints.
#[derive(Clone)]
pub struct HostedBackend {
    client: Client,
    base_url: String,
    anon_key: String,
    service_key: String,
    members_table: String,
    invitations_table: String,
}

#[derive(Serialize)]
struct MemberPatch<'a> {
    role: Role,
    permissions: &'a Permissions,
}

impl HostedBackend {
    /// Build a client from configuration.
    pub fn new(config: &BackendConfig, timeout: Duration) -> BackendResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            service_key: config.service_key.clone(),
            members_table: config.members_table.clone(),
            invitations_table: config.invitations_table.clone(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Attach service-role credentials to a data request.
    fn service(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn expect_success(response: Response) -> BackendResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::CONFLICT {
            return Err(BackendError::Conflict(body));
        }
        Err(BackendError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn fetch_rows<T: serde::de::DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> BackendResult<Vec<T>> {
        let mut query: Vec<(&str, String)> = vec![("select", "*".to_string())];
        query.extend(filters.iter().cloned());

        let response = self
            .service(self.client.get(self.table_url(table)))
            .query(&query)
            .send()
            .await?;
        let rows = Self::expect_success(response).await?.json::<Vec<T>>().await?;
        Ok(rows)
    }
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{}", value)
}

#[async_trait]
impl IdentityProvider for HostedBackend {
    async fn user_for_token(&self, token: &str) -> BackendResult<Option<UserIdentity>> {
        let response = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            _ => {
                let user = Self::expect_success(response)
                    .await?
                    .json::<UserIdentity>()
                    .await?;
                Ok(Some(user))
            }
        }
    }
}

#[async_trait]
impl MemberStore for HostedBackend {
    async fn find_member(&self, tenant: TenantId, user: UserId) -> BackendResult<Option<Member>> {
        let rows: Vec<Member> = self
            .fetch_rows(
                &self.members_table,
                &[
                    ("restaurant_id", eq(tenant)),
                    ("user_id", eq(user)),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn list_members(&self, tenant: TenantId) -> BackendResult<Vec<Member>> {
        self.fetch_rows(&self.members_table, &[("restaurant_id", eq(tenant))])
            .await
    }

    async fn update_member(
        &self,
        tenant: TenantId,
        user: UserId,
        role: Role,
        permissions: Permissions,
    ) -> BackendResult<Option<Member>> {
        let response = self
            .service(self.client.patch(self.table_url(&self.members_table)))
            .query(&[("restaurant_id", eq(tenant)), ("user_id", eq(user))])
            .header("Prefer", "return=representation")
            .json(&MemberPatch {
                role,
                permissions: &permissions,
            })
            .send()
            .await?;
        let rows = Self::expect_success(response)
            .await?
            .json::<Vec<Member>>()
            .await?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl InvitationStore for HostedBackend {
    async fn create_invitation(&self, invitation: Invitation) -> BackendResult<Invitation> {
        let response = self
            .service(self.client.post(self.table_url(&self.invitations_table)))
            .header("Prefer", "return=representation")
            .json(&invitation)
            .send()
            .await?;
        let rows = Self::expect_success(response)
            .await?
            .json::<Vec<Invitation>>()
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::Decode("empty insert response".to_string()))
    }

    async fn find_invitation(&self, token: &str) -> BackendResult<Option<Invitation>> {
        let rows: Vec<Invitation> = self
            .fetch_rows(
                &self.invitations_table,
                &[("token", eq(token)), ("limit", "1".to_string())],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn accept_invitation(
        &self,
        invitation: &Invitation,
        user: &UserIdentity,
        accepted_at: u64,
    ) -> BackendResult<Member> {
        let member = Member {
            tenant_id: invitation.tenant_id,
            user_id: user.id,
            email: user.email.clone(),
            role: invitation.role,
            permissions: invitation.permissions.clone(),
        };

        // The membership insert runs first so a duplicate leaves the
        // invitation usable.
        let response = self
            .service(self.client.post(self.table_url(&self.members_table)))
            .header("Prefer", "return=representation")
            .json(&member)
            .send()
            .await?;
        let inserted = Self::expect_success(response)
            .await?
            .json::<Vec<Member>>()
            .await?
            .into_iter()
            .next()
            .unwrap_or(member);

        let response = self
            .service(self.client.patch(self.table_url(&self.invitations_table)))
            .query(&[("token", eq(&invitation.token))])
            .json(&json!({ "accepted_at": accepted_at }))
            .send()
            .await?;
        Self::expect_success(response).await?;

        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_and_filters() {
        let mut config = BackendConfig::default();
        config.url = "https://project.example.co/".to_string();
        let backend = HostedBackend::new(&config, Duration::from_secs(1)).unwrap();
        assert_eq!(
            backend.table_url("restaurant_members"),
            "https://project.example.co/rest/v1/restaurant_members"
        );
        assert_eq!(eq("abc"), "eq.abc");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        let mut config = BackendConfig::default();
        config.url = "http://127.0.0.1:1".to_string();
        let backend = HostedBackend::new(&config, Duration::from_secs(1)).unwrap();
        let err = backend.user_for_token("token").await.unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)));
    }
}
