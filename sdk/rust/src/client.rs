//! Client for the restaurant API.
//!
//! Mutating calls fetch a CSRF token first and send it back in
//! `X-CSRF-Token`; read calls only carry the bearer token.

use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const CSRF_HEADER: &str = "X-CSRF-Token";

#[derive(Debug, Serialize, Deserialize)]
pub struct CsrfTokenResponse {
    pub token: String,
    pub expires_in: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InviteRequest {
    pub email: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Value>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MemberUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Value>,
}

pub struct RestaurantClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl RestaurantClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Attach a session token sent as `Authorization: Bearer`.
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    pub async fn health(&self) -> Result<Response, reqwest::Error> {
        self.client.get(self.url("/health")).send().await
    }

    /// Fetch a fresh CSRF token.
    pub async fn fetch_csrf_token(&self) -> Result<String, Box<dyn std::error::Error>> {
        let resp = self.client.get(self.url("/api/csrf-token")).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(format!("CSRF endpoint returned status {}", status).into());
        }
        let body: CsrfTokenResponse = resp.json().await?;
        Ok(body.token)
    }

    /// The caller's own membership in a restaurant.
    pub async fn me(&self, restaurant_id: &str) -> Result<Response, reqwest::Error> {
        self.authed(
            self.client
                .get(self.url(&format!("/api/restaurants/{}/me", restaurant_id))),
        )
        .send()
        .await
    }

    pub async fn members(&self, restaurant_id: &str) -> Result<Response, reqwest::Error> {
        self.authed(
            self.client
                .get(self.url(&format!("/api/restaurants/{}/members", restaurant_id))),
        )
        .send()
        .await
    }

    pub async fn update_member(
        &self,
        restaurant_id: &str,
        user_id: &str,
        update: &MemberUpdate,
    ) -> Result<Response, Box<dyn std::error::Error>> {
        let csrf = self.fetch_csrf_token().await?;
        let resp = self
            .authed(self.client.patch(self.url(&format!(
                "/api/restaurants/{}/members/{}",
                restaurant_id, user_id
            ))))
            .header(CSRF_HEADER, csrf)
            .json(update)
            .send()
            .await?;
        Ok(resp)
    }

    pub async fn invite(
        &self,
        restaurant_id: &str,
        req: &InviteRequest,
    ) -> Result<Response, Box<dyn std::error::Error>> {
        let csrf = self.fetch_csrf_token().await?;
        let resp = self
            .authed(
                self.client
                    .post(self.url(&format!("/api/restaurants/{}/invitations", restaurant_id))),
            )
            .header(CSRF_HEADER, csrf)
            .json(req)
            .send()
            .await?;
        Ok(resp)
    }

    pub async fn accept_invitation(
        &self,
        invitation_token: &str,
    ) -> Result<Response, Box<dyn std::error::Error>> {
        let csrf = self.fetch_csrf_token().await?;
        let resp = self
            .authed(
                self.client
                    .post(self.url(&format!("/api/invitations/{}/accept", invitation_token))),
            )
            .header(CSRF_HEADER, csrf)
            .send()
            .await?;
        Ok(resp)
    }

    /// Send a request without the CSRF header, for exercising the guard.
    pub async fn post_without_csrf(&self, path: &str, body: &Value) -> Result<Response, reqwest::Error> {
        self.authed(self.client.post(self.url(path)))
            .json(body)
            .send()
            .await
    }
}
