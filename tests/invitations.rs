mod common;

use common::{spawn_app, test_config, TestApp};
use restaurant_api::auth::{Action, Member, Permissions, Role};
use restaurant_api::backend::{unix_now, Invitation};
use restaurant_sdk::{InviteRequest, RestaurantClient};
use serde_json::Value;
use uuid::Uuid;

/// Pull the invitation token out of the accept link in the latest email.
fn token_from_mail(app: &TestApp) -> String {
    let sent = app.mailer.sent();
    let email = sent.last().expect("no email sent");
    let start = email.text.find("/invite/").expect("no accept link") + "/invite/".len();
    email.text[start..start + 64].to_string()
}

fn invite(email: &str, role: &str) -> InviteRequest {
    InviteRequest {
        email: email.to_string(),
        role: role.to_string(),
        permissions: None,
    }
}

#[tokio::test]
async fn test_invite_then_accept() {
    let app = spawn_app(test_config()).await;
    let (owner_token, _) = app.member(Role::Owner);
    let owner = RestaurantClient::new(&app.url()).with_token(&owner_token);

    let resp = owner
        .invite(&app.restaurant.to_string(), &invite("Cook@Example.com", "staff"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["email"], "cook@example.com");
    assert_eq!(body["role"], "staff");
    assert!(body.get("token").is_none());

    app.wait_for_mail(1).await;
    let sent = app.mailer.sent();
    assert_eq!(sent[0].to, "cook@example.com");
    let token = token_from_mail(&app);

    let (cook_token, cook_id) = app.session("cook@example.com");
    let cook = RestaurantClient::new(&app.url()).with_token(&cook_token);
    let resp = cook.accept_invitation(&token).await.unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["role"], "staff");
    assert_eq!(body["user_id"], cook_id.to_string());

    let resp = cook.me(&app.restaurant.to_string()).await.unwrap();
    assert_eq!(resp.status(), 200);

    // Single use.
    let resp = cook.accept_invitation(&token).await.unwrap();
    assert_eq!(resp.status(), 410);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "gone");
}

#[tokio::test]
async fn test_accept_requires_session() {
    let app = spawn_app(test_config()).await;
    let anon = RestaurantClient::new(&app.url());
    let resp = anon.accept_invitation(&"ab".repeat(32)).await.unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_unknown_invitation_is_not_found() {
    let app = spawn_app(test_config()).await;
    let (token, _) = app.session("someone@example.com");
    let client = RestaurantClient::new(&app.url()).with_token(&token);
    let resp = client.accept_invitation(&"ab".repeat(32)).await.unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_expired_invitation_is_gone() {
    let app = spawn_app(test_config()).await;
    let (_, owner) = app.member(Role::Owner);
    let now = unix_now();
    let token = "cd".repeat(32);
    app.backend.put_invitation(Invitation {
        id: Uuid::new_v4(),
        tenant_id: app.restaurant,
        email: "late@example.com".to_string(),
        role: Role::Staff,
        permissions: Role::Staff.default_permissions(),
        token: token.clone(),
        invited_by: owner,
        created_at: now - 10_000,
        expires_at: now - 1,
        accepted_at: None,
    });

    let (session, _) = app.session("late@example.com");
    let client = RestaurantClient::new(&app.url()).with_token(&session);
    let resp = client.accept_invitation(&token).await.unwrap();
    assert_eq!(resp.status(), 410);
}

#[tokio::test]
async fn test_accept_with_wrong_email_is_forbidden() {
    let app = spawn_app(test_config()).await;
    let (owner_token, _) = app.member(Role::Owner);
    let owner = RestaurantClient::new(&app.url()).with_token(&owner_token);
    owner
        .invite(&app.restaurant.to_string(), &invite("cook@example.com", "staff"))
        .await
        .unwrap();
    app.wait_for_mail(1).await;
    let token = token_from_mail(&app);

    let (session, _) = app.session("intruder@example.com");
    let client = RestaurantClient::new(&app.url()).with_token(&session);
    let resp = client.accept_invitation(&token).await.unwrap();
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn test_existing_member_conflicts() {
    let app = spawn_app(test_config()).await;
    let (owner_token, _) = app.member(Role::Owner);
    let (staff_token, _) = app.member(Role::Staff);
    let owner = RestaurantClient::new(&app.url()).with_token(&owner_token);
    owner
        .invite(&app.restaurant.to_string(), &invite("staff@example.com", "manager"))
        .await
        .unwrap();
    app.wait_for_mail(1).await;
    let token = token_from_mail(&app);

    let staff = RestaurantClient::new(&app.url()).with_token(&staff_token);
    let resp = staff.accept_invitation(&token).await.unwrap();
    assert_eq!(resp.status(), 409);
}

#[tokio::test]
async fn test_manager_cannot_invite() {
    let app = spawn_app(test_config()).await;
    let (token, _) = app.member(Role::Manager);
    let client = RestaurantClient::new(&app.url()).with_token(&token);
    let resp = client
        .invite(&app.restaurant.to_string(), &invite("new@example.com", "staff"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
    assert!(app.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_only_owner_invites_admins() {
    let app = spawn_app(test_config()).await;
    let (admin_token, _) = app.member(Role::Admin);
    let (owner_token, _) = app.member(Role::Owner);
    let restaurant = app.restaurant.to_string();

    let admin = RestaurantClient::new(&app.url()).with_token(&admin_token);
    let resp = admin
        .invite(&restaurant, &invite("boss@example.com", "admin"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let owner = RestaurantClient::new(&app.url()).with_token(&owner_token);
    let resp = owner
        .invite(&restaurant, &invite("boss@example.com", "admin"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
}

#[tokio::test]
async fn test_invalid_invitations_are_rejected() {
    let app = spawn_app(test_config()).await;
    let (token, _) = app.member(Role::Owner);
    let client = RestaurantClient::new(&app.url()).with_token(&token);
    let restaurant = app.restaurant.to_string();

    for (email, role) in [
        ("not-an-email", "staff"),
        ("new@example.com", "owner"),
        ("new@example.com", "chef"),
    ] {
        let resp = client.invite(&restaurant, &invite(email, role)).await.unwrap();
        assert_eq!(resp.status(), 400, "{} / {}", email, role);
    }
}

#[tokio::test]
async fn test_custom_permissions_carry_to_membership() {
    let app = spawn_app(test_config()).await;
    let (owner_token, _) = app.member(Role::Owner);
    let owner = RestaurantClient::new(&app.url()).with_token(&owner_token);

    let mut permissions = Permissions::default();
    permissions.grant("reservations", Action::View);
    let req = InviteRequest {
        email: "host@example.com".to_string(),
        role: "staff".to_string(),
        permissions: Some(serde_json::to_value(&permissions).unwrap()),
    };
    let resp = owner.invite(&app.restaurant.to_string(), &req).await.unwrap();
    assert_eq!(resp.status(), 201);
    app.wait_for_mail(1).await;
    let token = token_from_mail(&app);

    let (session, _) = app.session("host@example.com");
    let host = RestaurantClient::new(&app.url()).with_token(&session);
    let resp = host.accept_invitation(&token).await.unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["permissions"]["reservations"]["view"], true);
    assert!(body["permissions"].get("temperatures").is_none());
}

#[tokio::test]
async fn test_oversized_ttl_does_not_wrap() {
    let mut config = test_config();
    config.invitations.ttl_secs = u64::MAX;
    let app = spawn_app(config).await;
    let (owner_token, _) = app.member(Role::Owner);
    let owner = RestaurantClient::new(&app.url()).with_token(&owner_token);

    let resp = owner
        .invite(&app.restaurant.to_string(), &invite("cook@example.com", "staff"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["expires_at"], u64::MAX);

    app.wait_for_mail(1).await;
    let token = token_from_mail(&app);
    let (session, _) = app.session("cook@example.com");
    let cook = RestaurantClient::new(&app.url()).with_token(&session);
    let resp = cook.accept_invitation(&token).await.unwrap();
    assert_eq!(resp.status(), 201);
}

#[tokio::test]
async fn test_inviter_cannot_grant_what_they_lack() {
    let app = spawn_app(test_config()).await;
    let (token, lead) = app.session("lead@example.com");
    let mut own = Permissions::default();
    own.grant("team", Action::Create);
    own.grant("cleaning", Action::View);
    app.backend.put_member(Member {
        tenant_id: app.restaurant,
        user_id: lead,
        email: Some("lead@example.com".to_string()),
        role: Role::Staff,
        permissions: own,
    });
    let client = RestaurantClient::new(&app.url()).with_token(&token);
    let restaurant = app.restaurant.to_string();

    let mut beyond = Permissions::default();
    beyond.grant("cleaning", Action::View);
    beyond.grant("settings", Action::Delete);
    let req = InviteRequest {
        email: "new@example.com".to_string(),
        role: "staff".to_string(),
        permissions: Some(serde_json::to_value(&beyond).unwrap()),
    };
    let resp = client.invite(&restaurant, &req).await.unwrap();
    assert_eq!(resp.status(), 403);

    let mut within = Permissions::default();
    within.grant("cleaning", Action::View);
    let req = InviteRequest {
        email: "new@example.com".to_string(),
        role: "staff".to_string(),
        permissions: Some(serde_json::to_value(&within).unwrap()),
    };
    let resp = client.invite(&restaurant, &req).await.unwrap();
    assert_eq!(resp.status(), 201);
}
