//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use restaurant_api::auth::{Member, Role, TenantId, UserId};
use restaurant_api::backend::{MemoryBackend, UserIdentity};
use restaurant_api::mail::MemoryMailer;
use restaurant_api::{ApiConfig, ApiServer, Services, Shutdown};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use uuid::Uuid;

/// A running server plus handles onto its in-memory collaborators.
pub struct TestApp {
    pub addr: SocketAddr,
    pub backend: MemoryBackend,
    pub mailer: Arc<MemoryMailer>,
    pub restaurant: TenantId,
    shutdown: Shutdown,
}

impl TestApp {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Create a session and a membership for a fresh user, returning the
    /// bearer token and user id.
    pub fn member(&self, role: Role) -> (String, UserId) {
        let (token, user) = self.session(&format!("{}@example.com", role.as_str()));
        self.backend.put_member(Member {
            tenant_id: self.restaurant,
            user_id: user,
            email: Some(format!("{}@example.com", role.as_str())),
            role,
            permissions: role.default_permissions(),
        });
        (token, user)
    }

    /// Create a session for a user with no membership.
    pub fn session(&self, email: &str) -> (String, UserId) {
        let token = Uuid::new_v4().simple().to_string();
        let user = UserId::from(Uuid::new_v4());
        self.backend.add_session(
            &token,
            UserIdentity {
                id: user,
                email: Some(email.to_string()),
            },
        );
        (token, user)
    }

    /// Wait until the paced mail queue has delivered `count` emails.
    pub async fn wait_for_mail(&self, count: usize) {
        for _ in 0..100 {
            if self.mailer.sent().len() >= count {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("expected {} emails, got {}", count, self.mailer.sent().len());
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Default test config: fixed CSRF secret, no mail pacing.
pub fn test_config() -> ApiConfig {
    let mut config = ApiConfig::default();
    config.csrf.secret = "integration-test-secret-0123456789abcdef".to_string();
    config.mail.send_delay_ms = 0;
    config
}

/// Start a server on an ephemeral port backed by memory stores.
pub async fn spawn_app(config: ApiConfig) -> TestApp {
    let backend = MemoryBackend::new();
    let mailer = Arc::new(MemoryMailer::new());
    let services = Services {
        identity: Arc::new(backend.clone()),
        members: Arc::new(backend.clone()),
        invitations: Arc::new(backend.clone()),
        mail: mailer.clone(),
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = ApiServer::new(config, services);

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let (_tx, updates) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let _ = server.run(listener, updates, rx).await;
    });

    TestApp {
        addr,
        backend,
        mailer,
        restaurant: TenantId::from(Uuid::new_v4()),
        shutdown,
    }
}
