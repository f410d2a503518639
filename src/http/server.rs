//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request id, tracing, timeout, body limit, metrics,
//!   security headers, rate limiting, CSRF)
//! - Hold the shared state handed to every handler
//! - Apply hot-reloaded configuration
//! - Serve until shutdown is signalled

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, patch, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::auth::Guard;
use crate::backend::{IdentityProvider, InvitationStore, MemberStore};
use crate::config::ApiConfig;
use crate::http::handlers::{csrf, invitations, members, system};
use crate::mail::{MailQueue, MailTransport};
use crate::observability::metrics;
use crate::security::csrf::csrf_middleware;
use crate::security::headers::security_headers_middleware;
use crate::security::rate_limit::rate_limit_middleware;
use crate::security::{CsrfSigner, FixedWindowLimiter};

/// External collaborators the API depends on.
#[derive(Clone)]
pub struct Services {
    pub identity: Arc<dyn IdentityProvider>,
    pub members: Arc<dyn MemberStore>,
    pub invitations: Arc<dyn InvitationStore>,
    pub mail: Arc<dyn MailTransport>,
}

/// Application state injected into handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ArcSwap<ApiConfig>>,
    pub guard: Guard,
    pub members: Arc<dyn MemberStore>,
    pub invitations: Arc<dyn InvitationStore>,
    pub csrf: Arc<CsrfSigner>,
    pub limiter: Arc<FixedWindowLimiter>,
    pub mail: MailQueue,
}

/// HTTP server for the restaurant API.
pub struct ApiServer {
    router: Router,
    state: AppState,
}

impl ApiServer {
    /// Create a new server. Must be called inside a Tokio runtime, since the
    /// mail worker is spawned here.
    pub fn new(config: ApiConfig, services: Services) -> Self {
        let (mail, _worker) = MailQueue::start(
            services.mail,
            Duration::from_millis(config.mail.send_delay_ms),
        );

        let state = AppState {
            csrf: Arc::new(CsrfSigner::from_config(&config.csrf)),
            limiter: Arc::new(FixedWindowLimiter::new(config.rate_limit.cleanup_probability)),
            guard: Guard::new(services.identity, services.members.clone()),
            members: services.members,
            invitations: services.invitations,
            mail,
            config: Arc::new(ArcSwap::from_pointee(config)),
        };

        let router = Self::build_router(state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState) -> Router {
        let config = state.config.load_full();

        Router::new()
            .route("/health", get(system::health))
            .route("/api/csrf-token", get(csrf::issue_token))
            .route("/api/restaurants/{tenant_id}/me", get(members::me))
            .route("/api/restaurants/{tenant_id}/members", get(members::list))
            .route(
                "/api/restaurants/{tenant_id}/members/{user_id}",
                patch(members::update),
            )
            .route(
                "/api/restaurants/{tenant_id}/invitations",
                post(invitations::create),
            )
            .route("/api/invitations/{token}/accept", post(invitations::accept))
            .layer(middleware::from_fn_with_state(state.clone(), csrf_middleware))
            .layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                security_headers_middleware,
            ))
            .layer(middleware::from_fn(track_metrics))
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .with_state(state)
    }

    /// Shared state, for callers that need to reach the live configuration.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<ApiConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        spawn_config_applier(self.state.config.clone(), config_updates);

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Swap each reloaded configuration into the live slot. Ends when the
/// sending side (the file watcher) is dropped.
fn spawn_config_applier(
    live: Arc<ArcSwap<ApiConfig>>,
    mut updates: mpsc::UnboundedReceiver<ApiConfig>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(new_config) = updates.recv().await {
            tracing::info!(
                rate_limit_enabled = new_config.rate_limit.enabled,
                csrf_enabled = new_config.csrf.enabled,
                "Applying reloaded configuration"
            );
            live.store(Arc::new(new_config));
        }
    })
}

/// Record request count and latency per matched route.
async fn track_metrics(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;
    metrics::record_request(&method, &route, response.status().as_u16(), start);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::config::watcher::ConfigWatcher;
    use crate::mail::MemoryMailer;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn server(config: ApiConfig) -> ApiServer {
        let backend = Arc::new(MemoryBackend::new());
        let services = Services {
            identity: backend.clone(),
            members: backend.clone(),
            invitations: backend,
            mail: Arc::new(MemoryMailer::new()),
        };
        ApiServer::new(config, services)
    }

    fn post(uri: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_route() {
        let server = server(ApiConfig::default());
        let response = server
            .router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert!(response.headers().contains_key("x-ratelimit-limit"));
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let server = server(ApiConfig::default());
        let response = server
            .router
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_csrf_runs_before_authentication() {
        let server = server(ApiConfig::default());
        let response = server
            .router
            .oneshot(post("/api/invitations/abc/accept"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_watcher_reload_reaches_live_config() {
        let path = std::env::temp_dir().join(format!("restaurant-api-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[rate_limit]\nmax_requests = 7\n\n[csrf]\nenabled = false\n").unwrap();

        let server = server(ApiConfig::default());
        let live = server.state().config.clone();
        let (watcher, updates) = ConfigWatcher::new(&path);
        let applier = spawn_config_applier(live.clone(), updates);

        assert!(watcher.reload());
        drop(watcher);
        applier.await.unwrap();

        assert_eq!(live.load().rate_limit.max_requests, 7);
        let response = server
            .router
            .oneshot(post("/api/invitations/abc/accept"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_reloaded_config_applies_to_next_request() {
        let server = server(ApiConfig::default());
        let mut relaxed = ApiConfig::default();
        relaxed.csrf.enabled = false;
        server.state().config.store(Arc::new(relaxed));

        let response = server
            .router
            .oneshot(post("/api/invitations/abc/accept"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
