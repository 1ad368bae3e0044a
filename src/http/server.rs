//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up middleware (tracing, timeout, request ID, CORS, metrics)
//! - Bind server to listener and serve until shutdown

use axum::{
    body::Body,
    extract::Request,
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::accounts::UserStore;
use crate::auth::TokenIssuer;
use crate::blockchain::{BlockchainClient, WalletProvisioner};
use crate::config::ServiceConfig;
use crate::http::handlers::{admin, auth, candidates, elections, health, invites, wallet};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::services::{ElectionService, InviteService, UserService};

pub const X_REQUEST_ID: &str = "x-request-id";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserService>,
    pub elections: Arc<ElectionService>,
    pub invites: Arc<InviteService>,
    pub tokens: Arc<TokenIssuer>,
    pub store: UserStore,
    pub provisioner: WalletProvisioner,
    /// `None` when blockchain integration is disabled.
    pub blockchain: Option<BlockchainClient>,
    pub started_at: Instant,
}

/// HTTP server for the voter API.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState, config: &ServiceConfig) -> Self {
        let router = Self::build_router(state, Duration::from_secs(config.timeouts.request_secs));
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState, request_timeout: Duration) -> Router {
        let request_id = HeaderName::from_static(X_REQUEST_ID);

        let api = Router::new()
            .route("/auth/sign-up", post(auth::sign_up))
            .route("/auth/sign-in", post(auth::sign_in))
            .route("/auth/send-recovery-link", post(auth::send_recovery_link))
            .route("/auth/reset-password", post(auth::reset_password))
            .route("/candidates", get(candidates::search))
            .route("/invites", post(invites::send))
            .route("/elections", post(elections::create))
            .route("/elections/open", get(elections::open))
            .route("/elections/results", get(elections::results))
            .route("/elections/mine", get(elections::mine))
            .route("/elections/{id}", get(elections::detail))
            .route("/elections/{id}/start", post(elections::start))
            .route("/elections/{id}/end", post(elections::end))
            .route("/elections/{id}/extend", post(elections::extend))
            .route("/elections/{id}/voters", post(elections::add_voters))
            .route("/elections/{id}/voters/{voter_id}", put(elections::update_voter))
            .route(
                "/elections/{id}/candidates/{candidate_id}",
                delete(elections::remove_candidate),
            )
            .route(
                "/elections/{id}/candidates/{candidate_id}/withdraw",
                post(elections::withdraw),
            )
            .route("/elections/{id}/vote", post(elections::vote))
            .route("/elections/{id}/has-voted", get(elections::has_voted))
            .route("/admin/elections", get(admin::elections))
            .route("/wallet", get(wallet::show))
            .route("/wallet/fund", post(wallet::fund));

        Router::new()
            .route("/health", get(health::health))
            .nest("/api", api)
            .with_state(state)
            .layer(middleware::from_fn(track_metrics))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::new(request_id))
                    .layer(TimeoutLayer::new(request_timeout))
                    .layer(CorsLayer::permissive()),
            )
    }

    /// The router, for driving the app without a socket.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Run the server until `shutdown` is triggered, then drain.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown.signalled())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn track_metrics(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let response = next.run(request).await;
    metrics::record_request(&method, response.status().as_u16(), start);
    response
}
