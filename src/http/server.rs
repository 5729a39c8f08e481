//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with auth, OTP, webhook and admin routes
//! - Wire up middleware (request ID, tracing, timeouts, body limit)
//! - Layer the admission chain over `/api`
//! - Serve with connect info and graceful shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::Request,
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::config::ListenerConfig;
use crate::http::handlers;
use crate::http::middleware::{
    authenticate, ip_rate_limit, resolve_client_ip, user_rate_limit, webhook_rate_limit,
};
use crate::http::request::request_id;
use crate::http::state::AppState;
use crate::lifecycle::Shutdown;

/// HTTP server for the admission guard.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: ListenerConfig, state: AppState) -> Self {
        let router = Self::build_router(&config, state);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(config: &ListenerConfig, state: AppState) -> Router {
        let api = Router::new()
            .route("/auth/login", post(handlers::login))
            .route("/auth/refresh", post(handlers::refresh))
            .route("/auth/logout", post(handlers::logout))
            .route("/auth/otp/send", post(handlers::otp_send))
            .route("/auth/otp/verify", post(handlers::otp_verify))
            .route("/auth/otp/status", get(handlers::otp_status))
            .route("/me", get(handlers::me))
            .nest("/admin", admin::router());
        let api = admission_chain(api, &state);

        let webhooks = Router::new()
            .route("/{provider}", post(handlers::webhook))
            .layer(middleware::from_fn_with_state(state.clone(), webhook_rate_limit))
            .layer(middleware::from_fn_with_state(state.clone(), resolve_client_ip));

        Router::new()
            .route("/health", get(handlers::health))
            .nest("/api", api)
            .nest("/webhooks", webhooks)
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        path = %request.uri().path(),
                        request_id = %request_id(request.headers()),
                    )
                }),
            )
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: Arc<Shutdown>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let mut stop = shutdown.subscribe();
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Wrap `routes` in the `/api` admission chain.
///
/// Layers added last run first, so `authenticate` is the outermost layer.
/// The limiters classify on the original request path, so `routes` may be
/// nested under any prefix.
fn admission_chain(routes: Router<AppState>, state: &AppState) -> Router<AppState> {
    routes
        .layer(middleware::from_fn_with_state(state.clone(), user_rate_limit))
        .layer(middleware::from_fn_with_state(state.clone(), ip_rate_limit))
        .layer(middleware::from_fn_with_state(state.clone(), resolve_client_ip))
        .layer(middleware::from_fn_with_state(state.clone(), authenticate))
}
