//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router around the serve handler
//! - Wire up middleware (request ID, tracing, timeout)
//! - Bind server to listener
//! - Apply reloaded configuration between requests

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{ServeConfig, Settings};
use crate::lifecycle::Shutdown;
use crate::http::handler::ServeHandler;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::observability::tracing::make_request_span;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub handler: ServeHandler,
}

/// HTTP front end for a [`ServeHandler`].
pub struct HttpServer {
    router: Router,
    handler: ServeHandler,
}

impl HttpServer {
    pub fn new(handler: ServeHandler, config: &ServeConfig) -> Self {
        let state = AppState {
            handler: handler.clone(),
        };
        let router = Self::build_router(config, state);
        Self { router, handler }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(config: &ServeConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(serve_handler))
            .route("/", any(serve_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(make_request_span::<Body>))
            .layer(set_request_id_layer())
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn handler(&self) -> &ServeHandler {
        &self.handler
    }

    /// Run the server until `shutdown` fires. Settings arriving on
    /// `settings_updates` replace the handler's between requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut settings_updates: mpsc::UnboundedReceiver<Settings>,
        shutdown: Shutdown,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let handler = self.handler.clone();
        let reloader = tokio::spawn(async move {
            while let Some(settings) = settings_updates.recv().await {
                tracing::info!(root = %settings.root.display(), "Configuration reloaded");
                handler.update_settings(settings);
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.wait().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn serve_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    state.handler.serve(request).await
}
