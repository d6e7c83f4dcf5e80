//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (timeout, request ID, tracing)
//! - Build the subscription pipeline and its collaborators
//! - Bind server to listener and stop on the shutdown signal

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, Request},
    response::Response,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin::setup_admin_router;
use crate::aggregator::{Aggregator, HttpFetcher};
use crate::cache::NodeCache;
use crate::config::ServiceConfig;
use crate::http::request::{propagate_request_id_layer, request_id_of, set_request_id_layer};
use crate::pipeline::{Pipeline, SubRequest};
use crate::services::{SessionCookieAuth, TelegramNotifier, TracingAccessLogger};
use crate::store::ConfigStore;
use crate::subconverter::SubconverterClient;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub config: Arc<ServiceConfig>,
    pub started_at: Instant,
}

/// HTTP server for the subscription service.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server reading settings, sources and profiles from `store`.
    pub fn new(config: ServiceConfig, store: Arc<dyn ConfigStore>) -> Self {
        let client = reqwest::Client::new();

        let fetcher = Arc::new(HttpFetcher::new(client.clone(), &config.fetch));
        let aggregator = Aggregator::new(fetcher, config.fetch.concurrency);
        let subconverter = SubconverterClient::new(client.clone(), &config.subconverter);
        let auth = Arc::new(SessionCookieAuth::new(
            config.callback.secret.clone(),
            config.session.cookie_name.clone(),
            Duration::from_secs(config.session.ttl_secs),
        ));
        let notifier = Arc::new(TelegramNotifier::new(client, &config.notify));

        let pipeline = Pipeline::new(
            store,
            NodeCache::new(&config.cache),
            aggregator,
            subconverter,
            auth,
            notifier,
            Arc::new(TracingAccessLogger),
            &config.callback,
        );

        let state = AppState {
            pipeline: Arc::new(pipeline),
            config: Arc::new(config),
            started_at: Instant::now(),
        };
        let router = Self::build_router(state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState) -> Router {
        let request_timeout = Duration::from_secs(state.config.timeouts.request_secs);

        let mut router = Router::new()
            .route("/sub/{token}", get(subscription_handler))
            .route("/sub/{token}/{profile}", get(profile_subscription_handler))
            .route("/healthz", get(|| async { "ok" }))
            .with_state(state.clone());

        if state.config.admin.enabled {
            router = router.merge(setup_admin_router(state));
        }

        router
            .layer(TimeoutLayer::new(request_timeout))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id_of(request),
                )
            }))
            .layer(set_request_id_layer())
    }

    /// Shared node cache, for invalidation hooks.
    pub fn cache(&self) -> NodeCache {
        self.state.pipeline.cache().clone()
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.state.config
    }

    /// Run the server until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn subscription_handler(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    state
        .pipeline
        .handle(SubRequest {
            token,
            profile: None,
            query,
            headers,
        })
        .await
}

async fn profile_subscription_handler(
    State(state): State<AppState>,
    Path((token, profile)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    state
        .pipeline
        .handle(SubRequest {
            token,
            profile: Some(profile),
            query,
            headers,
        })
        .await
}
