//! Subscription resolution and delivery.
//!
//! # Data Flow
//! ```text
//! GET /sub/<token>[/<profile>]
//!     → load store snapshot
//!     → disguise gate (browser, not callback, not authenticated)
//!     → context.rs (token check, profile lookup → Plan)
//!     → NodeCache::resolve (aggregate on miss/refresh; expired profiles bypass it)
//!     → format.rs (target param → flags → User-Agent → base64)
//!     → deliver:
//!         base64                  → response.rs base64 list
//!         callback re-entry       → response.rs base64 list
//!         otherwise               → subconverter, degrade on failure
//!     → log: notification, access log, download counter (detached)
//! ```

pub mod callback;
pub mod context;
pub mod error;
pub mod format;
pub mod response;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::http::header::{HOST, USER_AGENT};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use chrono::Utc;

use crate::aggregator::Aggregator;
use crate::cache::{CacheStatus, Lookup, NodeCache};
use crate::config::CallbackConfig;
use crate::lifecycle::spawn_detached;
use crate::observability::metrics;
use crate::services::{AccessLogger, AccessMessage, AccessRecord, AuthService, Notifier};
use crate::store::{self, ConfigStore, Settings, Snapshot};
use crate::subconverter::{ConversionRequest, SubconverterClient};

pub use context::{RequestContext, Resolution};
pub use error::PipelineError;

/// One inbound subscription request.
#[derive(Debug, Clone, Default)]
pub struct SubRequest {
    pub token: String,
    pub profile: Option<String>,
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
}

impl SubRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    fn user_agent(&self) -> &str {
        self.header(USER_AGENT.as_str()).unwrap_or("Unknown")
    }

    fn request_id(&self) -> &str {
        self.header("x-request-id").unwrap_or("unknown")
    }

    fn client_ip(&self) -> String {
        self.header("cf-connecting-ip")
            .or_else(|| self.header("x-forwarded-for").and_then(|v| v.split(',').next()))
            .or_else(|| self.header("x-real-ip"))
            .map(|v| v.trim().to_string())
            .unwrap_or_else(|| "N/A".to_string())
    }

    fn domain(&self) -> String {
        self.header(HOST.as_str())
            .map(|h| h.rsplit_once(':').map_or(h, |(host, _)| host).to_string())
            .unwrap_or_default()
    }

    /// Requests made by a conversion backend through a callback URL.
    fn is_callback(&self) -> bool {
        self.query.contains_key("callback_token")
    }

    fn force_refresh(&self) -> bool {
        self.query.contains_key("refresh") || self.query.contains_key("nocache")
    }
}

/// How a delivered response came about.
enum Delivery {
    Direct,
    Converted,
    Degraded(String),
}

/// The end-to-end subscription pipeline.
pub struct Pipeline {
    store: Arc<dyn ConfigStore>,
    cache: NodeCache,
    aggregator: Aggregator,
    subconverter: SubconverterClient,
    auth: Arc<dyn AuthService>,
    notifier: Arc<dyn Notifier>,
    access_log: Arc<dyn AccessLogger>,
    callback_token: String,
    public_url: Option<String>,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn ConfigStore>,
        cache: NodeCache,
        aggregator: Aggregator,
        subconverter: SubconverterClient,
        auth: Arc<dyn AuthService>,
        notifier: Arc<dyn Notifier>,
        access_log: Arc<dyn AccessLogger>,
        callback: &CallbackConfig,
    ) -> Self {
        Self {
            store,
            cache,
            aggregator,
            subconverter,
            auth,
            notifier,
            access_log,
            callback_token: callback::callback_token(&callback.secret),
            public_url: callback.public_url.clone(),
        }
    }

    pub fn cache(&self) -> &NodeCache {
        &self.cache
    }

    pub fn store(&self) -> &Arc<dyn ConfigStore> {
        &self.store
    }

    pub async fn handle(&self, request: SubRequest) -> Response {
        let start = Instant::now();
        match self.run(&request, start).await {
            Ok(response) => response,
            Err(e) => {
                match &e {
                    PipelineError::Forbidden | PipelineError::NotFound => {
                        tracing::debug!(request_id = %request.request_id(), error = %e, "Subscription request rejected");
                    }
                    _ => {
                        tracing::warn!(request_id = %request.request_id(), error = %e, "Subscription request failed");
                    }
                }
                metrics::record_request("none", e.outcome(), start);
                e.into_response()
            }
        }
    }

    async fn run(&self, request: &SubRequest, start: Instant) -> Result<Response, PipelineError> {
        let snapshot = Snapshot::load(self.store.as_ref()).await?;
        let settings = &snapshot.settings;
        let user_agent = request.user_agent();
        let is_callback = request.is_callback();
        let is_authenticated = self.auth.is_authenticated(&request.headers);

        if settings.disguise.enabled
            && format::is_browser(user_agent)
            && !is_callback
            && !is_authenticated
        {
            tracing::debug!(request_id = %request.request_id(), "Serving disguise page to browser");
            metrics::record_request("none", "disguise", start);
            return Ok(response::disguise(&settings.disguise));
        }

        let ctx = RequestContext {
            token: request.token.clone(),
            profile_identifier: request.profile.clone(),
            is_authenticated,
        };
        let resolution = context::resolve(&ctx, &snapshot, Utc::now())?;

        if resolution.is_profile() && !is_callback && settings.enable_access_log {
            self.bump_download_count(resolution.key.id.clone());
        }

        let target = format::negotiate(&request.query, user_agent);
        let emoji = resolution.plan.transform.wants_emoji();

        // Expiry outranks whatever was cached before the profile expired.
        let lookup = if resolution.plan.expired {
            Lookup {
                list: Arc::new(self.aggregator.aggregate(&resolution.plan).await),
                status: CacheStatus::Miss,
            }
        } else {
            let aggregator = self.aggregator.clone();
            let plan = resolution.plan.clone();
            self.cache
                .resolve(resolution.key.clone(), request.force_refresh(), move || async move {
                    aggregator.aggregate(&plan).await
                })
                .await
        };
        let nodes = &lookup.list.nodes;

        tracing::debug!(
            request_id = %request.request_id(),
            kind = ?resolution.key.kind,
            id = %resolution.key.id,
            target = %target,
            nodes = nodes.len(),
            cache = lookup.status.as_str(),
            "Node list resolved"
        );

        let (response, delivery) = if target == format::BASE64 {
            (response::base64_list(nodes, lookup.status), Delivery::Direct)
        } else if request.query.get("callback_token") == Some(&self.callback_token) {
            (response::base64_list(nodes, lookup.status), Delivery::Direct)
        } else {
            let conversion = ConversionRequest {
                target: target.clone(),
                callback_url: self.callback_url(request),
                config: Some(resolution.sub_config.clone()),
                skip_cert_verify: settings.sub_converter_scv,
                udp: settings.sub_converter_udp,
                emoji,
            };
            match self.convert(request, &resolution, conversion, nodes, lookup.status).await {
                Ok(delivered) => delivered,
                Err(e) => {
                    if !is_callback && settings.enable_access_log {
                        let mut record =
                            self.access_record(request, &resolution, &target, 0, lookup.status);
                        record.error = Some(e.to_string());
                        self.access_log.log_error(&record);
                    }
                    return Err(e);
                }
            }
        };

        if !is_callback {
            let (title, delivered_format) = match &delivery {
                Delivery::Degraded(_) if !format::wants_yaml_stub(&target) => {
                    ("*Subscription accessed* (fallback)", format::BASE64)
                }
                Delivery::Degraded(_) => ("*Subscription accessed* (fallback)", target.as_str()),
                _ => ("*Subscription accessed*", target.as_str()),
            };
            self.notify(settings, request, &resolution, title, delivered_format);

            if settings.enable_access_log {
                let mut record =
                    self.access_record(request, &resolution, &target, nodes.len(), lookup.status);
                match &delivery {
                    Delivery::Degraded(error) => {
                        record.error = Some(error.clone());
                        self.access_log.log_error(&record);
                    }
                    _ => self.access_log.log_success(&record),
                }
            }
        }

        let outcome = match delivery {
            Delivery::Direct => "direct",
            Delivery::Converted => "converted",
            Delivery::Degraded(_) => "degraded",
        };
        metrics::record_request(&target, outcome, start);
        Ok(response)
    }

    fn callback_url(&self, request: &SubRequest) -> String {
        let base = callback::public_base(self.public_url.as_deref(), &request.headers);
        callback::callback_url(
            &base,
            &request.token,
            request.profile.as_deref(),
            &self.callback_token,
        )
    }

    /// Convert through the backends, degrading to the raw list on failure.
    async fn convert(
        &self,
        request: &SubRequest,
        resolution: &Resolution,
        conversion: ConversionRequest,
        nodes: &[String],
        cache: CacheStatus,
    ) -> Result<(Response, Delivery), PipelineError> {
        if resolution.sub_converter.trim().is_empty() {
            return Err(PipelineError::Misconfigured);
        }

        match self
            .subconverter
            .convert(&resolution.sub_converter, &conversion)
            .await
        {
            Ok(converted) => Ok((
                response::converted(converted, &resolution.display_name, cache),
                Delivery::Converted,
            )),
            Err(e) if nodes.is_empty() => Err(PipelineError::ConversionUnavailable(e)),
            Err(e) => {
                let error = e.to_string();
                tracing::warn!(
                    request_id = %request.request_id(),
                    target = %conversion.target,
                    error = %error,
                    "Conversion unavailable, serving degraded response"
                );
                Ok((
                    response::fallback(&conversion.target, nodes, &error, cache),
                    Delivery::Degraded(error),
                ))
            }
        }
    }

    fn bump_download_count(&self, identifier: String) {
        let store = self.store.clone();
        spawn_detached("download-count", async move {
            match store::increment_download_count(store.as_ref(), &identifier).await {
                Ok(Some(count)) => {
                    tracing::debug!(profile = %identifier, count, "Download count updated");
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(profile = %identifier, error = %e, "Failed to update download count");
                }
            }
        });
    }

    fn notify(
        &self,
        settings: &Settings,
        request: &SubRequest,
        resolution: &Resolution,
        title: &str,
        format: &str,
    ) {
        let notifier = self.notifier.clone();
        let settings = settings.clone();
        let message = AccessMessage {
            title: title.to_string(),
            client_ip: request.client_ip(),
            domain: request.domain(),
            user_agent: request.user_agent().to_string(),
            format: format.to_string(),
            subscription: resolution.display_name.clone(),
        };
        spawn_detached("access-notification", async move {
            notifier.notify_access(&settings, &message).await;
        });
    }

    fn access_record(
        &self,
        request: &SubRequest,
        resolution: &Resolution,
        target: &str,
        nodes: usize,
        cache: CacheStatus,
    ) -> AccessRecord {
        AccessRecord {
            request_id: request.request_id().to_string(),
            client_ip: request.client_ip(),
            user_agent: request.user_agent().to_string(),
            domain: request.domain(),
            format: target.to_string(),
            kind: if resolution.is_profile() { "profile" } else { "token" },
            identifier: resolution.key.id.clone(),
            subscription: resolution.display_name.clone(),
            nodes,
            cache_status: cache.as_str(),
            error: None,
        }
    }
}
