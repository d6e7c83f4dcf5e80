//! Conversion backend client.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderName, USER_AGENT};
use url::Url;

use crate::config::SubconverterConfig;
use crate::observability::metrics;
use crate::subconverter::candidates::{build_candidates, endpoint_label, url_variants};
use crate::subconverter::SubconverterError;

/// Backend response headers worth passing on to clients.
const FORWARDED_HEADERS: [&str; 3] = [
    "subscription-userinfo",
    "profile-update-interval",
    "profile-web-page-url",
];

/// Target families that accept an external rule config.
const CONFIG_TARGETS: [&str; 3] = ["clash", "loon", "surge"];

/// Parameters of one conversion.
#[derive(Debug, Clone, Default)]
pub struct ConversionRequest {
    pub target: String,
    /// URL the backend pulls the raw node list from.
    pub callback_url: String,
    /// External rule config, only sent for clash/loon/surge.
    pub config: Option<String>,
    pub skip_cert_verify: bool,
    pub udp: bool,
    pub emoji: bool,
}

/// A successful conversion.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub body: String,
    /// Subset of backend headers safe to forward.
    pub headers: HeaderMap,
    pub endpoint: String,
}

/// Outcome of one attempt.
#[derive(Debug)]
pub enum Attempt {
    Success(Conversion),
    Failure { endpoint: String, error: String },
}

impl Attempt {
    pub fn endpoint(&self) -> &str {
        match self {
            Attempt::Success(c) => &c.endpoint,
            Attempt::Failure { endpoint, .. } => endpoint,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubconverterClient {
    client: reqwest::Client,
    timeout: Duration,
    deadline: Duration,
    user_agent: String,
    fallbacks: Vec<String>,
}

impl SubconverterClient {
    pub fn new(client: reqwest::Client, config: &SubconverterConfig) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(config.timeout_secs),
            deadline: Duration::from_secs(config.deadline_secs),
            user_agent: config.user_agent.clone(),
            fallbacks: config.fallbacks.clone(),
        }
    }

    /// Ordered attempts over the primary backend and the fallbacks.
    ///
    /// Each absolute URL is tried once even when several candidates expand
    /// to it. No attempt starts after the conversion deadline, and a running
    /// attempt is cut off at it.
    pub fn attempts<'a>(&'a self, primary: &str, request: &'a ConversionRequest) -> Attempts<'a> {
        let mut seen = HashSet::new();
        let urls = build_candidates(primary, &self.fallbacks)
            .iter()
            .flat_map(|c| url_variants(c))
            .filter(|url| seen.insert(url.clone()))
            .collect();
        Attempts {
            client: self,
            request,
            urls,
            deadline: Instant::now() + self.deadline,
        }
    }

    /// Try every endpoint in order and return the first success.
    pub async fn convert(
        &self,
        primary: &str,
        request: &ConversionRequest,
    ) -> Result<Conversion, SubconverterError> {
        let mut attempts = self.attempts(primary, request);
        let mut attempted = Vec::new();
        let mut last_error = None;

        while let Some(attempt) = attempts.next().await {
            attempted.push(attempt.endpoint().to_string());
            match attempt {
                Attempt::Success(conversion) => {
                    tracing::info!(
                        endpoint = %conversion.endpoint,
                        attempts = attempted.len(),
                        target = %request.target,
                        "Conversion succeeded"
                    );
                    return Ok(conversion);
                }
                Attempt::Failure { endpoint, error } => {
                    tracing::warn!(endpoint = %endpoint, error = %error, "Conversion backend failed, trying next");
                    last_error = Some(error);
                }
            }
        }

        if attempts.remaining() > 0 {
            tracing::warn!(
                untried = attempts.remaining(),
                deadline_secs = self.deadline.as_secs(),
                "Conversion deadline reached"
            );
            last_error = Some(format!(
                "conversion deadline of {}s reached with {} endpoint(s) untried",
                self.deadline.as_secs(),
                attempts.remaining()
            ));
        }

        match last_error {
            Some(last_error) => Err(SubconverterError::ConversionUnavailable {
                attempted,
                last_error,
            }),
            None => Err(SubconverterError::InvalidBackend(primary.to_string())),
        }
    }

    async fn attempt(&self, mut url: Url, request: &ConversionRequest, timeout: Duration) -> Attempt {
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("target", &request.target);
            query.append_pair("url", &request.callback_url);
            if request.skip_cert_verify {
                query.append_pair("scv", "true");
            }
            if request.udp {
                query.append_pair("udp", "true");
            }
            query.append_pair("emoji", if request.emoji { "true" } else { "false" });
            if let Some(config) = request.config.as_deref().filter(|c| !c.trim().is_empty()) {
                if CONFIG_TARGETS.contains(&request.target.as_str()) {
                    query.append_pair("config", config);
                }
            }
            query.append_pair("new_name", "true");
        }
        let endpoint = endpoint_label(&url);

        let response = match self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .timeout(timeout)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                metrics::record_subconverter_attempt("failure");
                return Attempt::Failure {
                    endpoint,
                    error: e.to_string(),
                };
            }
        };

        let status = response.status();
        let headers = forwarded_headers(response.headers());
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                metrics::record_subconverter_attempt("failure");
                return Attempt::Failure {
                    endpoint,
                    error: e.to_string(),
                };
            }
        };

        if !status.is_success() {
            metrics::record_subconverter_attempt("failure");
            return Attempt::Failure {
                error: format!("{} returned status {}: {}", endpoint, status.as_u16(), body.trim()),
                endpoint,
            };
        }

        metrics::record_subconverter_attempt("success");
        Attempt::Success(Conversion {
            body,
            headers,
            endpoint,
        })
    }
}

fn forwarded_headers(source: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::new();
    for name in FORWARDED_HEADERS {
        let name = HeaderName::from_static(name);
        if let Some(value) = source.get(&name) {
            out.insert(name, value.clone());
        }
    }
    out
}

/// Lazily issued attempts, one per endpoint.
pub struct Attempts<'a> {
    client: &'a SubconverterClient,
    request: &'a ConversionRequest,
    urls: VecDeque<Url>,
    deadline: Instant,
}

impl Attempts<'_> {
    /// Run the next attempt; `None` once every endpoint was tried or the
    /// deadline has passed.
    pub async fn next(&mut self) -> Option<Attempt> {
        let left = self.deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return None;
        }
        let url = self.urls.pop_front()?;
        let timeout = self.client.timeout.min(left);
        Some(self.client.attempt(url, self.request, timeout).await)
    }

    pub fn remaining(&self) -> usize {
        self.urls.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(fallbacks: &[&str]) -> SubconverterClient {
        SubconverterClient::new(
            reqwest::Client::new(),
            &SubconverterConfig {
                timeout_secs: 1,
                deadline_secs: 5,
                fallbacks: fallbacks.iter().map(|s| s.to_string()).collect(),
                user_agent: "test".into(),
            },
        )
    }

    #[test]
    fn test_attempt_plan() {
        let client = client(&["http://b.invalid", "a.invalid"]);
        let request = ConversionRequest::default();
        let attempts = client.attempts("a.invalid", &request);
        // a.invalid → https + http, b.invalid → http only
        assert_eq!(attempts.remaining(), 3);
    }

    #[test]
    fn test_same_url_from_two_candidates_is_tried_once() {
        let client = client(&["https://a.invalid", "http://a.invalid/sub"]);
        let request = ConversionRequest::default();
        let attempts = client.attempts("a.invalid", &request);
        assert_eq!(attempts.remaining(), 2);
    }

    #[tokio::test]
    async fn test_deadline_bounds_the_whole_conversion() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = SubconverterClient::new(
            reqwest::Client::builder().no_proxy().build().unwrap(),
            &SubconverterConfig {
                timeout_secs: 5,
                deadline_secs: 1,
                fallbacks: vec![format!("http://{}/second", addr)],
                user_agent: "test".into(),
            },
        );
        let started = Instant::now();
        let result = client
            .convert(&format!("http://{}", addr), &ConversionRequest::default())
            .await;

        assert!(started.elapsed() < Duration::from_secs(3));
        match result {
            Err(SubconverterError::ConversionUnavailable { attempted, last_error }) => {
                assert_eq!(attempted.len(), 1);
                assert!(last_error.contains("deadline"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_backends_report_every_endpoint() {
        let client = client(&["http://127.0.0.1:1"]);
        let request = ConversionRequest {
            target: "clash".into(),
            callback_url: "http://localhost/sub/x".into(),
            ..Default::default()
        };
        match client.convert("http://127.0.0.1:2/", &request).await {
            Err(SubconverterError::ConversionUnavailable { attempted, .. }) => {
                assert_eq!(attempted, vec!["http://127.0.0.1:2/sub", "http://127.0.0.1:1/sub"]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_candidates_is_invalid_backend() {
        let client = client(&[]);
        let result = client.convert("  ", &ConversionRequest::default()).await;
        assert!(matches!(result, Err(SubconverterError::InvalidBackend(_))));
    }
}
