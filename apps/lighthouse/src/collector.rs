//! # HTTP Collector
//!
//! Fetches the target once per pass with `reqwest` and records the main
//! document. Redirects are followed by hand so every hop is recorded, and
//! response bodies are kept encoded so their size is the transfer size.

use lighthouse_core::{
    Artifacts, BoxFuture, Collector, CollectorContext, LighthouseError, LoadFailureMode,
    PassDefinition, Settings,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Artifact name of the recorded main document.
pub const MAIN_DOCUMENT: &str = "MainDocument";

/// Gatherers this collector knows how to run.
pub const GATHERERS: [&str; 1] = [MAIN_DOCUMENT];

const MAX_REDIRECTS: usize = 10;

// =============================================================================
// RECORDED DATA
// =============================================================================

/// One hop of a redirect chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectHop {
    pub url: String,
    pub status: u16,
    pub duration_ms: f64,
}

/// The final response for the requested page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MainDocument {
    /// URL the document was served from, after redirects.
    pub url: String,
    pub status: u16,
    /// Lowercased header names.
    pub headers: BTreeMap<String, String>,
    pub body_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub redirects: Vec<RedirectHop>,
    /// Time to response headers for the final hop.
    pub response_time_ms: f64,
}

// =============================================================================
// COLLECTOR
// =============================================================================

/// Collector that loads the page over plain HTTP.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpCollector;

impl HttpCollector {
    fn client(context: &CollectorContext<'_>) -> Result<reqwest::Client, LighthouseError> {
        reqwest::Client::builder()
            .user_agent(context.connection.user_agent.clone())
            .timeout(context.connection.request_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| LighthouseError::Collection(format!("Cannot build HTTP client: {e}")))
    }

    async fn fetch(
        client: &reqwest::Client,
        url: &str,
        settings: &Settings,
    ) -> Result<MainDocument, LighthouseError> {
        let mut current = url::Url::parse(url).map_err(|e| LighthouseError::InvalidTarget {
            target: url.to_string(),
            reason: e.to_string(),
        })?;
        let mut redirects = Vec::new();

        loop {
            let started = Instant::now();
            let mut request = client
                .get(current.as_str())
                .header(reqwest::header::ACCEPT_ENCODING, "gzip, deflate, br");
            for (name, value) in settings.extra_headers.iter().flatten() {
                request = request.header(name.as_str(), value.as_str());
            }
            let response = request.send().await.map_err(|e| {
                LighthouseError::Collection(format!("Request to {current} failed: {e}"))
            })?;
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
            let status = response.status();

            let location = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|value| value.to_str().ok());
            if let (true, Some(location)) = (status.is_redirection(), location) {
                if redirects.len() >= MAX_REDIRECTS {
                    return Err(LighthouseError::Collection(format!(
                        "Too many redirects loading {url}"
                    )));
                }
                let next = current.join(location).map_err(|e| {
                    LighthouseError::Collection(format!("Bad redirect from {current}: {e}"))
                })?;
                tracing::debug!(from = %current, to = %next, status = status.as_u16(), "redirect");
                redirects.push(RedirectHop {
                    url: current.to_string(),
                    status: status.as_u16(),
                    duration_ms: elapsed_ms,
                });
                current = next;
                continue;
            }

            let headers: BTreeMap<String, String> = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_string(), v.to_string()))
                })
                .collect();
            let body = response.bytes().await.map_err(|e| {
                LighthouseError::Collection(format!("Reading body of {current} failed: {e}"))
            })?;

            return Ok(MainDocument {
                url: current.to_string(),
                status: status.as_u16(),
                content_type: headers.get("content-type").cloned(),
                headers,
                body_bytes: body.len() as u64,
                redirects,
                response_time_ms: elapsed_ms,
            });
        }
    }

    async fn collect(
        url: &str,
        passes: &[PassDefinition],
        context: CollectorContext<'_>,
    ) -> Result<Artifacts, LighthouseError> {
        let client = Self::client(&context)?;
        let settings = context.settings;
        let wait = Duration::from_millis(settings.max_wait_for_load_ms);

        let mut artifacts = Artifacts::new(url, url);
        artifacts.settings = Some(settings.clone());
        artifacts.fetch_time = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        artifacts.host_user_agent = context.connection.user_agent.clone();
        artifacts.network_user_agent = context.connection.user_agent.clone();
        artifacts.benchmark_index = benchmark_index();

        let mut final_url = None;
        for pass in passes {
            tracing::info!(pass = %pass.pass_name, url, "pass started");
            let fetched = match tokio::time::timeout(wait, Self::fetch(&client, url, settings)).await
            {
                Ok(result) => result,
                Err(_) => Err(LighthouseError::Collection(format!(
                    "Page did not load within {} ms",
                    settings.max_wait_for_load_ms
                ))),
            };

            let document = match fetched {
                Ok(document) => document,
                Err(error) => match pass.load_failure_mode {
                    LoadFailureMode::Fatal => return Err(error),
                    LoadFailureMode::Warn => {
                        artifacts.run_warnings.push(format!(
                            "Pass '{}' could not load the page: {}",
                            pass.pass_name, error
                        ));
                        continue;
                    }
                    LoadFailureMode::Ignore => {
                        tracing::debug!(pass = %pass.pass_name, %error, "load failure ignored");
                        continue;
                    }
                },
            };

            if document.status >= 400 {
                artifacts.run_warnings.push(format!(
                    "The page responded with HTTP status {}. Results may not reflect the page as users see it.",
                    document.status
                ));
            }
            final_url.get_or_insert_with(|| document.url.clone());

            let value = serde_json::to_value(&document)
                .map_err(|e| LighthouseError::Serialization(e.to_string()))?;
            for gatherer in &pass.gatherers {
                if gatherer == MAIN_DOCUMENT {
                    if artifacts
                        .gathered
                        .insert(MAIN_DOCUMENT.to_string(), value.clone())
                        .is_some()
                    {
                        tracing::debug!(pass = %pass.pass_name, "main document replaced by later pass");
                    }
                } else {
                    artifacts
                        .run_warnings
                        .push(format!("Unknown gatherer '{gatherer}' was skipped"));
                }
            }
        }

        if let Some(final_url) = final_url {
            artifacts.url.final_url = final_url;
        }
        Ok(artifacts)
    }
}

impl Collector for HttpCollector {
    fn run<'a>(
        &'a self,
        url: &'a str,
        passes: &'a [PassDefinition],
        context: CollectorContext<'a>,
    ) -> BoxFuture<'a, Result<Artifacts, LighthouseError>> {
        Box::pin(Self::collect(url, passes, context))
    }
}

/// Rough host speed: fixed workloads completed per millisecond over a short window.
fn benchmark_index() -> f64 {
    let window = Duration::from_millis(20);
    let started = Instant::now();
    let mut text = String::with_capacity(512);
    let mut rounds: u64 = 0;
    while started.elapsed() < window {
        text.clear();
        for i in 0..100u32 {
            text.push_str(&i.to_string());
        }
        rounds += 1;
    }
    std::hint::black_box(&text);
    rounds as f64 / window.as_secs_f64() / 1000.0
}
