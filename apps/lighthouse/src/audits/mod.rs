//! # Built-in Audits
//!
//! A static table of audits and the evaluator that runs them.
//!
//! Each audit reads the main document through the `MainResource` computed
//! artifact, so the document is decoded once per run no matter how many
//! audits look at it. Audits run concurrently on a `JoinSet`; results come
//! back in definition order.
//!
//! | id                      | mode    | reads                      |
//! |-------------------------|---------|----------------------------|
//! | `http-status-code`      | binary  | MainResource               |
//! | `is-on-https`           | binary  | URL, MainResource          |
//! | `redirects`             | numeric | MainResource, throttling   |
//! | `server-response-time`  | binary  | MainResource               |
//! | `total-byte-weight`     | numeric | MainResource               |
//! | `uses-text-compression` | numeric | ResponseHeaders, throttling|

pub mod computed;
mod http_status_code;
mod is_on_https;
mod redirects;
mod server_response_time;
mod total_byte_weight;
mod uses_text_compression;

pub use http_status_code::HttpStatusCode;
pub use is_on_https::IsOnHttps;
pub use redirects::Redirects;
pub use server_response_time::ServerResponseTime;
pub use total_byte_weight::TotalByteWeight;
pub use uses_text_compression::UsesTextCompression;

use crate::collector::MainDocument;
use lighthouse_core::{
    Artifacts, AuditDefinition, AuditResult, BoxFuture, ComputedArtifacts, EvaluationInput,
    Evaluator, LighthouseError, ScoreDisplayMode, Settings,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinSet;

// =============================================================================
// AUDIT INTERFACE
// =============================================================================

/// Everything an audit can look at. Owned so audits can run as tasks.
#[derive(Debug, Clone)]
pub struct AuditContext {
    pub artifacts: Arc<Artifacts>,
    pub computed: ComputedArtifacts,
    pub settings: Arc<Settings>,
    /// The audit's `options` from the config.
    pub options: Value,
}

impl AuditContext {
    /// The decoded main document.
    pub async fn main_resource(&self) -> Result<MainDocument, LighthouseError> {
        let value = self.computed.request(computed::MAIN_RESOURCE).await?;
        serde_json::from_value((*value).clone())
            .map_err(|e| LighthouseError::Evaluation(format!("Invalid main resource: {e}")))
    }

    /// A numeric option, or `default` when absent.
    pub fn option_f64(&self, key: &str, default: f64) -> f64 {
        self.options
            .get(key)
            .and_then(Value::as_f64)
            .unwrap_or(default)
    }
}

/// What an audit measured, before titles are attached.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditProduct {
    /// In `[0, 1]`.
    pub score: Option<f64>,
    pub numeric_value: Option<f64>,
    pub display_value: Option<String>,
    pub warnings: Vec<String>,
    pub details: Option<Value>,
    /// Nothing on the page for this audit to judge.
    pub not_applicable: bool,
}

/// A built-in audit.
pub trait Audit: Send + Sync {
    fn id(&self) -> &'static str;

    fn score_display_mode(&self) -> ScoreDisplayMode {
        ScoreDisplayMode::Binary
    }

    fn audit(&self, context: AuditContext) -> BoxFuture<'static, Result<AuditProduct, LighthouseError>>;
}

/// Every built-in audit, in default report order.
pub const BUILTIN_AUDITS: &[&dyn Audit] = &[
    &HttpStatusCode,
    &IsOnHttps,
    &Redirects,
    &ServerResponseTime,
    &TotalByteWeight,
    &UsesTextCompression,
];

/// Look up a built-in audit by id.
pub fn find_audit(id: &str) -> Option<&'static dyn Audit> {
    BUILTIN_AUDITS.iter().copied().find(|audit| audit.id() == id)
}

// =============================================================================
// SCORING HELPERS
// =============================================================================

/// Passing threshold used to pick between an audit's title and failure title.
pub const PASS_THRESHOLD: f64 = 0.9;

/// Score for time lost to an inefficiency, in bands.
pub fn score_for_wasted_ms(wasted_ms: f64) -> f64 {
    if wasted_ms <= 0.0 {
        1.0
    } else if wasted_ms < 300.0 {
        0.9
    } else if wasted_ms < 750.0 {
        0.5
    } else {
        0.0
    }
}

/// 1 at or below `good`, 0 at or above `poor`, linear between.
pub fn score_between(value: f64, good: f64, poor: f64) -> f64 {
    if value <= good {
        1.0
    } else if value >= poor || poor <= good {
        0.0
    } else {
        1.0 - (value - good) / (poor - good)
    }
}

fn message(id: &str, key: &str) -> String {
    format!("i18n:audit.{id}.{key}")
}

/// Attach titles and display mode to a product.
pub fn finish(audit: &dyn Audit, product: AuditProduct) -> AuditResult {
    let id = audit.id();
    let (score, mode) = if product.not_applicable {
        (None, ScoreDisplayMode::NotApplicable)
    } else {
        (
            product.score.map(|s| s.clamp(0.0, 1.0)),
            audit.score_display_mode(),
        )
    };
    let passed = score.is_none_or(|s| s >= PASS_THRESHOLD);

    AuditResult {
        id: id.to_string(),
        title: message(id, if passed { "title" } else { "failureTitle" }),
        description: message(id, "description"),
        score,
        score_display_mode: mode,
        numeric_value: product.numeric_value,
        display_value: product.display_value,
        error_message: None,
        warnings: product.warnings,
        details: product.details,
    }
}

/// Result for an audit that failed to run.
pub fn failed(id: &str, error: &LighthouseError) -> AuditResult {
    AuditResult {
        title: message(id, "title"),
        description: message(id, "description"),
        ..AuditResult::errored(id, error.to_string())
    }
}

// =============================================================================
// EVALUATOR
// =============================================================================

/// Runs the built-in audits named by the config.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinEvaluator;

impl BuiltinEvaluator {
    async fn evaluate(
        settings: &Settings,
        audits: &[AuditDefinition],
        input: EvaluationInput,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<AuditResult>, LighthouseError> {
        let settings = Arc::new(settings.clone());
        let mut results: Vec<Option<AuditResult>> = vec![None; audits.len()];
        let mut tasks = JoinSet::new();

        for (index, definition) in audits.iter().enumerate() {
            let Some(audit) = find_audit(&definition.id) else {
                warnings.push(format!("Unknown audit '{}' was skipped", definition.id));
                results[index] = Some(AuditResult::errored(
                    definition.id.clone(),
                    format!("Unknown audit '{}'", definition.id),
                ));
                continue;
            };
            let context = AuditContext {
                artifacts: Arc::clone(&input.artifacts),
                computed: input.computed.clone(),
                settings: Arc::clone(&settings),
                options: definition.options.clone(),
            };
            tasks.spawn(async move {
                let result = match audit.audit(context).await {
                    Ok(product) => finish(audit, product),
                    Err(error) => {
                        tracing::warn!(audit = audit.id(), %error, "audit failed");
                        failed(audit.id(), &error)
                    }
                };
                (index, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(error) => tracing::error!(%error, "audit task aborted"),
            }
        }

        Ok(results
            .into_iter()
            .zip(audits)
            .map(|(result, definition)| {
                result.unwrap_or_else(|| {
                    failed(
                        &definition.id,
                        &LighthouseError::Evaluation("Audit did not complete".to_string()),
                    )
                })
            })
            .collect())
    }
}

impl Evaluator for BuiltinEvaluator {
    fn run<'a>(
        &'a self,
        settings: &'a Settings,
        audits: &'a [AuditDefinition],
        input: EvaluationInput,
        warnings: &'a mut Vec<String>,
    ) -> BoxFuture<'a, Result<Vec<AuditResult>, LighthouseError>> {
        Box::pin(Self::evaluate(settings, audits, input, warnings))
    }
}

// =============================================================================
// TESTS
// =============================================================================
