//! # Collaborator Interfaces
//!
//! Everything the orchestrator calls but does not implement. Callers inject
//! trait objects; the orchestrator only sequences them.
//!
//! Async collaborators return [`BoxFuture`] so they stay object safe.
//! Scorer, Renderer, Localizer and TelemetrySink are synchronous.

use crate::computed::ComputedArtifacts;
use crate::types::{
    Artifacts, AuditDefinition, AuditResult, CategoryDefinition, CategoryScore, OutputMode,
    PassDefinition, ReportRecord, Settings,
};
use crate::LighthouseError;
use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// =============================================================================
// CONNECTION
// =============================================================================

/// Connection parameters handed through to the collector.
///
/// Acquired by the caller; the orchestrator never inspects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionHandle {
    pub user_agent: String,
    pub request_timeout: Duration,
}

impl Default for ConnectionHandle {
    fn default() -> Self {
        Self {
            user_agent: concat!("lighthouse-rs/", env!("CARGO_PKG_VERSION")).to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Per-run inputs for the collector besides the URL and passes.
#[derive(Debug, Clone, Copy)]
pub struct CollectorContext<'a> {
    pub settings: &'a Settings,
    pub connection: &'a ConnectionHandle,
}

// =============================================================================
// COLLECTOR / STORE
// =============================================================================

/// Drives the page and returns raw artifacts.
pub trait Collector: Send + Sync {
    fn run<'a>(
        &'a self,
        url: &'a str,
        passes: &'a [PassDefinition],
        context: CollectorContext<'a>,
    ) -> BoxFuture<'a, Result<Artifacts, LighthouseError>>;
}

/// Persists artifact sets to, and loads them from, a directory.
pub trait Store: Send + Sync {
    fn load<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<Artifacts, LighthouseError>>;

    fn save<'a>(
        &'a self,
        artifacts: &'a Artifacts,
        path: &'a Path,
    ) -> BoxFuture<'a, Result<(), LighthouseError>>;
}

// =============================================================================
// EVALUATOR / SCORER
// =============================================================================

/// What the evaluator sees: raw artifacts plus the run's computed artifacts.
#[derive(Debug, Clone)]
pub struct EvaluationInput {
    pub artifacts: Arc<Artifacts>,
    pub computed: ComputedArtifacts,
}

/// Runs audits against artifacts.
pub trait Evaluator: Send + Sync {
    /// Non-fatal problems go into `warnings`.
    fn run<'a>(
        &'a self,
        settings: &'a Settings,
        audits: &'a [AuditDefinition],
        input: EvaluationInput,
        warnings: &'a mut Vec<String>,
    ) -> BoxFuture<'a, Result<Vec<AuditResult>, LighthouseError>>;
}

/// Aggregates audit results into category scores.
pub trait Scorer: Send + Sync {
    fn score_all_categories(
        &self,
        categories: &BTreeMap<String, CategoryDefinition>,
        results_by_id: &BTreeMap<String, AuditResult>,
    ) -> Result<BTreeMap<String, CategoryScore>, LighthouseError>;
}

// =============================================================================
// RENDERER / LOCALIZER
// =============================================================================

/// Turns a report record into its output format.
pub trait Renderer: Send + Sync {
    fn generate_report(
        &self,
        record: &ReportRecord,
        output: OutputMode,
    ) -> Result<String, LighthouseError>;
}

/// Locale-specific strings for a report.
pub trait Localizer: Send + Sync {
    /// Strings the renderer needs for its own chrome.
    fn formatted_strings(&self, locale: &str) -> BTreeMap<String, String>;

    /// Replace message placeholders in `record` in place.
    ///
    /// Returns message id -> report paths where it was substituted.
    fn replace_placeholders(
        &self,
        record: &mut ReportRecord,
        locale: &str,
    ) -> Result<BTreeMap<String, Vec<String>>, LighthouseError>;
}

// =============================================================================
// TELEMETRY
// =============================================================================

/// Context attached to telemetry events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryMeta {
    pub phase: String,
    pub fatal: bool,
    pub url: Option<String>,
}

/// Receives run failures and progress breadcrumbs.
pub trait TelemetrySink: Send + Sync {
    fn capture_exception(&self, error: &LighthouseError, meta: &TelemetryMeta);

    fn capture_breadcrumb(&self, meta: &TelemetryMeta);
}

/// Telemetry sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn capture_exception(&self, _error: &LighthouseError, _meta: &TelemetryMeta) {}

    fn capture_breadcrumb(&self, _meta: &TelemetryMeta) {}
}
