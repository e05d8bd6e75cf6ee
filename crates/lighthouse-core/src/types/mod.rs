//! # Core Type Definitions
//!
//! This module contains all data types that flow through a run:
//! - Run settings and configuration (`Settings`, `Config` and definitions)
//! - Collected data (`Artifacts`, `UrlRecord`)
//! - Evaluation output (`AuditResult`, `CategoryScore`)
//! - The final report (`ReportRecord`)
//! - Error types (`LighthouseError`)
//!
//! ## Serialization
//!
//! Wire names are camelCase, except the reserved artifact keys (`URL`,
//! `HostUserAgent`, ...) which keep the names used by persisted artifact sets.
//! Every keyed collection is a `BTreeMap` so reports serialize in a stable order.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

// =============================================================================
// RUN MODES
// =============================================================================

/// A run-mode flag: `false`, `true`, or a directory path.
///
/// Serialized exactly like the settings file spells it (`false | true | "path"`).
/// An empty path string reads as `Off`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "RawModeFlag", into = "RawModeFlag")]
pub enum ModeFlag {
    #[default]
    Off,
    On,
    Path(String),
}

impl ModeFlag {
    /// `On` and any non-empty `Path` are truthy.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            ModeFlag::Off => false,
            ModeFlag::On => true,
            ModeFlag::Path(path) => !path.is_empty(),
        }
    }

    /// The directory named by this flag, if any.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        match self {
            ModeFlag::Path(path) if !path.is_empty() => Some(path),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawModeFlag {
    Bool(bool),
    Path(String),
}

impl From<RawModeFlag> for ModeFlag {
    fn from(raw: RawModeFlag) -> Self {
        match raw {
            RawModeFlag::Bool(false) => ModeFlag::Off,
            RawModeFlag::Bool(true) => ModeFlag::On,
            RawModeFlag::Path(path) if path.is_empty() => ModeFlag::Off,
            RawModeFlag::Path(path) => ModeFlag::Path(path),
        }
    }
}

impl From<ModeFlag> for RawModeFlag {
    fn from(flag: ModeFlag) -> Self {
        match flag {
            ModeFlag::Off => RawModeFlag::Bool(false),
            ModeFlag::On => RawModeFlag::Bool(true),
            ModeFlag::Path(path) => RawModeFlag::Path(path),
        }
    }
}

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    #[default]
    Json,
    Html,
}

impl OutputMode {
    /// File extension used when writing a report of this format.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            OutputMode::Json => "json",
            OutputMode::Html => "html",
        }
    }
}

impl std::str::FromStr for OutputMode {
    type Err = LighthouseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(OutputMode::Json),
            "html" => Ok(OutputMode::Html),
            other => Err(LighthouseError::Config(format!(
                "Unknown output format '{}' (expected json or html)",
                other
            ))),
        }
    }
}

// =============================================================================
// SETTINGS
// =============================================================================

/// Device class being emulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormFactor {
    #[default]
    Mobile,
    Desktop,
}

/// How network and CPU throttling is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThrottlingMethod {
    Devtools,
    #[default]
    Simulate,
    Provided,
}

/// Throttling parameters. Defaults describe a slow 4G connection on a mid-tier phone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Throttling {
    pub rtt_ms: f64,
    pub throughput_kbps: f64,
    pub request_latency_ms: f64,
    pub download_throughput_kbps: f64,
    pub upload_throughput_kbps: f64,
    pub cpu_slowdown_multiplier: f64,
}

impl Default for Throttling {
    fn default() -> Self {
        Self {
            rtt_ms: 150.0,
            throughput_kbps: 1638.4,
            request_latency_ms: 562.5,
            download_throughput_kbps: 1474.56,
            upload_throughput_kbps: 675.0,
            cpu_slowdown_multiplier: 4.0,
        }
    }
}

/// Flat run settings.
///
/// `gather_mode`, `audit_mode` and `output` select what a run does; every
/// other field affects what gets measured and must match between a
/// collection phase and a later evaluation of its artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub gather_mode: ModeFlag,
    pub audit_mode: ModeFlag,
    pub output: OutputMode,
    pub locale: String,
    pub form_factor: FormFactor,
    pub throttling_method: ThrottlingMethod,
    pub throttling: Throttling,
    pub max_wait_for_load_ms: u64,
    pub disable_storage_reset: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_headers: Option<BTreeMap<String, String>>,
    pub blocked_url_patterns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub only_audits: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_audits: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub only_categories: Option<Vec<String>>,
    pub channel: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gather_mode: ModeFlag::Off,
            audit_mode: ModeFlag::Off,
            output: OutputMode::Json,
            locale: "en-US".to_string(),
            form_factor: FormFactor::Mobile,
            throttling_method: ThrottlingMethod::Simulate,
            throttling: Throttling::default(),
            max_wait_for_load_ms: 45_000,
            disable_storage_reset: false,
            extra_headers: None,
            blocked_url_patterns: Vec::new(),
            only_audits: None,
            skip_audits: None,
            only_categories: None,
            channel: "node".to_string(),
        }
    }
}

// =============================================================================
// CONFIG
// =============================================================================

/// What the collector does when a pass fails to load the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadFailureMode {
    #[default]
    Fatal,
    Warn,
    Ignore,
}

/// A single configured collection cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassDefinition {
    pub pass_name: String,
    #[serde(default)]
    pub gatherers: Vec<String>,
    #[serde(default)]
    pub load_failure_mode: LoadFailureMode,
}

/// A configured audit. `options` is handed to the audit untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditDefinition {
    pub id: String,
    #[serde(default)]
    pub options: Value,
}

impl AuditDefinition {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            options: Value::Null,
        }
    }
}

/// Weighted reference from a category to an audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRef {
    pub id: String,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// A weighted grouping of audits. Keyed by category id in [`Config::categories`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDefinition {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_description: Option<String>,
    pub audit_refs: Vec<AuditRef>,
}

/// Display grouping for audit refs inside a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDefinition {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A full run configuration.
///
/// `passes` is required when collecting and `audits` when evaluating; the
/// orchestrator checks this before the corresponding phase starts.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passes: Option<Vec<PassDefinition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audits: Option<Vec<AuditDefinition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<BTreeMap<String, CategoryDefinition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<BTreeMap<String, GroupDefinition>>,
}

// =============================================================================
// ARTIFACTS
// =============================================================================

/// The requested and final (post-redirect) URL of a collection run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlRecord {
    pub requested_url: String,
    pub final_url: String,
}

/// Raw data produced by a collection run.
///
/// Immutable once produced: the evaluation phase shares it behind an `Arc`
/// and only derives from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifacts {
    #[serde(rename = "URL")]
    pub url: UrlRecord,
    /// Settings snapshot recorded at collection time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
    #[serde(rename = "fetchTime", default)]
    pub fetch_time: String,
    #[serde(rename = "HostUserAgent", default)]
    pub host_user_agent: String,
    #[serde(rename = "NetworkUserAgent", default)]
    pub network_user_agent: String,
    #[serde(rename = "BenchmarkIndex", default)]
    pub benchmark_index: f64,
    /// Non-fatal collection problems. Older artifact files spell the key `RunWarnings`.
    #[serde(rename = "LighthouseRunWarnings", alias = "RunWarnings", default)]
    pub run_warnings: Vec<String>,
    /// Gatherer output, keyed by artifact name.
    #[serde(flatten)]
    pub gathered: BTreeMap<String, Value>,
}

impl Artifacts {
    /// Create an artifact set for a page with no gathered data yet.
    #[must_use]
    pub fn new(requested_url: impl Into<String>, final_url: impl Into<String>) -> Self {
        Self {
            url: UrlRecord {
                requested_url: requested_url.into(),
                final_url: final_url.into(),
            },
            settings: None,
            fetch_time: String::new(),
            host_user_agent: String::new(),
            network_user_agent: String::new(),
            benchmark_index: 0.0,
            run_warnings: Vec::new(),
            gathered: BTreeMap::new(),
        }
    }

    /// Add a gathered artifact.
    #[must_use]
    pub fn with_artifact(mut self, name: impl Into<String>, value: Value) -> Self {
        self.gathered.insert(name.into(), value);
        self
    }

    /// Look up a gathered artifact by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.gathered.get(name)
    }
}

// =============================================================================
// AUDIT RESULTS
// =============================================================================

/// How an audit's score should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScoreDisplayMode {
    #[default]
    Numeric,
    Binary,
    Manual,
    Informative,
    NotApplicable,
    Error,
}

/// Output of a single audit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditResult {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub score: Option<f64>,
    #[serde(default)]
    pub score_display_mode: ScoreDisplayMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl AuditResult {
    /// A result carrying only an id and a score.
    #[must_use]
    pub fn scored(id: impl Into<String>, score: f64) -> Self {
        Self {
            id: id.into(),
            score: Some(score),
            ..Self::default()
        }
    }

    /// A result for an audit that could not run.
    #[must_use]
    pub fn errored(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            score: None,
            score_display_mode: ScoreDisplayMode::Error,
            error_message: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Aggregate score of a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScore {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_description: Option<String>,
    pub audit_refs: Vec<AuditRef>,
    pub score: Option<f64>,
}

// =============================================================================
// REPORT RECORD
// =============================================================================

/// Host and network environment the artifacts were collected in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub network_user_agent: String,
    pub host_user_agent: String,
    pub benchmark_index: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    /// Wall-clock milliseconds from run start to assembly.
    pub total: f64,
}

/// Localization bookkeeping for later re-rendering in another locale.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct I18nBlock {
    pub renderer_formatted_strings: BTreeMap<String, String>,
    /// Message id -> every report path where that message was substituted.
    pub icu_message_paths: BTreeMap<String, Vec<String>>,
}

/// The final structured output of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRecord {
    pub user_agent: String,
    pub environment: Environment,
    pub lighthouse_version: String,
    pub fetch_time: String,
    pub requested_url: String,
    pub final_url: String,
    pub run_warnings: Vec<String>,
    pub audits: BTreeMap<String, AuditResult>,
    pub config_settings: Settings,
    pub categories: BTreeMap<String, CategoryScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_groups: Option<BTreeMap<String, GroupDefinition>>,
    pub timing: Timing,
    pub i18n: I18nBlock,
}

impl ReportRecord {
    /// Visit every user-facing string in the record with its report path.
    ///
    /// Paths use the `audits[id].title` form recorded in `i18n.icuMessagePaths`.
    pub fn for_each_message_mut(&mut self, f: &mut dyn FnMut(&str, &mut String)) {
        for (id, audit) in &mut self.audits {
            f(&format!("audits[{}].title", id), &mut audit.title);
            f(&format!("audits[{}].description", id), &mut audit.description);
            if let Some(display) = audit.display_value.as_mut() {
                f(&format!("audits[{}].displayValue", id), display);
            }
            if let Some(message) = audit.error_message.as_mut() {
                f(&format!("audits[{}].errorMessage", id), message);
            }
            for (i, warning) in audit.warnings.iter_mut().enumerate() {
                f(&format!("audits[{}].warnings[{}]", id, i), warning);
            }
        }

        for (id, category) in &mut self.categories {
            f(&format!("categories[{}].title", id), &mut category.title);
            if let Some(description) = category.description.as_mut() {
                f(&format!("categories[{}].description", id), description);
            }
            if let Some(manual) = category.manual_description.as_mut() {
                f(&format!("categories[{}].manualDescription", id), manual);
            }
        }

        if let Some(groups) = self.category_groups.as_mut() {
            for (id, group) in groups {
                f(&format!("categoryGroups[{}].title", id), &mut group.title);
                if let Some(description) = group.description.as_mut() {
                    f(&format!("categoryGroups[{}].description", id), description);
                }
            }
        }

        for (i, warning) in self.run_warnings.iter_mut().enumerate() {
            f(&format!("runWarnings[{}]", i), warning);
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can end a run.
///
/// - Validation errors are raised before the phase they guard has any side effect
/// - Collaborator failures travel through unchanged
/// - `Clone` so a failed computed artifact can be handed to every requester
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LighthouseError {
    /// Collection was requested but the config has no passes.
    #[error("No browser artifacts are either provided or requested: config has no passes")]
    MissingPassesConfig,

    /// Collection was requested without a target URL.
    #[error("Collection requires a target URL")]
    MissingTarget,

    /// The target could not be parsed as an absolute URL.
    #[error("Invalid target URL '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    /// Evaluation was requested but the config has no audits.
    #[error("No audits to evaluate: config has no audits")]
    MissingAuditsConfig,

    /// The target of this run differs from the one the artifacts were collected for.
    #[error("Cannot audit '{requested}' with artifacts collected for '{recorded}'")]
    TargetMismatch { requested: String, recorded: String },

    /// Settings changed between collection and evaluation.
    #[error("Cannot change settings between gathering and auditing: {}", fields.join(", "))]
    SettingsMismatch { fields: Vec<String> },

    /// A computed artifact requested itself while resolving.
    #[error("Circular computed artifact dependency: {}", chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },

    /// No computed artifact is registered under this name.
    #[error("Unknown computed artifact: {0}")]
    UnknownComputedArtifact(String),

    /// A computed artifact name was registered twice.
    #[error("Computed artifact registered twice: {0}")]
    DuplicateComputedArtifact(String),

    #[error("Collection failed: {0}")]
    Collection(String),

    #[error("Artifact store error: {0}")]
    Store(String),

    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    #[error("Scoring failed: {0}")]
    Scoring(String),

    #[error("Rendering failed: {0}")]
    Render(String),

    #[error("Localization failed: {0}")]
    Localization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

// =============================================================================
// TESTS
// =============================================================================
