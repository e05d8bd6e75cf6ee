//! # lighthouse-core
//!
//! The pipeline orchestrator for page audits - THE SEQUENCER.
//!
//! A run turns "collect data about a page" into "a scored, localized report".
//! This crate owns how that run is sequenced, validated and assembled; it does
//! not measure pages, judge audits or render reports.
//!
//! ## Components
//!
//! - `mode` - which phases run, and where artifacts live
//! - `guard` - whether loaded artifacts may be evaluated under current settings
//! - `computed` - lazy, memoized derivations over raw artifacts
//! - `assembler` - merging partial outputs into a `ReportRecord`
//! - `runner` - the phase state machine tying it together
//!
//! ## Collaborators
//!
//! Collection, storage, evaluation, scoring, rendering, localization and
//! telemetry are traits in `collaborators`, injected by the caller.

// =============================================================================
// MODULES
// =============================================================================

pub mod assembler;
pub mod collaborators;
pub mod computed;
pub mod guard;
pub mod mode;
pub mod runner;
pub mod target;
pub mod types;

/// Version stamped into every report.
pub const LIGHTHOUSE_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Artifacts, AuditDefinition, AuditRef, AuditResult, CategoryDefinition, CategoryScore, Config,
    Environment, FormFactor, GroupDefinition, I18nBlock, LighthouseError, LoadFailureMode,
    ModeFlag, OutputMode, PassDefinition, ReportRecord, ScoreDisplayMode, Settings, Throttling,
    ThrottlingMethod, Timing, UrlRecord,
};

// =============================================================================
// RE-EXPORTS: Orchestration
// =============================================================================

pub use collaborators::{
    BoxFuture, Collector, CollectorContext, ConnectionHandle, EvaluationInput, Evaluator,
    Localizer, NoopTelemetry, Renderer, Scorer, Store, TelemetryMeta, TelemetrySink,
};
pub use computed::{ComputeFn, ComputedArtifactRegistry, ComputedArtifacts, SlotState};
pub use mode::{DEFAULT_ARTIFACTS_DIR, RunPhases, resolve_artifacts_path, should_audit, should_gather};
pub use runner::{Collaborators, RunOptions, RunOutcome, RunPhase, Runner};
