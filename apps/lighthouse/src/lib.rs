//! # lighthouse
//!
//! Command-line front end for `lighthouse-core`, plus the default
//! collaborators it runs with.
//!
//! ```text
//! cli ──▶ config ──▶ Runner (lighthouse-core)
//!                      ├─ collector   HttpCollector
//!                      ├─ store       FsStore
//!                      ├─ evaluator   BuiltinEvaluator + computed artifacts
//!                      ├─ scorer      WeightedScorer
//!                      ├─ localizer   StringTableLocalizer
//!                      ├─ renderer    ReportRenderer
//!                      └─ telemetry   TracingTelemetry
//! ```

pub mod audits;
pub mod cli;
pub mod collector;
pub mod config;
pub mod i18n;
pub mod render;
pub mod scoring;
pub mod store;
pub mod telemetry;

use lighthouse_core::{Collaborators, LighthouseError, Runner};
use std::path::PathBuf;
use std::sync::Arc;

/// The collaborators the binary runs with.
pub fn default_collaborators() -> Collaborators {
    Collaborators {
        collector: Arc::new(collector::HttpCollector),
        store: Arc::new(store::FsStore),
        evaluator: Arc::new(audits::BuiltinEvaluator),
        scorer: Arc::new(scoring::WeightedScorer),
        renderer: Arc::new(render::ReportRenderer),
        localizer: Arc::new(i18n::StringTableLocalizer),
    }
}

/// A runner wired with the default collaborators, computed artifacts and telemetry.
pub fn default_runner(cwd: impl Into<PathBuf>) -> Result<Runner, LighthouseError> {
    Ok(Runner::new(default_collaborators(), cwd)
        .with_computed_artifacts(audits::computed::registry()?)
        .with_telemetry(Arc::new(telemetry::TracingTelemetry)))
}
