//! # Pipeline Orchestrator
//!
//! Sequences one run through its phases:
//!
//! ```text
//! Idle ─▶ Collecting ─▶ (Persisting) ─┬─▶ Evaluating ─▶ Scoring ─▶ Assembling
//!   └───▶ Loading ────────────────────┘        ─▶ Localizing ─▶ Rendering ─▶ Done
//!
//! any phase ──error──▶ Failed
//! ```
//!
//! Phases never overlap and nothing is retried. A failure is reported to the
//! telemetry sink once, tagged fatal with the phase it happened in, and then
//! returned to the caller unchanged. Artifacts already persisted stay on disk.

use crate::assembler::{AssemblyInput, assemble, localize, results_by_id};
use crate::collaborators::{
    Collector, CollectorContext, ConnectionHandle, EvaluationInput, Evaluator, Localizer,
    NoopTelemetry, Renderer, Scorer, Store, TelemetryMeta, TelemetrySink,
};
use crate::computed::ComputedArtifactRegistry;
use crate::mode::{RunPhases, resolve_artifacts_path};
use crate::types::{Artifacts, Config, ReportRecord};
use crate::{LighthouseError, guard, target};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

// =============================================================================
// RUN STATE
// =============================================================================

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Collecting,
    Persisting,
    Loading,
    Evaluating,
    Scoring,
    Assembling,
    Localizing,
    Rendering,
    Done,
    Failed,
}

impl RunPhase {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::Collecting => "collecting",
            RunPhase::Persisting => "persisting",
            RunPhase::Loading => "loading",
            RunPhase::Evaluating => "evaluating",
            RunPhase::Scoring => "scoring",
            RunPhase::Assembling => "assembling",
            RunPhase::Localizing => "localizing",
            RunPhase::Rendering => "rendering",
            RunPhase::Done => "done",
            RunPhase::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Tracks the current phase and leaves a breadcrumb on every transition.
struct Progress<'a> {
    phase: RunPhase,
    telemetry: &'a dyn TelemetrySink,
    url: Option<String>,
}

impl<'a> Progress<'a> {
    fn new(telemetry: &'a dyn TelemetrySink, url: Option<String>) -> Self {
        Self {
            phase: RunPhase::Idle,
            telemetry,
            url,
        }
    }

    fn enter(&mut self, phase: RunPhase) {
        tracing::info!(from = %self.phase, to = %phase, "run phase");
        self.phase = phase;
        self.telemetry.capture_breadcrumb(&self.meta(false));
    }

    fn meta(&self, fatal: bool) -> TelemetryMeta {
        TelemetryMeta {
            phase: self.phase.to_string(),
            fatal,
            url: self.url.clone(),
        }
    }
}

// =============================================================================
// RUNNER
// =============================================================================

/// The injected collaborators of a runner.
#[derive(Clone)]
pub struct Collaborators {
    pub collector: Arc<dyn Collector>,
    pub store: Arc<dyn Store>,
    pub evaluator: Arc<dyn Evaluator>,
    pub scorer: Arc<dyn Scorer>,
    pub renderer: Arc<dyn Renderer>,
    pub localizer: Arc<dyn Localizer>,
}

/// Inputs of a single run.
#[derive(Clone)]
pub struct RunOptions {
    pub config: Config,
    /// The page to collect, or to check loaded artifacts against.
    pub target: Option<String>,
    /// Replaces the runner's collector for this run only.
    pub collector_override: Option<Arc<dyn Collector>>,
}

impl RunOptions {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            target: None,
            collector_override: None,
        }
    }

    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    #[must_use]
    pub fn with_collector(mut self, collector: Arc<dyn Collector>) -> Self {
        self.collector_override = Some(collector);
        self
    }
}

/// A completed run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: ReportRecord,
    pub artifacts: Arc<Artifacts>,
    pub rendered: String,
}

/// Sequences collection, persistence, evaluation, scoring, assembly,
/// localization and rendering for one run at a time.
pub struct Runner {
    collaborators: Collaborators,
    computed: ComputedArtifactRegistry,
    telemetry: Arc<dyn TelemetrySink>,
    cwd: PathBuf,
}

impl Runner {
    /// Create a runner. Relative artifact paths resolve against `cwd`.
    #[must_use]
    pub fn new(collaborators: Collaborators, cwd: impl Into<PathBuf>) -> Self {
        Self {
            collaborators,
            computed: ComputedArtifactRegistry::new(),
            telemetry: Arc::new(NoopTelemetry),
            cwd: cwd.into(),
        }
    }

    /// Set the computed artifact table handed to every run.
    #[must_use]
    pub fn with_computed_artifacts(mut self, registry: ComputedArtifactRegistry) -> Self {
        self.computed = registry;
        self
    }

    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Execute one run.
    ///
    /// Returns `Ok(None)` for a collect-only run.
    pub async fn run(
        &self,
        connection: &ConnectionHandle,
        options: RunOptions,
    ) -> Result<Option<RunOutcome>, LighthouseError> {
        let mut progress = Progress::new(self.telemetry.as_ref(), options.target.clone());

        match self.run_phases(connection, &options, &mut progress).await {
            Ok(outcome) => {
                progress.enter(RunPhase::Done);
                Ok(outcome)
            }
            Err(error) => {
                tracing::error!(phase = %progress.phase, error = %error, "run failed");
                self.telemetry
                    .capture_exception(&error, &progress.meta(true));
                progress.enter(RunPhase::Failed);
                Err(error)
            }
        }
    }

    async fn run_phases(
        &self,
        connection: &ConnectionHandle,
        options: &RunOptions,
        progress: &mut Progress<'_>,
    ) -> Result<Option<RunOutcome>, LighthouseError> {
        let started = Instant::now();
        let config = &options.config;
        let settings = &config.settings;
        let phases = RunPhases::from_settings(settings);
        let artifacts_path = resolve_artifacts_path(settings, &self.cwd);
        tracing::debug!(?phases, path = %artifacts_path.display(), "run plan");

        let artifacts = if phases.gather {
            progress.enter(RunPhase::Collecting);
            let passes = config
                .passes
                .as_deref()
                .filter(|passes| !passes.is_empty())
                .ok_or(LighthouseError::MissingPassesConfig)?;
            let target = options
                .target
                .as_deref()
                .ok_or(LighthouseError::MissingTarget)?;
            let url = target::canonicalize(target)?;

            let collector = options
                .collector_override
                .as_ref()
                .unwrap_or(&self.collaborators.collector);
            let context = CollectorContext {
                settings,
                connection,
            };
            let mut artifacts = collector.run(&url, passes, context).await?;
            if artifacts.settings.is_none() {
                artifacts.settings = Some(settings.clone());
            }

            if settings.gather_mode.is_truthy() {
                progress.enter(RunPhase::Persisting);
                self.collaborators
                    .store
                    .save(&artifacts, &artifacts_path)
                    .await?;
                tracing::info!(path = %artifacts_path.display(), "artifacts saved");
            }
            artifacts
        } else {
            progress.enter(RunPhase::Loading);
            self.collaborators.store.load(&artifacts_path).await?
        };

        if !phases.audit {
            return Ok(None);
        }

        progress.enter(RunPhase::Evaluating);
        let audits = config
            .audits
            .as_deref()
            .filter(|audits| !audits.is_empty())
            .ok_or(LighthouseError::MissingAuditsConfig)?;
        guard::validate(config, &artifacts, options.target.as_deref())?;

        let artifacts = Arc::new(artifacts);
        let input = EvaluationInput {
            artifacts: Arc::clone(&artifacts),
            computed: self.computed.for_run(Arc::clone(&artifacts)),
        };
        let mut evaluation_warnings = Vec::new();
        let results = self
            .collaborators
            .evaluator
            .run(settings, audits, input, &mut evaluation_warnings)
            .await?;
        let audits_by_id = results_by_id(results);

        progress.enter(RunPhase::Scoring);
        let categories = match config.categories.as_ref() {
            Some(categories) => self
                .collaborators
                .scorer
                .score_all_categories(categories, &audits_by_id)?,
            None => BTreeMap::new(),
        };

        progress.enter(RunPhase::Assembling);
        let mut report = assemble(AssemblyInput {
            config,
            artifacts: &artifacts,
            audits: audits_by_id,
            categories,
            evaluation_warnings,
            elapsed: started.elapsed(),
        });

        progress.enter(RunPhase::Localizing);
        localize(
            &mut report,
            self.collaborators.localizer.as_ref(),
            &settings.locale,
        )?;

        progress.enter(RunPhase::Rendering);
        let rendered = self
            .collaborators
            .renderer
            .generate_report(&report, settings.output)?;

        Ok(Some(RunOutcome {
            report,
            artifacts,
            rendered,
        }))
    }
}
