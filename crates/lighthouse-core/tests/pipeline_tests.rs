//! # Pipeline Tests
//!
//! End-to-end runs of the orchestrator against in-memory collaborators.
//!
//! ## Groups
//! - full runs: collect, evaluate, score, assemble, localize, render
//! - split runs: collect-only and audit-only
//! - validation: configuration, target and settings checks
//! - failures: collaborator errors and telemetry
//! - computed artifacts: memoization under concurrency

#![allow(clippy::unwrap_used, clippy::panic)]

use lighthouse_core::{
    Artifacts, AuditDefinition, AuditRef, AuditResult, BoxFuture, CategoryDefinition,
    CategoryScore, Collaborators, Collector, CollectorContext, ComputedArtifactRegistry,
    ComputedArtifacts, Config, ConnectionHandle, EvaluationInput, Evaluator, LighthouseError,
    Localizer, ModeFlag, OutputMode, PassDefinition, Renderer, ReportRecord, RunOptions, Runner,
    Scorer, Settings, SlotState, Store, TelemetryMeta, TelemetrySink, ThrottlingMethod,
};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// =============================================================================
// MOCK COLLABORATORS
// =============================================================================

const CWD: &str = "/work";
const PAGE: &str = "https://example.test/page";

#[derive(Default)]
struct MockCollector {
    calls: AtomicUsize,
    fail: bool,
}

impl Collector for MockCollector {
    fn run<'a>(
        &'a self,
        url: &'a str,
        _passes: &'a [PassDefinition],
        context: CollectorContext<'a>,
    ) -> BoxFuture<'a, Result<Artifacts, LighthouseError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(LighthouseError::Collection("page crashed".into()));
            }
            let mut artifacts =
                Artifacts::new(url, url).with_artifact("Bytes", json!(context.settings.locale.len()));
            artifacts.host_user_agent = "mock-host".into();
            artifacts.network_user_agent = "mock-network".into();
            artifacts.fetch_time = "2024-05-01T00:00:00Z".into();
            artifacts.run_warnings = vec!["collect-warning".into()];
            Ok(artifacts)
        })
    }
}

#[derive(Default)]
struct MemoryStore {
    saved: Mutex<BTreeMap<PathBuf, Artifacts>>,
    fail_save: bool,
}

impl MemoryStore {
    fn with(path: &str, artifacts: Artifacts) -> Self {
        let store = Self::default();
        store
            .saved
            .lock()
            .unwrap()
            .insert(Path::new(CWD).join(path), artifacts);
        store
    }

    fn get(&self, path: &str) -> Option<Artifacts> {
        self.saved
            .lock()
            .unwrap()
            .get(&Path::new(CWD).join(path))
            .cloned()
    }
}

impl Store for MemoryStore {
    fn load<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<Artifacts, LighthouseError>> {
        Box::pin(async move {
            self.saved
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| LighthouseError::Store(format!("nothing at {}", path.display())))
        })
    }

    fn save<'a>(
        &'a self,
        artifacts: &'a Artifacts,
        path: &'a Path,
    ) -> BoxFuture<'a, Result<(), LighthouseError>> {
        Box::pin(async move {
            if self.fail_save {
                return Err(LighthouseError::Store("disk full".into()));
            }
            self.saved
                .lock()
                .unwrap()
                .insert(path.to_path_buf(), artifacts.clone());
            Ok(())
        })
    }
}

/// Scores every audit 1, asks for the `Doubled` computed artifact twice.
#[derive(Default)]
struct MockEvaluator {
    calls: AtomicUsize,
}

impl Evaluator for MockEvaluator {
    fn run<'a>(
        &'a self,
        _settings: &'a lighthouse_core::Settings,
        audits: &'a [AuditDefinition],
        input: EvaluationInput,
        warnings: &'a mut Vec<String>,
    ) -> BoxFuture<'a, Result<Vec<AuditResult>, LighthouseError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let (a, b) = tokio::join!(
                input.computed.request("Doubled"),
                input.computed.request("Doubled")
            );
            let doubled = a?;
            assert!(Arc::ptr_eq(&doubled, &b?));

            warnings.push("evaluate-warning".into());
            Ok(audits
                .iter()
                .map(|def| AuditResult {
                    title: format!("i18n:{}.title", def.id),
                    numeric_value: doubled.as_f64(),
                    ..AuditResult::scored(def.id.clone(), 1.0)
                })
                .collect())
        })
    }
}

struct MeanScorer;

impl Scorer for MeanScorer {
    fn score_all_categories(
        &self,
        categories: &BTreeMap<String, CategoryDefinition>,
        results_by_id: &BTreeMap<String, AuditResult>,
    ) -> Result<BTreeMap<String, CategoryScore>, LighthouseError> {
        Ok(categories
            .iter()
            .map(|(id, def)| {
                let (sum, weight) = def.audit_refs.iter().fold((0.0, 0.0), |(s, w), r| {
                    let score = results_by_id
                        .get(&r.id)
                        .and_then(|a| a.score)
                        .unwrap_or(0.0);
                    (s + score * r.weight, w + r.weight)
                });
                let score = CategoryScore {
                    id: id.clone(),
                    title: def.title.clone(),
                    description: None,
                    manual_description: None,
                    audit_refs: def.audit_refs.clone(),
                    score: (weight > 0.0).then(|| sum / weight),
                };
                (id.clone(), score)
            })
            .collect())
    }
}

struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn generate_report(
        &self,
        record: &ReportRecord,
        output: OutputMode,
    ) -> Result<String, LighthouseError> {
        assert_eq!(output, OutputMode::Json);
        serde_json::to_string(record).map_err(|e| LighthouseError::Render(e.to_string()))
    }
}

struct PrefixLocalizer;

impl Localizer for PrefixLocalizer {
    fn formatted_strings(&self, locale: &str) -> BTreeMap<String, String> {
        BTreeMap::from([("passedAuditsGroupTitle".to_string(), format!("{locale}: passed"))])
    }

    fn replace_placeholders(
        &self,
        record: &mut ReportRecord,
        locale: &str,
    ) -> Result<BTreeMap<String, Vec<String>>, LighthouseError> {
        let mut paths: BTreeMap<String, Vec<String>> = BTreeMap::new();
        record.for_each_message_mut(&mut |path, text| {
            if let Some(id) = text.strip_prefix("i18n:") {
                paths.entry(id.to_string()).or_default().push(path.to_string());
                *text = format!("[{locale}] {id}");
            }
        });
        Ok(paths)
    }
}

#[derive(Default)]
struct RecordingTelemetry {
    exceptions: Mutex<Vec<(String, TelemetryMeta)>>,
    breadcrumbs: Mutex<Vec<String>>,
}

impl TelemetrySink for RecordingTelemetry {
    fn capture_exception(&self, error: &LighthouseError, meta: &TelemetryMeta) {
        self.exceptions
            .lock()
            .unwrap()
            .push((error.to_string(), meta.clone()));
    }

    fn capture_breadcrumb(&self, meta: &TelemetryMeta) {
        self.breadcrumbs.lock().unwrap().push(meta.phase.clone());
    }
}

struct Harness {
    collector: Arc<MockCollector>,
    store: Arc<MemoryStore>,
    evaluator: Arc<MockEvaluator>,
    telemetry: Arc<RecordingTelemetry>,
    runner: Runner,
}

fn computed_table() -> ComputedArtifactRegistry {
    ComputedArtifactRegistry::new()
        .with("Doubled", |artifacts: Arc<Artifacts>, _| async move {
            let bytes = artifacts.get("Bytes").and_then(Value::as_f64).unwrap_or(0.0);
            Ok(json!(bytes * 2.0))
        })
        .unwrap()
}

fn harness_with(collector: MockCollector, store: MemoryStore) -> Harness {
    let collector = Arc::new(collector);
    let store = Arc::new(store);
    let evaluator = Arc::new(MockEvaluator::default());
    let telemetry = Arc::new(RecordingTelemetry::default());
    let collaborators = Collaborators {
        collector: collector.clone(),
        store: store.clone(),
        evaluator: evaluator.clone(),
        scorer: Arc::new(MeanScorer),
        renderer: Arc::new(JsonRenderer),
        localizer: Arc::new(PrefixLocalizer),
    };
    let runner = Runner::new(collaborators, CWD)
        .with_computed_artifacts(computed_table())
        .with_telemetry(telemetry.clone());
    Harness {
        collector,
        store,
        evaluator,
        telemetry,
        runner,
    }
}

fn harness() -> Harness {
    harness_with(MockCollector::default(), MemoryStore::default())
}

fn full_config() -> Config {
    Config {
        settings: Settings::default(),
        passes: Some(vec![PassDefinition {
            pass_name: "defaultPass".into(),
            gatherers: vec![],
            load_failure_mode: Default::default(),
        }]),
        audits: Some(vec![AuditDefinition::new("auditA")]),
        categories: Some(BTreeMap::from([(
            "cat1".to_string(),
            CategoryDefinition {
                title: "i18n:cat1.title".into(),
                description: None,
                manual_description: None,
                audit_refs: vec![AuditRef {
                    id: "auditA".into(),
                    weight: 1.0,
                    group: None,
                }],
            },
        )])),
        groups: None,
    }
}

fn saved_artifacts(settings: Settings) -> Artifacts {
    let mut artifacts = Artifacts::new(PAGE, PAGE).with_artifact("Bytes", json!(5));
    artifacts.settings = Some(settings);
    artifacts.run_warnings = vec!["saved-warning".into()];
    artifacts
}

// =============================================================================
// FULL RUNS
// =============================================================================

mod full_runs {
    use super::*;

    #[tokio::test]
    async fn full_run_assembles_report() {
        let h = harness();
        let outcome = h
            .runner
            .run(
                &ConnectionHandle::default(),
                RunOptions::new(full_config()).with_target(PAGE),
            )
            .await
            .unwrap()
            .expect("full run returns a report");

        let report = &outcome.report;
        assert_eq!(report.audits["auditA"].score, Some(1.0));
        assert_eq!(report.categories["cat1"].score, Some(1.0));
        assert!(report.timing.total >= 0.0);
        assert_eq!(
            report.run_warnings,
            vec!["evaluate-warning".to_string(), "collect-warning".to_string()]
        );
        assert_eq!(report.requested_url, PAGE);
        assert_eq!(report.environment.network_user_agent, "mock-network");
        assert_eq!(report.user_agent, "mock-host");
        assert_eq!(h.collector.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn full_run_does_not_persist() {
        let h = harness();
        h.runner
            .run(
                &ConnectionHandle::default(),
                RunOptions::new(full_config()).with_target(PAGE),
            )
            .await
            .unwrap();
        assert!(h.store.get("latest-run").is_none());
    }

    #[tokio::test]
    async fn report_is_localized_once() {
        let h = harness();
        let outcome = h
            .runner
            .run(
                &ConnectionHandle::default(),
                RunOptions::new(full_config()).with_target(PAGE),
            )
            .await
            .unwrap()
            .unwrap();

        let report = &outcome.report;
        assert_eq!(report.audits["auditA"].title, "[en-US] auditA.title");
        assert_eq!(report.categories["cat1"].title, "[en-US] cat1.title");
        assert_eq!(
            report.i18n.icu_message_paths["auditA.title"],
            vec!["audits[auditA].title".to_string()]
        );
        assert_eq!(
            report.i18n.renderer_formatted_strings["passedAuditsGroupTitle"],
            "en-US: passed"
        );
    }

    #[tokio::test]
    async fn rendered_report_matches_record() {
        let h = harness();
        let outcome = h
            .runner
            .run(
                &ConnectionHandle::default(),
                RunOptions::new(full_config()).with_target(PAGE),
            )
            .await
            .unwrap()
            .unwrap();

        let parsed: ReportRecord = serde_json::from_str(&outcome.rendered).unwrap();
        assert_eq!(parsed.audits, outcome.report.audits);
        assert_eq!(parsed.categories, outcome.report.categories);
        assert_eq!(parsed.run_warnings, outcome.report.run_warnings);
        assert_eq!(
            outcome.artifacts.settings.as_ref(),
            Some(&full_config().settings),
            "collection stamps its settings snapshot"
        );
    }

    #[tokio::test]
    async fn computed_artifacts_reach_evaluator() {
        let h = harness();
        let outcome = h
            .runner
            .run(
                &ConnectionHandle::default(),
                RunOptions::new(full_config()).with_target(PAGE),
            )
            .await
            .unwrap()
            .unwrap();
        // "en-US".len() * 2
        assert_eq!(outcome.report.audits["auditA"].numeric_value, Some(10.0));
    }

    #[tokio::test]
    async fn no_categories_means_empty_map() {
        let h = harness();
        let config = Config {
            categories: None,
            ..full_config()
        };
        let outcome = h
            .runner
            .run(
                &ConnectionHandle::default(),
                RunOptions::new(config).with_target(PAGE),
            )
            .await
            .unwrap()
            .unwrap();
        assert!(outcome.report.categories.is_empty());
    }

    #[tokio::test]
    async fn collector_override_is_used() {
        let h = harness();
        let replacement = Arc::new(MockCollector::default());
        h.runner
            .run(
                &ConnectionHandle::default(),
                RunOptions::new(full_config())
                    .with_target(PAGE)
                    .with_collector(replacement.clone()),
            )
            .await
            .unwrap();
        assert_eq!(replacement.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.collector.calls.load(Ordering::SeqCst), 0);
    }
}

// =============================================================================
// SPLIT RUNS
// =============================================================================

mod split_runs {
    use super::*;

    #[tokio::test]
    async fn collect_only_persists_and_returns_nothing() {
        let h = harness();
        let mut config = full_config();
        config.settings.gather_mode = ModeFlag::Path("./out".into());

        let outcome = h
            .runner
            .run(
                &ConnectionHandle::default(),
                RunOptions::new(config).with_target(PAGE),
            )
            .await
            .unwrap();

        assert!(outcome.is_none());
        let saved = h.store.get("./out").expect("artifacts persisted");
        assert_eq!(saved.url.requested_url, PAGE);
        assert_eq!(h.evaluator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn collect_only_without_audits_is_fine() {
        let h = harness();
        let mut config = full_config();
        config.settings.gather_mode = ModeFlag::On;
        config.audits = None;

        let outcome = h
            .runner
            .run(
                &ConnectionHandle::default(),
                RunOptions::new(config).with_target(PAGE),
            )
            .await
            .unwrap();
        assert!(outcome.is_none());
        assert!(h.store.get("latest-run").is_some());
    }

    #[tokio::test]
    async fn audit_only_loads_saved_artifacts() {
        let mut config = full_config();
        config.settings.audit_mode = ModeFlag::On;
        config.passes = None;
        let recorded = Settings {
            gather_mode: ModeFlag::On,
            ..Settings::default()
        };
        let h = harness_with(
            MockCollector::default(),
            MemoryStore::with("latest-run", saved_artifacts(recorded)),
        );

        let outcome = h
            .runner
            .run(&ConnectionHandle::default(), RunOptions::new(config))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(h.collector.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            outcome.report.run_warnings,
            vec!["evaluate-warning".to_string(), "saved-warning".to_string()]
        );
        assert_eq!(outcome.report.audits["auditA"].numeric_value, Some(10.0));
    }

    #[tokio::test]
    async fn audit_only_reads_named_directory() {
        let mut config = full_config();
        config.settings.audit_mode = ModeFlag::Path("saved".into());
        let h = harness_with(
            MockCollector::default(),
            MemoryStore::with("saved", saved_artifacts(Settings::default())),
        );

        let outcome = h
            .runner
            .run(&ConnectionHandle::default(), RunOptions::new(config))
            .await
            .unwrap();
        assert!(outcome.is_some());
    }

    #[tokio::test]
    async fn audit_only_accepts_fragment_difference() {
        let mut config = full_config();
        config.settings.audit_mode = ModeFlag::On;
        let h = harness_with(
            MockCollector::default(),
            MemoryStore::with("latest-run", saved_artifacts(Settings::default())),
        );

        let outcome = h
            .runner
            .run(
                &ConnectionHandle::default(),
                RunOptions::new(config).with_target(format!("{PAGE}#main")),
            )
            .await
            .unwrap();
        assert!(outcome.is_some());
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

mod validation {
    use super::*;

    async fn run_err(h: &Harness, options: RunOptions) -> LighthouseError {
        h.runner
            .run(&ConnectionHandle::default(), options)
            .await
            .expect_err("run should fail")
    }

    #[tokio::test]
    async fn missing_passes() {
        let h = harness();
        let config = Config {
            passes: Some(vec![]),
            ..full_config()
        };
        let err = run_err(&h, RunOptions::new(config).with_target(PAGE)).await;
        assert_eq!(err, LighthouseError::MissingPassesConfig);
        assert_eq!(h.collector.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_target() {
        let h = harness();
        let err = run_err(&h, RunOptions::new(full_config())).await;
        assert_eq!(err, LighthouseError::MissingTarget);
    }

    #[tokio::test]
    async fn invalid_target() {
        let h = harness();
        let err = run_err(&h, RunOptions::new(full_config()).with_target("not a url")).await;
        assert!(matches!(err, LighthouseError::InvalidTarget { .. }));
        assert_eq!(h.collector.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_audits() {
        let h = harness();
        let config = Config {
            audits: None,
            ..full_config()
        };
        let err = run_err(&h, RunOptions::new(config).with_target(PAGE)).await;
        assert_eq!(err, LighthouseError::MissingAuditsConfig);
        assert_eq!(h.evaluator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn settings_changed_since_collection() {
        let mut config = full_config();
        config.settings.audit_mode = ModeFlag::On;
        config.settings.throttling_method = ThrottlingMethod::Provided;
        let h = harness_with(
            MockCollector::default(),
            MemoryStore::with("latest-run", saved_artifacts(Settings::default())),
        );

        let err = run_err(&h, RunOptions::new(config)).await;
        assert_eq!(
            err,
            LighthouseError::SettingsMismatch {
                fields: vec!["throttlingMethod".into()]
            }
        );
        assert_eq!(h.evaluator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn different_target_than_collected() {
        let mut config = full_config();
        config.settings.audit_mode = ModeFlag::On;
        let h = harness_with(
            MockCollector::default(),
            MemoryStore::with("latest-run", saved_artifacts(Settings::default())),
        );

        let err = run_err(
            &h,
            RunOptions::new(config).with_target("https://example.test/other"),
        )
        .await;
        assert!(matches!(err, LighthouseError::TargetMismatch { .. }));
    }
}

// =============================================================================
// FAILURES
// =============================================================================

mod failures {
    use super::*;

    #[tokio::test]
    async fn collector_error_passes_through() {
        let h = harness_with(
            MockCollector {
                fail: true,
                ..MockCollector::default()
            },
            MemoryStore::default(),
        );
        let err = h
            .runner
            .run(
                &ConnectionHandle::default(),
                RunOptions::new(full_config()).with_target(PAGE),
            )
            .await
            .unwrap_err();
        assert_eq!(err, LighthouseError::Collection("page crashed".into()));
    }

    #[tokio::test]
    async fn failure_is_reported_once_as_fatal() {
        let h = harness();
        let config = Config {
            audits: Some(vec![]),
            ..full_config()
        };
        h.runner
            .run(
                &ConnectionHandle::default(),
                RunOptions::new(config).with_target(PAGE),
            )
            .await
            .unwrap_err();

        let exceptions = h.telemetry.exceptions.lock().unwrap();
        assert_eq!(exceptions.len(), 1);
        let (message, meta) = &exceptions[0];
        assert_eq!(message, &LighthouseError::MissingAuditsConfig.to_string());
        assert!(meta.fatal);
        assert_eq!(meta.phase, "evaluating");
        assert_eq!(meta.url.as_deref(), Some(PAGE));
    }

    #[tokio::test]
    async fn persist_failure_is_fatal() {
        let h = harness_with(
            MockCollector::default(),
            MemoryStore {
                fail_save: true,
                ..MemoryStore::default()
            },
        );
        let mut config = full_config();
        config.settings.gather_mode = ModeFlag::On;

        let err = h
            .runner
            .run(
                &ConnectionHandle::default(),
                RunOptions::new(config).with_target(PAGE),
            )
            .await
            .unwrap_err();
        assert_eq!(err, LighthouseError::Store("disk full".into()));
        assert_eq!(h.telemetry.exceptions.lock().unwrap()[0].1.phase, "persisting");
    }

    #[tokio::test]
    async fn missing_saved_artifacts_is_a_store_error() {
        let h = harness();
        let mut config = full_config();
        config.settings.audit_mode = ModeFlag::On;
        let err = h
            .runner
            .run(&ConnectionHandle::default(), RunOptions::new(config))
            .await
            .unwrap_err();
        assert!(matches!(err, LighthouseError::Store(_)));
    }

    #[tokio::test]
    async fn failed_run_ends_with_failed_breadcrumb() {
        let h = harness();
        let config = Config {
            audits: Some(vec![]),
            ..full_config()
        };
        h.runner
            .run(
                &ConnectionHandle::default(),
                RunOptions::new(config).with_target(PAGE),
            )
            .await
            .unwrap_err();

        assert_eq!(
            *h.telemetry.breadcrumbs.lock().unwrap(),
            vec!["collecting", "evaluating", "failed"]
        );
        // The exception names the phase that failed, not the terminal one.
        assert_eq!(h.telemetry.exceptions.lock().unwrap()[0].1.phase, "evaluating");
    }

    #[tokio::test]
    async fn successful_run_leaves_breadcrumbs_in_order() {
        let h = harness();
        h.runner
            .run(
                &ConnectionHandle::default(),
                RunOptions::new(full_config()).with_target(PAGE),
            )
            .await
            .unwrap();
        assert_eq!(
            *h.telemetry.breadcrumbs.lock().unwrap(),
            vec![
                "collecting",
                "evaluating",
                "scoring",
                "assembling",
                "localizing",
                "rendering",
                "done"
            ]
        );
        assert!(h.telemetry.exceptions.lock().unwrap().is_empty());
    }
}

// =============================================================================
// COMPUTED ARTIFACTS UNDER CONCURRENCY
// =============================================================================

mod computed_artifacts {
    use super::*;
    use std::time::Duration;
    use tokio::sync::{Barrier, Semaphore};
    use tokio::task::JoinSet;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_compute_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Semaphore::new(0));

        let counter = Arc::clone(&calls);
        let held = Arc::clone(&gate);
        let registry = ComputedArtifactRegistry::new()
            .with("X", move |_, _| {
                let counter = Arc::clone(&counter);
                let held = Arc::clone(&held);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let _permit = held
                        .acquire()
                        .await
                        .map_err(|e| LighthouseError::Evaluation(e.to_string()))?;
                    Ok(json!("x"))
                }
            })
            .unwrap();

        let computed = registry.for_run(Arc::new(Artifacts::new(PAGE, PAGE)));
        let mut requests = JoinSet::new();
        for _ in 0..8 {
            let handle: ComputedArtifacts = computed.clone();
            requests.spawn(async move { handle.request("X").await });
        }

        while computed.state("X") != SlotState::InFlight {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        gate.add_permits(1);

        let mut values = Vec::new();
        while let Some(joined) = requests.join_next().await {
            values.push(joined.unwrap().unwrap());
        }

        assert_eq!(values.len(), 8);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(values.iter().all(|v| Arc::ptr_eq(v, &values[0])));
        assert_eq!(computed.state("X"), SlotState::Settled);
    }

    #[tokio::test]
    async fn mutual_recursion_is_circular() {
        let registry = ComputedArtifactRegistry::new()
            .with("A", |_, computed: ComputedArtifacts| async move {
                let b = computed.request("B").await?;
                Ok((*b).clone())
            })
            .unwrap()
            .with("B", |_, computed: ComputedArtifacts| async move {
                let a = computed.request("A").await?;
                Ok((*a).clone())
            })
            .unwrap();

        let computed = registry.for_run(Arc::new(Artifacts::new(PAGE, PAGE)));
        let err = computed.request("A").await.unwrap_err();
        assert_eq!(
            err,
            LighthouseError::CircularDependency {
                chain: vec!["A".into(), "B".into(), "A".into()]
            }
        );
        // The failure is the settled outcome for both names.
        assert_eq!(computed.request("B").await.unwrap_err(), err);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn crossing_chains_are_circular() {
        let barrier = Arc::new(Barrier::new(2));

        let both_started = Arc::clone(&barrier);
        let registry = ComputedArtifactRegistry::new()
            .with("A", move |_, computed: ComputedArtifacts| {
                let both_started = Arc::clone(&both_started);
                async move {
                    both_started.wait().await;
                    let b = computed.request("B").await?;
                    Ok((*b).clone())
                }
            })
            .unwrap();
        let both_started = Arc::clone(&barrier);
        let registry = registry
            .with("B", move |_, computed: ComputedArtifacts| {
                let both_started = Arc::clone(&both_started);
                async move {
                    both_started.wait().await;
                    let a = computed.request("A").await?;
                    Ok((*a).clone())
                }
            })
            .unwrap();

        let computed = registry.for_run(Arc::new(Artifacts::new(PAGE, PAGE)));
        let from_a = computed.clone();
        let from_b = computed.clone();
        let a = tokio::spawn(async move { from_a.request("A").await });
        let b = tokio::spawn(async move { from_b.request("B").await });

        let (a, b) = tokio::time::timeout(Duration::from_secs(3), async {
            (a.await.unwrap(), b.await.unwrap())
        })
        .await
        .expect("crossing requests must settle");

        for outcome in [a, b] {
            assert!(matches!(
                outcome.unwrap_err(),
                LighthouseError::CircularDependency { .. }
            ));
        }
        assert_eq!(computed.state("A"), SlotState::Settled);
        assert_eq!(computed.state("B"), SlotState::Settled);
    }

    #[tokio::test]
    async fn diamond_dependencies_are_not_circular() {
        let registry = ComputedArtifactRegistry::new()
            .with("Base", |_, _| async { Ok(json!(2)) })
            .unwrap()
            .with("Left", |_, computed: ComputedArtifacts| async move {
                let base = computed.request("Base").await?;
                Ok(json!(base.as_i64().unwrap_or(0) + 1))
            })
            .unwrap()
            .with("Right", |_, computed: ComputedArtifacts| async move {
                let base = computed.request("Base").await?;
                Ok(json!(base.as_i64().unwrap_or(0) * 10))
            })
            .unwrap()
            .with("Top", |_, computed: ComputedArtifacts| async move {
                let (left, right) = tokio::join!(computed.request("Left"), computed.request("Right"));
                Ok(json!(left?.as_i64().unwrap_or(0) + right?.as_i64().unwrap_or(0)))
            })
            .unwrap();

        let computed = registry.for_run(Arc::new(Artifacts::new(PAGE, PAGE)));
        let (top, left) = tokio::join!(computed.request("Top"), computed.request("Left"));
        assert_eq!(*top.unwrap(), json!(23));
        assert_eq!(*left.unwrap(), json!(3));
    }

    #[tokio::test]
    async fn failure_reaches_every_requester() {
        let registry = ComputedArtifactRegistry::new()
            .with("Broken", |_, _| async {
                Err(LighthouseError::Evaluation("no trace".into()))
            })
            .unwrap();
        let computed = registry.for_run(Arc::new(Artifacts::new(PAGE, PAGE)));

        let (a, b) = tokio::join!(computed.request("Broken"), computed.request("Broken"));
        assert_eq!(a.unwrap_err(), LighthouseError::Evaluation("no trace".into()));
        assert_eq!(b.unwrap_err(), LighthouseError::Evaluation("no trace".into()));
    }
}
