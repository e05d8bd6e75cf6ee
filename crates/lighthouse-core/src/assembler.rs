//! # Result Assembly
//!
//! Merges audit results, category scores, environment metadata and run
//! warnings into one [`ReportRecord`], then applies localization once.

use crate::collaborators::Localizer;
use crate::types::{
    Artifacts, AuditResult, CategoryScore, Config, Environment, I18nBlock, ReportRecord, Timing,
};
use crate::{LIGHTHOUSE_VERSION, LighthouseError};
use std::collections::BTreeMap;
use std::time::Duration;

/// Key audit results by id. A later result with the same id replaces an earlier one.
#[must_use]
pub fn results_by_id(results: Vec<AuditResult>) -> BTreeMap<String, AuditResult> {
    let mut by_id = BTreeMap::new();
    for result in results {
        if let Some(previous) = by_id.insert(result.id.clone(), result) {
            tracing::warn!(audit = %previous.id, "duplicate audit id, keeping the later result");
        }
    }
    by_id
}

/// Everything a report is built from.
#[derive(Debug)]
pub struct AssemblyInput<'a> {
    pub config: &'a Config,
    pub artifacts: &'a Artifacts,
    pub audits: BTreeMap<String, AuditResult>,
    pub categories: BTreeMap<String, CategoryScore>,
    pub evaluation_warnings: Vec<String>,
    pub elapsed: Duration,
}

/// Build the report record. Placeholders are left for [`localize`].
#[must_use]
pub fn assemble(input: AssemblyInput<'_>) -> ReportRecord {
    let AssemblyInput {
        config,
        artifacts,
        audits,
        categories,
        evaluation_warnings,
        elapsed,
    } = input;

    let mut run_warnings = evaluation_warnings;
    run_warnings.extend(artifacts.run_warnings.iter().cloned());

    ReportRecord {
        user_agent: artifacts.host_user_agent.clone(),
        environment: Environment {
            network_user_agent: artifacts.network_user_agent.clone(),
            host_user_agent: artifacts.host_user_agent.clone(),
            benchmark_index: artifacts.benchmark_index,
        },
        lighthouse_version: LIGHTHOUSE_VERSION.to_string(),
        fetch_time: artifacts.fetch_time.clone(),
        requested_url: artifacts.url.requested_url.clone(),
        final_url: artifacts.url.final_url.clone(),
        run_warnings,
        audits,
        config_settings: config.settings.clone(),
        categories,
        category_groups: config.groups.clone(),
        timing: Timing {
            total: elapsed.as_secs_f64() * 1000.0,
        },
        i18n: I18nBlock::default(),
    }
}

/// Replace message placeholders with `locale` text and record where they were.
pub fn localize(
    record: &mut ReportRecord,
    localizer: &dyn Localizer,
    locale: &str,
) -> Result<(), LighthouseError> {
    let icu_message_paths = localizer.replace_placeholders(record, locale)?;
    record.i18n = I18nBlock {
        renderer_formatted_strings: localizer.formatted_strings(locale),
        icu_message_paths,
    };
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
