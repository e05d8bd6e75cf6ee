//! # Consistency Guard
//!
//! Evaluation may run long after, and in a different process from, the
//! collection that produced its artifacts. The guard refuses to evaluate
//! artifacts gathered under different measurement settings or for a different
//! page, while tolerating differences in the run-mode knobs themselves.
//!
//! ## Compared Fields
//!
//! Every [`Settings`] field is compared except [`RUN_MODE_FIELDS`]. The
//! comparison destructures `Settings` exhaustively, so adding a field without
//! deciding how it is compared fails to build.

use crate::target::{canonicalize, equal_ignoring_fragment};
use crate::types::{Artifacts, Config, Settings};
use crate::LighthouseError;

/// Fields that select what a run does rather than what it measures.
pub const RUN_MODE_FIELDS: [&str; 3] = ["gatherMode", "auditMode", "output"];

/// Validate that `artifacts` may be evaluated under `config`.
///
/// `target` is the URL given explicitly for this invocation, if any.
pub fn validate(
    config: &Config,
    artifacts: &Artifacts,
    target: Option<&str>,
) -> Result<(), LighthouseError> {
    if let Some(recorded) = artifacts.settings.as_ref() {
        let fields = settings_differences(recorded, &config.settings);
        if !fields.is_empty() {
            tracing::debug!(?fields, "settings differ from collection run");
            return Err(LighthouseError::SettingsMismatch {
                fields: fields.into_iter().map(String::from).collect(),
            });
        }
    }

    if let Some(target) = target {
        let requested = canonicalize(target)?;
        let recorded = &artifacts.url.requested_url;
        if !equal_ignoring_fragment(&requested, recorded) {
            return Err(LighthouseError::TargetMismatch {
                requested,
                recorded: recorded.clone(),
            });
        }
    }

    Ok(())
}

/// Names of measurement-affecting settings that differ between two snapshots.
#[must_use]
pub fn settings_differences(recorded: &Settings, current: &Settings) -> Vec<&'static str> {
    let Settings {
        gather_mode: _,
        audit_mode: _,
        output: _,
        locale,
        form_factor,
        throttling_method,
        throttling,
        max_wait_for_load_ms,
        disable_storage_reset,
        extra_headers,
        blocked_url_patterns,
        only_audits,
        skip_audits,
        only_categories,
        channel,
    } = recorded;

    let mut fields = Vec::new();
    let mut check = |name: &'static str, same: bool| {
        if !same {
            fields.push(name);
        }
    };

    check("locale", *locale == current.locale);
    check("formFactor", *form_factor == current.form_factor);
    check(
        "throttlingMethod",
        *throttling_method == current.throttling_method,
    );
    check("throttling", *throttling == current.throttling);
    check(
        "maxWaitForLoadMs",
        *max_wait_for_load_ms == current.max_wait_for_load_ms,
    );
    check(
        "disableStorageReset",
        *disable_storage_reset == current.disable_storage_reset,
    );
    check("extraHeaders", *extra_headers == current.extra_headers);
    check(
        "blockedUrlPatterns",
        *blocked_url_patterns == current.blocked_url_patterns,
    );
    check("onlyAudits", *only_audits == current.only_audits);
    check("skipAudits", *skip_audits == current.skip_audits);
    check("onlyCategories", *only_categories == current.only_categories);
    check("channel", *channel == current.channel);

    fields
}

// =============================================================================
// TESTS
// =============================================================================
