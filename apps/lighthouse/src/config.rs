//! # Run Configuration
//!
//! Loads a [`Config`] from TOML (or the embedded default), applies
//! command-line overrides to its settings, and narrows it with the
//! `onlyAudits`, `skipAudits` and `onlyCategories` filters.

use lighthouse_core::{
    Config, FormFactor, LighthouseError, ModeFlag, OutputMode, Settings, ThrottlingMethod,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// The configuration used when no `--config-path` is given.
pub const DEFAULT_CONFIG: &str = include_str!("default-config.toml");

// =============================================================================
// LOADING
// =============================================================================

/// Parse a TOML config document.
pub fn parse_config(text: &str) -> Result<Config, LighthouseError> {
    toml::from_str(text).map_err(|e| LighthouseError::Config(format!("Invalid config: {e}")))
}

/// The embedded default config.
pub fn default_config() -> Result<Config, LighthouseError> {
    parse_config(DEFAULT_CONFIG)
}

/// Load the config at `path`, or the default when `path` is `None`.
pub async fn load_config(path: Option<&Path>) -> Result<Config, LighthouseError> {
    let Some(path) = path else {
        return default_config();
    };
    let text = tokio::fs::read_to_string(path).await.map_err(|e| {
        LighthouseError::Io(format!("Cannot read config '{}': {}", path.display(), e))
    })?;
    let config = parse_config(&text)?;
    tracing::info!(path = %path.display(), "config loaded");
    Ok(config)
}

/// Load, override and filter in one step.
pub async fn resolve_config(
    path: Option<&Path>,
    overrides: SettingsOverrides,
) -> Result<Config, LighthouseError> {
    let mut config = load_config(path).await?;
    overrides.apply(&mut config.settings);
    filter_config(&mut config);
    Ok(config)
}

// =============================================================================
// OVERRIDES
// =============================================================================

/// Settings given on the command line. `None` leaves the config value alone.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub gather_mode: Option<ModeFlag>,
    pub audit_mode: Option<ModeFlag>,
    pub output: Option<OutputMode>,
    pub locale: Option<String>,
    pub form_factor: Option<FormFactor>,
    pub throttling_method: Option<ThrottlingMethod>,
    pub max_wait_for_load_ms: Option<u64>,
    pub extra_headers: Option<BTreeMap<String, String>>,
    pub only_audits: Option<Vec<String>>,
    pub skip_audits: Option<Vec<String>>,
    pub only_categories: Option<Vec<String>>,
}

impl SettingsOverrides {
    pub fn apply(self, settings: &mut Settings) {
        let SettingsOverrides {
            gather_mode,
            audit_mode,
            output,
            locale,
            form_factor,
            throttling_method,
            max_wait_for_load_ms,
            extra_headers,
            only_audits,
            skip_audits,
            only_categories,
        } = self;

        if let Some(v) = gather_mode {
            settings.gather_mode = v;
        }
        if let Some(v) = audit_mode {
            settings.audit_mode = v;
        }
        if let Some(v) = output {
            settings.output = v;
        }
        if let Some(v) = locale {
            settings.locale = v;
        }
        if let Some(v) = form_factor {
            settings.form_factor = v;
        }
        if let Some(v) = throttling_method {
            settings.throttling_method = v;
        }
        if let Some(v) = max_wait_for_load_ms {
            settings.max_wait_for_load_ms = v;
        }
        if extra_headers.is_some() {
            settings.extra_headers = extra_headers;
        }
        if only_audits.is_some() {
            settings.only_audits = only_audits;
        }
        if skip_audits.is_some() {
            settings.skip_audits = skip_audits;
        }
        if only_categories.is_some() {
            settings.only_categories = only_categories;
        }
    }
}

/// Map an optional-value flag: absent, bare (`-G`) or with a path (`-G dir`).
pub fn mode_flag(arg: Option<Option<String>>) -> Option<ModeFlag> {
    arg.map(|value| match value {
        Some(path) if !path.is_empty() => ModeFlag::Path(path),
        _ => ModeFlag::On,
    })
}

/// Parse a settings enum from its serialized name, e.g. `"desktop"`.
pub fn parse_setting<T: DeserializeOwned>(field: &str, value: &str) -> Result<T, LighthouseError> {
    serde_json::from_value(Value::String(value.to_string()))
        .map_err(|_| LighthouseError::Config(format!("Invalid value '{value}' for {field}")))
}

/// Extra request headers, given inline as a JSON object or as a path to one.
pub async fn parse_extra_headers(raw: &str) -> Result<BTreeMap<String, String>, LighthouseError> {
    let text = if raw.trim_start().starts_with('{') {
        raw.to_string()
    } else {
        tokio::fs::read_to_string(raw)
            .await
            .map_err(|e| LighthouseError::Io(format!("Cannot read extra headers '{raw}': {e}")))?
    };
    serde_json::from_str(&text)
        .map_err(|e| LighthouseError::Config(format!("Invalid extra headers: {e}")))
}

// =============================================================================
// FILTERING
// =============================================================================

/// Narrow audits and categories to the ones selected by the settings filters.
///
/// Audits kept are those referenced by the selected categories plus any named
/// in `onlyAudits`, minus `skipAudits`. Categories whose references are all
/// filtered away are dropped. Unknown ids are logged and ignored.
pub fn filter_config(config: &mut Config) {
    let only_audits = config.settings.only_audits.clone();
    let skip_audits = config.settings.skip_audits.clone().unwrap_or_default();
    let only_categories = config.settings.only_categories.clone();
    if only_audits.is_none() && skip_audits.is_empty() && only_categories.is_none() {
        return;
    }

    let available: BTreeSet<String> = config
        .audits
        .iter()
        .flatten()
        .map(|audit| audit.id.clone())
        .collect();
    for id in only_audits.iter().flatten().chain(&skip_audits) {
        if !available.contains(id) {
            tracing::warn!(audit = %id, "unrecognized audit in filter");
        }
    }
    if let Some(only) = &only_audits {
        for id in only.iter().filter(|id| skip_audits.contains(*id)) {
            tracing::warn!(audit = %id, "audit is both selected and skipped");
        }
    }

    if let (Some(only), Some(categories)) = (&only_categories, config.categories.as_mut()) {
        for id in only.iter().filter(|id| !categories.contains_key(*id)) {
            tracing::warn!(category = %id, "unrecognized category in filter");
        }
        categories.retain(|id, _| only.contains(id));
    }

    let mut keep: BTreeSet<String> = if only_audits.is_none() && only_categories.is_none() {
        available
    } else {
        let mut keep = BTreeSet::new();
        if only_categories.is_some() {
            keep.extend(
                config
                    .categories
                    .iter()
                    .flat_map(|categories| categories.values())
                    .flat_map(|category| category.audit_refs.iter())
                    .map(|r| r.id.clone()),
            );
        }
        keep.extend(only_audits.into_iter().flatten());
        keep
    };
    for id in &skip_audits {
        keep.remove(id);
    }

    if let Some(audits) = config.audits.as_mut() {
        audits.retain(|audit| keep.contains(&audit.id));
    }
    if let Some(categories) = config.categories.as_mut() {
        categories.retain(|id, category| {
            let had_refs = !category.audit_refs.is_empty();
            category.audit_refs.retain(|r| keep.contains(&r.id));
            let keep_category = !had_refs || !category.audit_refs.is_empty();
            if !keep_category {
                tracing::debug!(category = %id, "category emptied by filters");
            }
            keep_category
        });
    }
}

// =============================================================================
// TESTS
// =============================================================================
