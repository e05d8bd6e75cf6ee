//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::RunArgs;
use crate::audits::BUILTIN_AUDITS;
use crate::config::{
    SettingsOverrides, mode_flag, parse_extra_headers, parse_setting, resolve_config,
};
use crate::i18n;
use lighthouse_core::{Config, ConnectionHandle, LighthouseError, OutputMode, RunOptions};
use std::path::{Path, PathBuf};

// =============================================================================
// OPTIONS
// =============================================================================

/// Translate run options into settings overrides.
pub async fn settings_overrides(args: &RunArgs) -> Result<SettingsOverrides, LighthouseError> {
    let extra_headers = match &args.extra_headers {
        Some(raw) => Some(parse_extra_headers(raw).await?),
        None => None,
    };

    Ok(SettingsOverrides {
        gather_mode: mode_flag(args.gather_mode.clone()),
        audit_mode: mode_flag(args.audit_mode.clone()),
        output: args.output,
        locale: args.locale.clone(),
        form_factor: args
            .form_factor
            .as_deref()
            .map(|value| parse_setting("formFactor", value))
            .transpose()?,
        throttling_method: args
            .throttling_method
            .as_deref()
            .map(|value| parse_setting("throttlingMethod", value))
            .transpose()?,
        max_wait_for_load_ms: args.max_wait_for_load,
        extra_headers,
        only_audits: args.only_audits.clone(),
        skip_audits: args.skip_audits.clone(),
        only_categories: args.only_categories.clone(),
    })
}

async fn resolved_config(args: &RunArgs) -> Result<Config, LighthouseError> {
    let overrides = settings_overrides(args).await?;
    resolve_config(args.config_path.as_deref(), overrides).await
}

/// Where a report goes. A path without an extension gets the format's.
pub fn report_destination(path: Option<&Path>, output: OutputMode) -> Option<PathBuf> {
    let path = path.filter(|p| *p != Path::new("stdout"))?;
    if path.extension().is_some() {
        Some(path.to_path_buf())
    } else {
        Some(path.with_extension(output.extension()))
    }
}

// =============================================================================
// RUN COMMAND
// =============================================================================

/// Collect and/or audit a page, then write the report.
pub async fn cmd_run(args: &RunArgs) -> Result<(), LighthouseError> {
    let config = resolved_config(args).await?;
    let output = config.settings.output;
    let cwd = std::env::current_dir()
        .map_err(|e| LighthouseError::Io(format!("Cannot read working directory: {}", e)))?;
    let runner = crate::default_runner(cwd)?;

    let mut options = RunOptions::new(config);
    if let Some(url) = &args.url {
        options = options.with_target(url.clone());
    }

    let Some(outcome) = runner.run(&ConnectionHandle::default(), options).await? else {
        tracing::info!("collection finished");
        return Ok(());
    };

    match report_destination(args.output_path.as_deref(), output) {
        Some(path) => {
            tokio::fs::write(&path, &outcome.rendered).await.map_err(|e| {
                LighthouseError::Io(format!("Cannot write report '{}': {}", path.display(), e))
            })?;
            tracing::info!(path = %path.display(), "report written");
        }
        None => println!("{}", outcome.rendered),
    }

    for (id, category) in &outcome.report.categories {
        tracing::info!(category = %id, score = ?category.score, "category score");
    }
    Ok(())
}

// =============================================================================
// LISTING COMMANDS
// =============================================================================

/// List the built-in audits with their English titles.
pub fn cmd_list_audits(json_mode: bool) -> Result<(), LighthouseError> {
    let audits: Vec<(&str, &str)> = BUILTIN_AUDITS
        .iter()
        .map(|audit| {
            let key = format!("audit.{}.title", audit.id());
            (audit.id(), i18n::message(i18n::DEFAULT_LOCALE, &key).unwrap_or_default())
        })
        .collect();

    if json_mode {
        let output = serde_json::json!({
            "audits": audits
                .iter()
                .map(|(id, title)| serde_json::json!({ "id": id, "title": title }))
                .collect::<Vec<_>>()
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Built-in Audits");
    println!("===============");
    for (id, title) in audits {
        println!("  {:<24} {}", id, title);
    }
    Ok(())
}

/// List the locales that have string tables.
pub fn cmd_list_locales(json_mode: bool) -> Result<(), LighthouseError> {
    let locales: Vec<&str> = i18n::available_locales().collect();

    if json_mode {
        let output = serde_json::json!({ "locales": locales });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Locales");
    println!("=======");
    for locale in locales {
        println!("  {}", locale);
    }
    Ok(())
}

/// Print the configuration a run with these options would use, as JSON.
pub async fn cmd_print_config(args: &RunArgs) -> Result<(), LighthouseError> {
    let config = resolved_config(args).await?;
    let text = serde_json::to_string_pretty(&config)
        .map_err(|e| LighthouseError::Serialization(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
