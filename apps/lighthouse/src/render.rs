//! # Report Rendering
//!
//! `json` is the report record itself, pretty printed. `html` is a single
//! self-contained page: a summary per category followed by the record as
//! embedded JSON, so the page can be re-read by tools.

use lighthouse_core::{
    AuditResult, CategoryScore, LighthouseError, OutputMode, Renderer, ReportRecord,
    ScoreDisplayMode,
};
use std::collections::BTreeMap;

/// Renderer for both output formats.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportRenderer;

impl Renderer for ReportRenderer {
    fn generate_report(
        &self,
        record: &ReportRecord,
        output: OutputMode,
    ) -> Result<String, LighthouseError> {
        match output {
            OutputMode::Json => serde_json::to_string_pretty(record)
                .map_err(|e| LighthouseError::Render(e.to_string())),
            OutputMode::Html => render_html(record),
        }
    }
}

// =============================================================================
// HTML
// =============================================================================

const STYLE: &str = "body{font-family:sans-serif;max-width:960px;margin:0 auto;padding:16px}\
.score{display:inline-block;min-width:3em;text-align:center;border-radius:1em;padding:2px 8px}\
.pass{background:#d4f5dc}.average{background:#fdebc8}.fail{background:#fbd5d0}\
.warnings{background:#fff6d6;padding:8px}li.audit{margin:4px 0}";

/// Escape text for HTML content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn band(score: f64) -> &'static str {
    if score >= 0.9 {
        "pass"
    } else if score >= 0.5 {
        "average"
    } else {
        "fail"
    }
}

fn score_badge(score: Option<f64>) -> String {
    match score {
        Some(score) => format!(
            "<span class=\"score {}\">{}</span>",
            band(score),
            (score * 100.0).round()
        ),
        None => "<span class=\"score\">?</span>".to_string(),
    }
}

struct Labels<'a>(&'a BTreeMap<String, String>);

impl Labels<'_> {
    fn get(&self, key: &str) -> String {
        escape_html(self.0.get(key).map(String::as_str).unwrap_or(key))
    }
}

fn audit_item(audit: &AuditResult, labels: &Labels<'_>) -> String {
    let mut item = format!(
        "<li class=\"audit\" id=\"{}\">{} <strong>{}</strong>",
        escape_html(&audit.id),
        score_badge(audit.score),
        escape_html(&audit.title)
    );
    if let Some(display) = &audit.display_value {
        item.push_str(&format!(" <em>{}</em>", escape_html(display)));
    }
    if let Some(error) = &audit.error_message {
        item.push_str(&format!(
            " <span class=\"error\">{} {}</span>",
            labels.get("errorLabel"),
            escape_html(error)
        ));
    }
    if !audit.warnings.is_empty() {
        item.push_str(&format!(
            "<div class=\"warnings\">{}{}</div>",
            labels.get("warningHeader"),
            escape_html(&audit.warnings.join("; "))
        ));
    }
    item.push_str(&format!("<p>{}</p></li>", escape_html(&audit.description)));
    item
}

fn category_section(
    category: &CategoryScore,
    audits: &BTreeMap<String, AuditResult>,
    labels: &Labels<'_>,
) -> String {
    let mut failed = Vec::new();
    let mut passed = Vec::new();
    let mut not_applicable = Vec::new();
    for audit in category.audit_refs.iter().filter_map(|r| audits.get(&r.id)) {
        match (audit.score_display_mode, audit.score) {
            (ScoreDisplayMode::NotApplicable | ScoreDisplayMode::Manual, _) => {
                not_applicable.push(audit)
            }
            (_, Some(score)) if score >= 0.9 => passed.push(audit),
            _ => failed.push(audit),
        }
    }

    let mut section = format!(
        "<section class=\"category\" id=\"{}\"><h2>{} {}</h2>",
        escape_html(&category.id),
        escape_html(&category.title),
        score_badge(category.score)
    );
    if let Some(description) = &category.description {
        section.push_str(&format!("<p>{}</p>", escape_html(description)));
    }
    for (key, group) in [
        ("failedAuditsGroupTitle", failed),
        ("passedAuditsGroupTitle", passed),
        ("notApplicableAuditsGroupTitle", not_applicable),
    ] {
        if group.is_empty() {
            continue;
        }
        section.push_str(&format!("<h3>{}</h3><ul>", labels.get(key)));
        for audit in group {
            section.push_str(&audit_item(audit, labels));
        }
        section.push_str("</ul>");
    }
    section.push_str("</section>");
    section
}

fn render_html(record: &ReportRecord) -> Result<String, LighthouseError> {
    let labels = Labels(&record.i18n.renderer_formatted_strings);
    // `<` only occurs inside JSON strings, where `\u003c` reads the same.
    let embedded = serde_json::to_string(record)
        .map_err(|e| LighthouseError::Render(e.to_string()))?
        .replace('<', "\\u003c");

    let mut html = String::from("<!doctype html>");
    html.push_str(&format!(
        "<html lang=\"{}\"><head><meta charset=\"utf-8\"><title>{} - {}</title><style>{}</style></head><body>",
        escape_html(&record.config_settings.locale),
        labels.get("reportTitle"),
        escape_html(&record.final_url),
        STYLE
    ));
    html.push_str(&format!(
        "<header><h1>{}</h1><p>{}: <a href=\"{url}\">{url}</a></p><p>{}: {}</p></header>",
        labels.get("reportTitle"),
        labels.get("runtimeSettingsUrl"),
        labels.get("runtimeSettingsFetchTime"),
        escape_html(&record.fetch_time),
        url = escape_html(&record.final_url),
    ));

    if !record.run_warnings.is_empty() {
        html.push_str(&format!(
            "<div class=\"warnings\"><p>{}</p><ul>",
            labels.get("toplevelWarningsMessage")
        ));
        for warning in &record.run_warnings {
            html.push_str(&format!("<li>{}</li>", escape_html(warning)));
        }
        html.push_str("</ul></div>");
    }

    for category in record.categories.values() {
        html.push_str(&category_section(category, &record.audits, &labels));
    }

    html.push_str(&format!(
        "<footer>Lighthouse {}</footer><script type=\"application/json\" id=\"lighthouse-report\">{}</script></body></html>",
        escape_html(&record.lighthouse_version),
        embedded
    ));
    Ok(html)
}

// =============================================================================
// TESTS
// =============================================================================
