//! `uses-text-compression`: text responses should be sent compressed.
//!
//! Savings assume compression to 30% of the original size; the time lost is
//! those bytes at the configured throughput. Responses below `minBytes`
//! (default 1400) are not worth flagging.

use super::computed::RESPONSE_HEADERS;
use super::{Audit, AuditContext, AuditProduct, score_for_wasted_ms};
use lighthouse_core::{BoxFuture, LighthouseError, ScoreDisplayMode};
use serde_json::json;

pub struct UsesTextCompression;

const COMPRESSED_RATIO: f64 = 0.3;
const DEFAULT_MIN_BYTES: f64 = 1400.0;

fn is_text(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime.starts_with("text/")
        || mime.ends_with("+xml")
        || mime.ends_with("+json")
        || matches!(
            mime.as_str(),
            "application/javascript" | "application/json" | "application/xml" | "image/svg+xml"
        )
}

impl Audit for UsesTextCompression {
    fn id(&self) -> &'static str {
        "uses-text-compression"
    }

    fn score_display_mode(&self) -> ScoreDisplayMode {
        ScoreDisplayMode::Numeric
    }

    fn audit(&self, context: AuditContext) -> BoxFuture<'static, Result<AuditProduct, LighthouseError>> {
        Box::pin(async move {
            let document = context.main_resource().await?;
            let headers = context.computed.request(RESPONSE_HEADERS).await?;

            let content_type = headers["content-type"].as_str().unwrap_or_default();
            if !is_text(content_type) {
                return Ok(AuditProduct {
                    not_applicable: true,
                    ..AuditProduct::default()
                });
            }

            let encoded = headers["content-encoding"]
                .as_str()
                .is_some_and(|encoding| !encoding.trim().eq_ignore_ascii_case("identity"));
            let bytes = document.body_bytes as f64;
            let min_bytes = context.option_f64("minBytes", DEFAULT_MIN_BYTES);
            let wasted_bytes = if encoded || bytes < min_bytes {
                0.0
            } else {
                bytes * (1.0 - COMPRESSED_RATIO)
            };
            // kbps is bits per millisecond
            let throughput = context.settings.throttling.throughput_kbps.max(1.0);
            let wasted_ms = wasted_bytes * 8.0 / throughput;

            let items = if wasted_bytes > 0.0 {
                vec![json!({
                    "url": document.url,
                    "totalBytes": document.body_bytes,
                    "wastedBytes": wasted_bytes.round(),
                })]
            } else {
                Vec::new()
            };
            Ok(AuditProduct {
                score: Some(score_for_wasted_ms(wasted_ms)),
                numeric_value: Some(wasted_ms),
                display_value: (wasted_bytes > 0.0)
                    .then(|| format!("Potential savings of {} KiB", (wasted_bytes / 1024.0).round())),
                details: Some(json!({
                    "type": "opportunity",
                    "overallSavingsMs": wasted_ms,
                    "overallSavingsBytes": wasted_bytes.round(),
                    "items": items,
                })),
                ..AuditProduct::default()
            })
        })
    }
}
