//! `total-byte-weight`: transfer size of the page.
//!
//! Options `goodBytes` and `poorBytes`; the score falls linearly between them.

use super::{Audit, AuditContext, AuditProduct, score_between};
use lighthouse_core::{BoxFuture, LighthouseError, ScoreDisplayMode};
use serde_json::json;

pub struct TotalByteWeight;

const DEFAULT_GOOD_BYTES: f64 = 1_600_000.0;
const DEFAULT_POOR_BYTES: f64 = 4_000_000.0;

impl Audit for TotalByteWeight {
    fn id(&self) -> &'static str {
        "total-byte-weight"
    }

    fn score_display_mode(&self) -> ScoreDisplayMode {
        ScoreDisplayMode::Numeric
    }

    fn audit(&self, context: AuditContext) -> BoxFuture<'static, Result<AuditProduct, LighthouseError>> {
        Box::pin(async move {
            let document = context.main_resource().await?;
            let good = context.option_f64("goodBytes", DEFAULT_GOOD_BYTES);
            let poor = context.option_f64("poorBytes", DEFAULT_POOR_BYTES);
            let bytes = document.body_bytes as f64;

            Ok(AuditProduct {
                score: Some(score_between(bytes, good, poor)),
                numeric_value: Some(bytes),
                display_value: Some(format!("Total size was {} KiB", (bytes / 1024.0).round())),
                details: Some(json!({
                    "type": "table",
                    "items": [{ "url": document.url, "totalBytes": document.body_bytes }],
                })),
                ..AuditProduct::default()
            })
        })
    }
}
