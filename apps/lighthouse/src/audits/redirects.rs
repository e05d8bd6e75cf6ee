//! `redirects`: time lost to redirect hops before the page starts loading.
//!
//! Under simulated throttling each hop costs one round trip; otherwise the
//! measured hop durations are used.

use super::{Audit, AuditContext, AuditProduct, score_for_wasted_ms};
use lighthouse_core::{BoxFuture, LighthouseError, ScoreDisplayMode, ThrottlingMethod};
use serde_json::json;

pub struct Redirects;

impl Audit for Redirects {
    fn id(&self) -> &'static str {
        "redirects"
    }

    fn score_display_mode(&self) -> ScoreDisplayMode {
        ScoreDisplayMode::Numeric
    }

    fn audit(&self, context: AuditContext) -> BoxFuture<'static, Result<AuditProduct, LighthouseError>> {
        Box::pin(async move {
            let document = context.main_resource().await?;
            let rtt_ms = context.settings.throttling.rtt_ms;
            let simulated = context.settings.throttling_method == ThrottlingMethod::Simulate;

            let items: Vec<_> = document
                .redirects
                .iter()
                .map(|hop| {
                    let wasted_ms = if simulated { rtt_ms } else { hop.duration_ms };
                    json!({ "url": hop.url, "status": hop.status, "wastedMs": wasted_ms })
                })
                .collect();
            let wasted_ms: f64 = items
                .iter()
                .filter_map(|item| item["wastedMs"].as_f64())
                .sum();

            Ok(AuditProduct {
                score: Some(score_for_wasted_ms(wasted_ms)),
                numeric_value: Some(wasted_ms),
                display_value: (wasted_ms > 0.0)
                    .then(|| format!("Potential savings of {} ms", wasted_ms.round())),
                details: Some(json!({
                    "type": "opportunity",
                    "overallSavingsMs": wasted_ms,
                    "items": items,
                })),
                ..AuditProduct::default()
            })
        })
    }
}
