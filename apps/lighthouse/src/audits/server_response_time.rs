//! `server-response-time`: how long the root document took to start responding.
//!
//! Option `thresholdMs` (default 600).

use super::{Audit, AuditContext, AuditProduct};
use lighthouse_core::{BoxFuture, LighthouseError};
use serde_json::json;

pub struct ServerResponseTime;

const DEFAULT_THRESHOLD_MS: f64 = 600.0;

impl Audit for ServerResponseTime {
    fn id(&self) -> &'static str {
        "server-response-time"
    }

    fn audit(&self, context: AuditContext) -> BoxFuture<'static, Result<AuditProduct, LighthouseError>> {
        Box::pin(async move {
            let document = context.main_resource().await?;
            let threshold_ms = context.option_f64("thresholdMs", DEFAULT_THRESHOLD_MS);
            let response_ms = document.response_time_ms;
            let passed = response_ms <= threshold_ms;

            Ok(AuditProduct {
                score: Some(if passed { 1.0 } else { 0.0 }),
                numeric_value: Some(response_ms),
                display_value: Some(format!("Root document took {} ms", response_ms.round())),
                details: Some(json!({
                    "type": "opportunity",
                    "overallSavingsMs": (response_ms - threshold_ms).max(0.0),
                    "items": [{ "url": document.url, "responseTime": response_ms }],
                })),
                ..AuditProduct::default()
            })
        })
    }
}
