//! # Telemetry
//!
//! Run failures and phase breadcrumbs forwarded to `tracing`.

use lighthouse_core::{LighthouseError, TelemetryMeta, TelemetrySink};

/// Telemetry sink that logs through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn capture_exception(&self, error: &LighthouseError, meta: &TelemetryMeta) {
        tracing::error!(
            target: "lighthouse::telemetry",
            phase = %meta.phase,
            fatal = meta.fatal,
            url = meta.url.as_deref().unwrap_or_default(),
            %error,
            "exception captured"
        );
    }

    fn capture_breadcrumb(&self, meta: &TelemetryMeta) {
        tracing::debug!(
            target: "lighthouse::telemetry",
            phase = %meta.phase,
            url = meta.url.as_deref().unwrap_or_default(),
            "breadcrumb"
        );
    }
}
