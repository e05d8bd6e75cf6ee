//! Computed artifacts shared by the built-in audits.
//!
//! - `MainResource`: the recorded main document, checked against the final URL
//! - `ResponseHeaders`: its headers with lowercased names (derived from `MainResource`)

use crate::collector::{MAIN_DOCUMENT, MainDocument};
use lighthouse_core::target::equal_ignoring_fragment;
use lighthouse_core::{Artifacts, ComputedArtifactRegistry, ComputedArtifacts, LighthouseError};
use serde_json::{Map, Value};
use std::sync::Arc;

pub const MAIN_RESOURCE: &str = "MainResource";
pub const RESPONSE_HEADERS: &str = "ResponseHeaders";

/// The computed artifact table used by [`super::BuiltinEvaluator`].
pub fn registry() -> Result<ComputedArtifactRegistry, LighthouseError> {
    ComputedArtifactRegistry::new()
        .with(MAIN_RESOURCE, |artifacts: Arc<Artifacts>, _| async move {
            main_resource(&artifacts)
        })?
        .with(RESPONSE_HEADERS, |_, computed: ComputedArtifacts| async move {
            response_headers(computed).await
        })
}

fn main_resource(artifacts: &Artifacts) -> Result<Value, LighthouseError> {
    let raw = artifacts.get(MAIN_DOCUMENT).ok_or_else(|| {
        LighthouseError::Evaluation(format!("Required {MAIN_DOCUMENT} artifact was not gathered"))
    })?;
    let document: MainDocument = serde_json::from_value(raw.clone())
        .map_err(|e| LighthouseError::Evaluation(format!("Invalid {MAIN_DOCUMENT}: {e}")))?;

    if !equal_ignoring_fragment(&document.url, &artifacts.url.final_url) {
        return Err(LighthouseError::Evaluation(format!(
            "Unable to identify the main resource: recorded {} but the page ended at {}",
            document.url, artifacts.url.final_url
        )));
    }
    serde_json::to_value(&document).map_err(|e| LighthouseError::Serialization(e.to_string()))
}

async fn response_headers(computed: ComputedArtifacts) -> Result<Value, LighthouseError> {
    let main = computed.request(MAIN_RESOURCE).await?;
    let headers: Map<String, Value> = main
        .get("headers")
        .and_then(Value::as_object)
        .map(|headers| {
            headers
                .iter()
                .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
                .collect()
        })
        .unwrap_or_default();
    Ok(Value::Object(headers))
}

// =============================================================================
// TESTS
// =============================================================================
