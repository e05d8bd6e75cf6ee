//! `http-status-code`: the page must not answer with an error status.

use super::{Audit, AuditContext, AuditProduct};
use lighthouse_core::{BoxFuture, LighthouseError};
use serde_json::json;

pub struct HttpStatusCode;

impl Audit for HttpStatusCode {
    fn id(&self) -> &'static str {
        "http-status-code"
    }

    fn audit(&self, context: AuditContext) -> BoxFuture<'static, Result<AuditProduct, LighthouseError>> {
        Box::pin(async move {
            let document = context.main_resource().await?;
            let status = document.status;
            let ok = (200..400).contains(&status);

            Ok(AuditProduct {
                score: Some(if ok { 1.0 } else { 0.0 }),
                numeric_value: Some(f64::from(status)),
                display_value: (!ok).then(|| format!("Status code {status}")),
                details: Some(json!({ "type": "debugdata", "statusCode": status })),
                ..AuditProduct::default()
            })
        })
    }
}
