//! `is-on-https`: the page and every hop that led to it use a secure scheme.
//!
//! Plain HTTP to loopback hosts counts as secure.

use super::{Audit, AuditContext, AuditProduct};
use lighthouse_core::{BoxFuture, LighthouseError};
use serde_json::json;

pub struct IsOnHttps;

fn is_secure(raw: &str) -> bool {
    let Ok(url) = url::Url::parse(raw) else {
        return false;
    };
    match url.scheme() {
        "https" | "wss" | "data" | "blob" | "about" | "chrome" => true,
        "http" | "ws" => matches!(
            url.host_str(),
            Some("localhost" | "127.0.0.1" | "[::1]")
        ),
        _ => false,
    }
}

impl Audit for IsOnHttps {
    fn id(&self) -> &'static str {
        "is-on-https"
    }

    fn audit(&self, context: AuditContext) -> BoxFuture<'static, Result<AuditProduct, LighthouseError>> {
        Box::pin(async move {
            let document = context.main_resource().await?;
            let mut insecure: Vec<String> = document
                .redirects
                .iter()
                .map(|hop| hop.url.clone())
                .chain(std::iter::once(context.artifacts.url.final_url.clone()))
                .filter(|url| !is_secure(url))
                .collect();
            insecure.dedup();

            let count = insecure.len();
            let items: Vec<_> = insecure.iter().map(|url| json!({ "url": url })).collect();
            Ok(AuditProduct {
                score: Some(if count == 0 { 1.0 } else { 0.0 }),
                numeric_value: Some(count as f64),
                display_value: (count > 0).then(|| match count {
                    1 => "1 insecure request found".to_string(),
                    n => format!("{n} insecure requests found"),
                }),
                details: Some(json!({ "type": "table", "items": items })),
                ..AuditProduct::default()
            })
        })
    }
}
