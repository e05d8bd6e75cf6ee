//! # Target URLs
//!
//! Canonicalization of the page being audited and the fragment-insensitive
//! comparison used when evaluating previously collected artifacts.

use crate::LighthouseError;
use url::Url;

/// Parse `target` as an absolute URL and return its canonical serialization.
pub fn canonicalize(target: &str) -> Result<String, LighthouseError> {
    let trimmed = target.trim();
    if trimmed.is_empty() {
        return Err(LighthouseError::MissingTarget);
    }

    Url::parse(trimmed)
        .map(String::from)
        .map_err(|e| LighthouseError::InvalidTarget {
            target: target.to_string(),
            reason: e.to_string(),
        })
}

/// Compare two URLs ignoring their fragments. Unparsable input is never equal.
#[must_use]
pub fn equal_ignoring_fragment(a: &str, b: &str) -> bool {
    match (without_fragment(a), without_fragment(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn without_fragment(raw: &str) -> Option<Url> {
    let mut url = Url::parse(raw.trim()).ok()?;
    url.set_fragment(None);
    Some(url)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_normalizes() {
        assert_eq!(
            canonicalize("HTTPS://Example.COM").expect("valid"),
            "https://example.com/"
        );
    }

    #[test]
    fn canonicalize_rejects_relative() {
        let err = canonicalize("example.com/page").expect_err("relative");
        assert!(matches!(err, LighthouseError::InvalidTarget { .. }));
    }

    #[test]
    fn canonicalize_blank_is_missing() {
        assert_eq!(canonicalize("  "), Err(LighthouseError::MissingTarget));
    }

    #[test]
    fn fragments_are_ignored() {
        assert!(equal_ignoring_fragment(
            "https://a.test/page#top",
            "https://a.test/page"
        ));
        assert!(equal_ignoring_fragment(
            "https://a.test/page#one",
            "https://a.test/page#two"
        ));
    }

    #[test]
    fn path_and_host_differences_count() {
        assert!(!equal_ignoring_fragment(
            "https://a.test/page",
            "https://a.test/other"
        ));
        assert!(!equal_ignoring_fragment("https://a.test/", "https://b.test/"));
        assert!(!equal_ignoring_fragment("not a url", "not a url"));
    }
}
