//! Navigation target validation.

use tracing::{debug, warn};
use url::Url;

use crate::pattern::OriginPattern;

/// Resolve a caller-requested navigation target.
///
/// The target is resolved relative to the origin of `initial_url`. Targets on
/// the same origin are always accepted; other origins must match one of
/// `allow_origins`. Untrusted or malformed targets are discarded and
/// `initial_url` is returned unchanged.
pub fn resolve_url_from_search_param(
    initial_url: &Url,
    preview_search_param: Option<&str>,
    allow_origins: &[OriginPattern],
) -> Url {
    let Some(param) = preview_search_param.filter(|p| !p.is_empty()) else {
        return initial_url.clone();
    };

    let base = initial_url.origin().ascii_serialization();
    let candidate = match Url::parse(&base).and_then(|base| base.join(param)) {
        Ok(candidate) => candidate,
        Err(e) => {
            debug!(error = %e, "Discarding malformed preview search param");
            return initial_url.clone();
        }
    };

    if candidate.origin() == initial_url.origin()
        || allow_origins.iter().any(|pattern| pattern.test_url(&candidate))
    {
        return candidate;
    }

    warn!(
        origin = %candidate.origin().ascii_serialization(),
        "Discarding preview search param outside the allow list"
    );
    initial_url.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(initial_url: &str, param: Option<&str>, allow: &[&str]) -> String {
        let patterns: Vec<OriginPattern> = allow
            .iter()
            .map(|p| OriginPattern::parse(p).unwrap())
            .collect();
        resolve_url_from_search_param(&Url::parse(initial_url).unwrap(), param, &patterns)
            .to_string()
    }

    #[test]
    fn test_missing_param_keeps_initial_url() {
        assert_eq!(resolve("https://example.com", None, &[]), "https://example.com/");
        assert_eq!(resolve("https://example.com/a", Some(""), &[]), "https://example.com/a");
    }

    #[test]
    fn test_relative_param_uses_initial_origin() {
        assert_eq!(
            resolve("https://example.com/docs", Some("/preview"), &["https://example.com"]),
            "https://example.com/preview"
        );
        assert_eq!(
            resolve("https://example.com", Some("/blog"), &["http://localhost:*", "https://example.com"]),
            "https://example.com/blog"
        );
        assert_eq!(
            resolve("http://localhost:3000", Some("/blog"), &["http://localhost:*"]),
            "http://localhost:3000/blog"
        );
    }

    #[test]
    fn test_untrusted_origin_is_discarded() {
        assert_eq!(
            resolve("https://example.com", Some("http://localhost:3000"), &["https://example.com"]),
            "https://example.com/"
        );
    }

    #[test]
    fn test_allowed_origin_is_accepted() {
        assert_eq!(
            resolve("http://localhost:3000", Some("http://localhost:3333"), &["http://localhost:*"]),
            "http://localhost:3333/"
        );
        assert_eq!(
            resolve(
                "http://localhost:3333",
                Some("http://localhost:3333"),
                &["https://example.com", "http://localhost:3333"]
            ),
            "http://localhost:3333/"
        );
    }

    #[test]
    fn test_malformed_param_is_discarded() {
        assert_eq!(
            resolve("https://example.com/a", Some("http://[::1"), &["https://example.com"]),
            "https://example.com/a"
        );
    }
}
