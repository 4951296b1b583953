//! Allow pattern resolution.

use tracing::debug;
use url::Url;

use crate::config::PreviewSettings;
use crate::error::{PreviewUrlError, PreviewUrlResult};
use crate::options::{AllowOption, AllowOptionContext};
use crate::pattern::OriginPattern;

/// Resolve the origins the preview may navigate to.
///
/// Without an allow option, or with an empty one, only the origin of
/// `initial_url` is allowed. Declared patterns are compiled in order and the
/// origin of `initial_url` is appended when none of them matches it.
///
/// # Errors
///
/// - `PreviewUrlError::InsecurePattern` if any pattern allows every hostname
/// - `PreviewUrlError::InvalidPattern` if any pattern is malformed
/// - `PreviewUrlError::Callback` if the allow callback fails
pub async fn resolve_allow_patterns(
    settings: &PreviewSettings,
    option: Option<&AllowOption>,
    initial_url: Url,
) -> PreviewUrlResult<Vec<OriginPattern>> {
    let initial_origin = OriginPattern::from_origin(&initial_url);

    let declared = match option {
        None => Vec::new(),
        Some(AllowOption::Pattern(pattern)) => vec![pattern.clone()],
        Some(AllowOption::Patterns(patterns)) => patterns.clone(),
        Some(AllowOption::Resolver(resolver)) => {
            let ctx = AllowOptionContext {
                origin: settings.origin()?,
                initial_url: initial_url.clone(),
            };
            resolver.call(ctx).await.map_err(PreviewUrlError::Callback)?
        }
    };

    let mut patterns = declared
        .iter()
        .map(|pattern| OriginPattern::parse(pattern))
        .collect::<PreviewUrlResult<Vec<_>>>()?;

    if !patterns.iter().any(|pattern| pattern.test_url(&initial_url)) {
        patterns.push(initial_origin);
    }

    debug!(
        patterns = ?patterns.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "Resolved allow patterns"
    );
    Ok(patterns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Resolver;

    fn pattern(input: &str) -> OriginPattern {
        OriginPattern::parse(input).unwrap()
    }

    async fn resolve(initial_url: &str, option: Option<AllowOption>) -> PreviewUrlResult<Vec<OriginPattern>> {
        let settings = PreviewSettings::new("http://localhost:3000");
        resolve_allow_patterns(&settings, option.as_ref(), Url::parse(initial_url).unwrap()).await
    }

    #[tokio::test]
    async fn test_defaults_to_initial_origin() {
        assert_eq!(
            resolve("https://example.com/preview", None).await.unwrap(),
            vec![pattern("https://example.com")]
        );
        assert_eq!(
            resolve("https://example.com/preview", Some(AllowOption::Patterns(vec![])))
                .await
                .unwrap(),
            vec![pattern("https://example.com")]
        );
    }

    #[tokio::test]
    async fn test_declared_patterns_cover_initial_origin() {
        assert_eq!(
            resolve("http://localhost:3333", Some("http://localhost:*".into()))
                .await
                .unwrap(),
            vec![pattern("http://localhost:*")]
        );
        assert_eq!(
            resolve(
                "https://example.com",
                Some(vec!["https://example.com", "http://localhost:*"].into())
            )
            .await
            .unwrap(),
            vec![pattern("https://example.com"), pattern("http://localhost:*")]
        );
    }

    #[tokio::test]
    async fn test_initial_origin_is_appended() {
        assert_eq!(
            resolve("http://localhost:3000", Some("http://localhost:3333".into()))
                .await
                .unwrap(),
            vec![pattern("http://localhost:3333"), pattern("http://localhost:3000")]
        );
        assert_eq!(
            resolve("https://example.com", Some("http://localhost:*".into()))
                .await
                .unwrap(),
            vec![pattern("http://localhost:*"), pattern("https://example.com")]
        );
    }

    #[tokio::test]
    async fn test_callback_receives_context() {
        let from_context = Resolver::from_fn(|ctx: AllowOptionContext| {
            Ok(vec![ctx.origin, ctx.initial_url.origin().ascii_serialization()])
        });
        assert_eq!(
            resolve("https://example.sanity.dev", Some(AllowOption::Resolver(from_context)))
                .await
                .unwrap(),
            vec![pattern("http://localhost:3000"), pattern("https://example.sanity.dev")]
        );

        let branches = Resolver::from_async_fn(|_: AllowOptionContext| async {
            Ok(vec![
                "https://example.sanity.build".to_string(),
                "https://example.sanity.dev".to_string(),
                "https://example-git-*.sanity.dev".to_string(),
            ])
        });
        assert_eq!(
            resolve("https://example-git-main.sanity.build", Some(AllowOption::Resolver(branches)))
                .await
                .unwrap(),
            vec![
                pattern("https://example.sanity.build"),
                pattern("https://example.sanity.dev"),
                pattern("https://example-git-*.sanity.dev"),
                pattern("https://example-git-main.sanity.build"),
            ]
        );
    }

    #[tokio::test]
    async fn test_rejects_any_hostname() {
        for input in [
            "://*",
            "http://*",
            "https://*",
            "://*/foo/bar?foo=bar#hash",
            "https://username:password@*",
        ] {
            let err = resolve("http://localhost:3000", Some(input.into()))
                .await
                .unwrap_err();
            assert!(err.to_string().contains("insecure"), "{}", input);
        }
    }

    #[tokio::test]
    async fn test_one_bad_pattern_fails_the_list() {
        let err = resolve(
            "http://localhost:3000",
            Some(vec!["http://localhost:*", "https://*"].into()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PreviewUrlError::InsecurePattern { .. }));
    }
}
