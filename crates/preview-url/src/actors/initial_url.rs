//! Initial URL resolution.

use tracing::{debug, warn};
use url::Url;

use preview_auth::SecretIssuer;
use preview_events::PreviewEvent;

use super::{InitialUrlInput, SecretAccess};
use crate::config::PreviewSettings;
use crate::error::{PreviewUrlError, PreviewUrlResult};
use crate::options::{
    InitialUrlContext, InitialUrlOption, LegacyResolverContext, PreviewUrlOption,
    PreviewUrlOptions,
};

/// Legacy origin value meaning "the studio origin".
const SAME_ORIGIN: &str = "same-origin";

/// Resolve the default destination of the preview.
///
/// Shapes are tried in order: a plain URL, `initial` (literal or callback),
/// the legacy resolver, the legacy `origin`/`preview` pair, and finally the
/// studio root. The result is always absolute.
///
/// # Arguments
///
/// * `settings` - Studio settings; relative results resolve against its origin
/// * `option` - The preview URL option, if configured
/// * `input` - Caller-requested target and secret access, only used by the legacy resolver
/// * `issuer` - Provides the secret the legacy resolver receives
pub async fn resolve_initial_url(
    settings: &PreviewSettings,
    option: Option<&PreviewUrlOption>,
    input: InitialUrlInput,
    issuer: &dyn SecretIssuer,
) -> PreviewUrlResult<Url> {
    let url = match option {
        None => settings.resolve("/")?,
        Some(PreviewUrlOption::Url(url)) => settings.resolve(url)?,
        Some(PreviewUrlOption::Legacy(resolver)) => {
            let ctx = LegacyResolverContext {
                preview_url_secret: legacy_secret(input.secret_access, issuer).await?,
                preview_search_param: input.preview_search_param,
                studio_preview_perspective: settings.perspective.encode(),
                studio_base_path: settings.studio_base_path.clone(),
            };
            let resolved = resolver.call(ctx).await.map_err(PreviewUrlError::Callback)?;
            settings.resolve(&resolved)?
        }
        Some(PreviewUrlOption::Options(options)) => resolve_options(settings, options).await?,
    };

    debug!(initial_url = %url, "Resolved initial url");
    Ok(url)
}

/// Secret handed to the legacy resolver, empty when none may be attached.
async fn legacy_secret(access: SecretAccess, issuer: &dyn SecretIssuer) -> PreviewUrlResult<String> {
    match access {
        SecretAccess::Create => Ok(issuer.create_preview_secret().await?.secret),
        SecretAccess::ReadShared => Ok(issuer.read_shared_secret().await?.unwrap_or_default()),
        SecretAccess::Denied => {
            warn!("{}", PreviewEvent::DEGRADED_MESSAGE);
            Ok(String::new())
        }
    }
}

async fn resolve_options(
    settings: &PreviewSettings,
    options: &PreviewUrlOptions,
) -> PreviewUrlResult<Url> {
    match &options.initial {
        Some(InitialUrlOption::Url(url)) => settings.resolve(url),
        Some(InitialUrlOption::Resolver(resolver)) => {
            let ctx = InitialUrlContext {
                origin: settings.origin()?,
            };
            let resolved = resolver.call(ctx).await.map_err(PreviewUrlError::Callback)?;
            settings.resolve(&resolved)
        }
        None => {
            let base = match options.origin.as_deref() {
                None | Some(SAME_ORIGIN) => settings.studio_origin_url()?,
                Some(origin) => {
                    Url::parse(origin).map_err(|e| PreviewUrlError::invalid_url(origin, e))?
                }
            };
            let path = options.preview.as_deref().unwrap_or("/");
            base.join(path)
                .map_err(|e| PreviewUrlError::invalid_url(path, e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Resolver;
    use preview_auth::InMemorySecretStore;

    fn input(secret_access: SecretAccess) -> InitialUrlInput {
        InitialUrlInput {
            preview_search_param: None,
            secret_access,
        }
    }

    async fn resolve(option: Option<PreviewUrlOption>) -> PreviewUrlResult<Url> {
        let settings = PreviewSettings::new("http://localhost:3000");
        let issuer = InMemorySecretStore::default();
        resolve_initial_url(&settings, option.as_ref(), input(SecretAccess::Create), &issuer).await
    }

    fn echo_secret() -> PreviewUrlOption {
        PreviewUrlOption::Legacy(Resolver::from_fn(|ctx: LegacyResolverContext| {
            Ok(format!("/preview?secret={}", ctx.preview_url_secret))
        }))
    }

    async fn resolved(option: impl Into<PreviewUrlOption>) -> String {
        resolve(Some(option.into())).await.unwrap().to_string()
    }

    #[tokio::test]
    async fn test_defaults_to_studio_root() {
        assert_eq!(resolve(None).await.unwrap().as_str(), "http://localhost:3000/");
    }

    #[tokio::test]
    async fn test_plain_urls() {
        assert_eq!(resolved("/").await, "http://localhost:3000/");
        assert_eq!(resolved("/preview").await, "http://localhost:3000/preview");
        assert_eq!(resolved("https://example.com").await, "https://example.com/");
    }

    #[tokio::test]
    async fn test_initial_option() {
        assert_eq!(
            resolved(PreviewUrlOptions::new().initial("/preview")).await,
            "http://localhost:3000/preview"
        );
        assert_eq!(
            resolved(PreviewUrlOptions::new().initial("https://example.com")).await,
            "https://example.com/"
        );

        let sync = Resolver::from_fn(|_: InitialUrlContext| Ok("/preview".to_string()));
        assert_eq!(
            resolved(PreviewUrlOptions::new().initial(InitialUrlOption::Resolver(sync))).await,
            "http://localhost:3000/preview"
        );

        let from_origin = Resolver::from_async_fn(|ctx: InitialUrlContext| async move {
            Ok(format!("{}/preview", ctx.origin))
        });
        assert_eq!(
            resolved(PreviewUrlOptions::new().initial(InitialUrlOption::Resolver(from_origin))).await,
            "http://localhost:3000/preview"
        );
    }

    #[tokio::test]
    async fn test_legacy_resolver_receives_perspective_and_secret() {
        let legacy = Resolver::from_async_fn(|ctx: LegacyResolverContext| async move {
            assert!(!ctx.preview_url_secret.is_empty());
            let mut url = Url::parse("https://example.com").unwrap();
            url.query_pairs_mut()
                .append_pair("sanity-preview-perspective", &ctx.studio_preview_perspective);
            Ok(url.to_string())
        });
        assert_eq!(
            resolved(PreviewUrlOption::Legacy(legacy)).await,
            "https://example.com/?sanity-preview-perspective=drafts"
        );
    }

    #[tokio::test]
    async fn test_legacy_resolver_without_create_grant_reads_shared_secret() {
        let settings = PreviewSettings::new("http://localhost:3000");
        let issuer = InMemorySecretStore::default();
        let shared = issuer.enable_share_access().await;
        let option = echo_secret();

        let url = resolve_initial_url(&settings, Some(&option), input(SecretAccess::ReadShared), &issuer)
            .await
            .unwrap();

        assert_eq!(url.query(), Some(format!("secret={}", shared.secret).as_str()));
        assert_eq!(issuer.secret_count().await, 0);
    }

    #[tokio::test]
    async fn test_legacy_resolver_without_grants_gets_empty_secret() {
        let settings = PreviewSettings::new("http://localhost:3000");
        let issuer = InMemorySecretStore::default();
        issuer.enable_share_access().await;
        let option = echo_secret();

        let url = resolve_initial_url(&settings, Some(&option), input(SecretAccess::Denied), &issuer)
            .await
            .unwrap();

        assert_eq!(url.as_str(), "http://localhost:3000/preview?secret=");
        assert_eq!(issuer.secret_count().await, 0);
    }

    #[test]
    fn test_secret_access_prefers_create() {
        assert_eq!(SecretAccess::from_grants(true, true), SecretAccess::Create);
        assert_eq!(SecretAccess::from_grants(true, false), SecretAccess::Create);
        assert_eq!(SecretAccess::from_grants(false, true), SecretAccess::ReadShared);
        assert_eq!(SecretAccess::from_grants(false, false), SecretAccess::Denied);
    }

    #[tokio::test]
    async fn test_legacy_origin_and_preview() {
        assert_eq!(
            resolved(PreviewUrlOptions::new().origin("https://example.com")).await,
            "https://example.com/"
        );
        assert_eq!(
            resolved(PreviewUrlOptions::new().preview("/preview")).await,
            "http://localhost:3000/preview"
        );
        assert_eq!(
            resolved(
                PreviewUrlOptions::new()
                    .origin("https://example.com")
                    .preview("/preview")
            )
            .await,
            "https://example.com/preview"
        );
        assert_eq!(
            resolved(PreviewUrlOptions::new().origin("same-origin").preview("/preview")).await,
            "http://localhost:3000/preview"
        );
    }

    #[tokio::test]
    async fn test_callback_failure() {
        let failing = Resolver::from_fn(|_: InitialUrlContext| Err("boom".into()));
        let err = resolve(Some(
            PreviewUrlOptions::new()
                .initial(InitialUrlOption::Resolver(failing))
                .into(),
        ))
        .await
        .unwrap_err();
        assert!(matches!(err, PreviewUrlError::Callback(_)));
    }

    #[tokio::test]
    async fn test_malformed_origin() {
        let err = resolve(Some(PreviewUrlOptions::new().origin("not a url").into()))
            .await
            .unwrap_err();
        assert!(matches!(err, PreviewUrlError::InvalidUrl { .. }));
    }
}
