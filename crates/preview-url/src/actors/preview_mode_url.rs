//! Preview mode URL composition.

use url::Url;

use crate::error::{PreviewUrlError, PreviewUrlResult};
use crate::options::PreviewMode;
use crate::perspective::Perspective;

/// Query parameter carrying the preview secret.
pub const SEARCH_PARAM_SECRET: &str = "sanity-preview-secret";

/// Query parameter carrying the encoded perspective.
pub const SEARCH_PARAM_PERSPECTIVE: &str = "sanity-preview-perspective";

/// Query parameter carrying the path to redirect to once preview mode is on.
pub const SEARCH_PARAM_PATHNAME: &str = "sanity-preview-pathname";

/// Build the URL that enables preview mode and lands on `initial_url`.
///
/// The enable endpoint is resolved against `initial_url`. When the endpoint
/// lives on a different path, the path, query and fragment of `initial_url`
/// are carried in [`SEARCH_PARAM_PATHNAME`] so the target can redirect back.
///
/// # Example
///
/// ```rust
/// use preview_url::{build_preview_mode_url, Perspective, PreviewMode};
/// use url::Url;
///
/// let initial = Url::parse("http://localhost:3000/blog?page=2").unwrap();
/// let mode = PreviewMode { enable: "/api/draft-mode/enable".into(), share_access: true };
/// let url = build_preview_mode_url(&initial, &mode, Some("abc123"), &Perspective::Drafts).unwrap();
///
/// assert_eq!(
///     url.as_str(),
///     "http://localhost:3000/api/draft-mode/enable?sanity-preview-secret=abc123\
///      &sanity-preview-perspective=drafts&sanity-preview-pathname=%2Fblog%3Fpage%3D2"
/// );
/// ```
pub fn build_preview_mode_url(
    initial_url: &Url,
    preview_mode: &PreviewMode,
    secret: Option<&str>,
    perspective: &Perspective,
) -> PreviewUrlResult<Url> {
    let mut url = initial_url
        .join(&preview_mode.enable)
        .map_err(|e| PreviewUrlError::invalid_url(preview_mode.enable.clone(), e))?;

    if let Some(secret) = secret {
        set_search_param(&mut url, SEARCH_PARAM_SECRET, secret);
    }
    set_search_param(&mut url, SEARCH_PARAM_PERSPECTIVE, &perspective.encode());

    if url.path() != initial_url.path() {
        let mut pathname = initial_url.path().to_string();
        if let Some(query) = initial_url.query().filter(|q| !q.is_empty()) {
            pathname.push('?');
            pathname.push_str(query);
        }
        if let Some(fragment) = initial_url.fragment().filter(|f| !f.is_empty()) {
            pathname.push('#');
            pathname.push_str(fragment);
        }
        set_search_param(&mut url, SEARCH_PARAM_PATHNAME, &pathname);
    }

    Ok(url)
}

/// Remove the preview parameters from `url`, for display and sharing.
pub fn without_secret_search_params(url: &Url) -> Url {
    let mut url = url.clone();
    retain_search_params(&mut url, |key| {
        !matches!(
            key,
            SEARCH_PARAM_SECRET | SEARCH_PARAM_PERSPECTIVE | SEARCH_PARAM_PATHNAME
        )
    });
    url
}

/// Replace every value of `key` with `value`, keeping the first position.
fn set_search_param(url: &mut Url, key: &str, value: &str) {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    match pairs.iter().position(|(k, _)| k == key) {
        Some(index) => {
            pairs[index].1 = value.to_string();
            let mut seen = false;
            pairs.retain(|(k, _)| {
                if k != key {
                    return true;
                }
                let keep = !seen;
                seen = true;
                keep
            });
        }
        None => pairs.push((key.to_string(), value.to_string())),
    }

    url.query_pairs_mut().clear().extend_pairs(pairs);
}

fn retain_search_params(url: &mut Url, keep: impl Fn(&str) -> bool) {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| keep(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }
}
