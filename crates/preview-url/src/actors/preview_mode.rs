//! Preview mode resolution.

use tracing::debug;

use crate::config::PreviewSettings;
use crate::error::{PreviewUrlError, PreviewUrlResult};
use crate::options::{PreviewMode, PreviewModeContext, PreviewModeOption, PreviewUrlOption};

/// Resolve whether, and how, preview mode is enabled on `target_origin`.
///
/// Legacy `draft_mode` settings win over `preview_mode`. Only structured
/// options can enable preview mode; plain URLs and the legacy resolver never
/// do. A callback returning `None` disables preview mode.
pub async fn resolve_preview_mode(
    settings: &PreviewSettings,
    option: Option<&PreviewUrlOption>,
    target_origin: String,
) -> PreviewUrlResult<Option<PreviewMode>> {
    let Some(PreviewUrlOption::Options(options)) = option else {
        return Ok(None);
    };

    if let Some(draft_mode) = &options.draft_mode {
        return Ok(Some(draft_mode.normalize()));
    }

    let resolved = match &options.preview_mode {
        None => None,
        Some(PreviewModeOption::Settings(declared)) => Some(declared.normalize()),
        Some(PreviewModeOption::Resolver(resolver)) => {
            let ctx = PreviewModeContext {
                origin: settings.origin()?,
                target_origin,
            };
            resolver
                .call(ctx)
                .await
                .map_err(PreviewUrlError::Callback)?
                .map(|declared| declared.normalize())
        }
    };

    debug!(preview_mode = ?resolved, "Resolved preview mode");
    Ok(resolved)
}
