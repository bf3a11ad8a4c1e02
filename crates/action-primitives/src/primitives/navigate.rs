//! Navigate primitive - load a URL and wait for the document to become ready

use crate::{
    errors::ActionError,
    primitives::DefaultActionPrimitives,
    types::{ActionReport, ExecCtx},
};
use cdp_adapter::Cdp;
use chrono::Utc;
use std::time::Instant;
use tracing::{debug, info};

const ALLOWED_SCHEMES: [&str; 5] = ["http", "https", "file", "about", "data"];

/// Rejects empty URLs and schemes the browser cannot be pointed at.
pub fn validate_url(url: &str) -> Result<(), ActionError> {
    if url.trim().is_empty() {
        return Err(ActionError::InvalidUrl("URL cannot be empty".to_string()));
    }
    let scheme = url
        .split_once(':')
        .map(|(scheme, _)| scheme.to_ascii_lowercase())
        .ok_or_else(|| ActionError::InvalidUrl(format!("missing scheme in '{url}'")))?;
    if !ALLOWED_SCHEMES.contains(&scheme.as_str()) {
        return Err(ActionError::InvalidUrl(format!(
            "unsupported scheme '{scheme}' in '{url}'"
        )));
    }
    Ok(())
}

/// Execute navigate primitive
///
/// Steps:
/// 1. Validate URL format
/// 2. Check execution context (not cancelled, not timeout)
/// 3. Issue `Page.navigate` and wait for `document.readyState`
pub async fn execute_navigate(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    url: &str,
) -> Result<ActionReport, ActionError> {
    let started_at = Utc::now();
    let start_instant = Instant::now();

    info!(
        target: "action-primitives",
        action_id = %ctx.action_id,
        url = %url,
        "Executing navigate primitive"
    );

    validate_url(url)?;
    ctx.ensure_active()?;

    debug!(target: "action-primitives", "Issuing CDP Page.navigate command");
    primitives
        .adapter()
        .navigate(ctx.page, url, ctx.remaining_time())
        .await?;

    let latency_ms = start_instant.elapsed().as_millis() as u64;

    info!(
        target: "action-primitives",
        action_id = %ctx.action_id,
        latency_ms = latency_ms,
        "Navigate completed successfully"
    );

    Ok(ActionReport::success(started_at, latency_ms))
}
