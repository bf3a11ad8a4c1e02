//! Screenshot primitive

use crate::{errors::ActionError, primitives::DefaultActionPrimitives, types::ExecCtx};
use cdp_adapter::{Cdp, ScreenshotOptions};
use tracing::info;

pub async fn execute_screenshot(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    options: &ScreenshotOptions,
) -> Result<Vec<u8>, ActionError> {
    ctx.ensure_active()?;
    let bytes = primitives
        .adapter()
        .screenshot(ctx.page, options, ctx.remaining_time())
        .await?;
    info!(
        target: "action-primitives",
        action_id = %ctx.action_id,
        full_page = options.full_page,
        bytes = bytes.len(),
        "Screenshot captured"
    );
    Ok(bytes)
}
