//! Action primitives implementation
//!
//! Locator-driven primitives used by the flow runner:
//! 1. navigate - load a URL and wait for the document to become ready
//! 2. click - pointer click on the element a locator resolves to
//! 3. fill - replace the value of a form control
//! 4. wait_for - bounded waits on elements, URLs or a fixed pause
//! 5. expect_visible / expect_text / read_text - assertions on rendered text
//! 6. screenshot - PNG/JPEG capture of the page

mod click;
mod expect;
mod navigate;
mod screenshot;
mod type_text;
mod wait;

pub use expect::normalize_text;
pub use navigate::validate_url;

use async_trait::async_trait;
use cdp_adapter::{CdpAdapter, ScreenshotOptions};
use std::sync::Arc;

use crate::{
    errors::ActionError,
    locator::{AnchorResolver, Resolution, ResolvedSelector, ScriptAnchorResolver},
    types::{ActionReport, ExecCtx, Locator, WaitCondition},
    waiting::{PollSettings, Check},
};

/// Action primitives trait
///
/// Every primitive checks the execution context first, then acts through the
/// CDP adapter and reports latency plus anything it read from the page.
#[async_trait]
pub trait ActionPrimitives: Send + Sync {
    /// Navigate to an absolute URL
    async fn navigate(&self, ctx: &ExecCtx, url: &str) -> Result<ActionReport, ActionError>;

    async fn click(&self, ctx: &ExecCtx, locator: &Locator) -> Result<ActionReport, ActionError>;

    /// Replace the value of the control `locator` resolves to
    async fn fill(
        &self,
        ctx: &ExecCtx,
        locator: &Locator,
        value: &str,
    ) -> Result<ActionReport, ActionError>;

    /// Wait for condition
    async fn wait_for(
        &self,
        ctx: &ExecCtx,
        condition: &WaitCondition,
        timeout_ms: u64,
    ) -> Result<ActionReport, ActionError>;

    /// Rendered text of the element, once visible
    async fn read_text(&self, ctx: &ExecCtx, locator: &Locator) -> Result<String, ActionError>;

    async fn expect_visible(
        &self,
        ctx: &ExecCtx,
        locator: &Locator,
        timeout_ms: u64,
    ) -> Result<ActionReport, ActionError>;

    /// Element text equals `expected` after whitespace normalisation
    async fn expect_text(
        &self,
        ctx: &ExecCtx,
        locator: &Locator,
        expected: &str,
        timeout_ms: u64,
    ) -> Result<ActionReport, ActionError>;

    async fn screenshot(
        &self,
        ctx: &ExecCtx,
        options: &ScreenshotOptions,
    ) -> Result<Vec<u8>, ActionError>;

    async fn current_url(&self, ctx: &ExecCtx) -> Result<String, ActionError>;
}

/// Default implementation of action primitives
pub struct DefaultActionPrimitives {
    /// CDP adapter for browser communication
    adapter: Arc<CdpAdapter>,

    /// Resolver used to turn locators into actionable selectors
    anchor_resolver: Arc<dyn AnchorResolver>,

    polling: PollSettings,
}

impl DefaultActionPrimitives {
    pub fn new(adapter: Arc<CdpAdapter>) -> Self {
        Self::with_anchor_resolver(adapter, Arc::new(ScriptAnchorResolver::default()))
    }

    /// Create a primitives implementation with a custom anchor resolver
    pub fn with_anchor_resolver(
        adapter: Arc<CdpAdapter>,
        anchor_resolver: Arc<dyn AnchorResolver>,
    ) -> Self {
        Self {
            adapter,
            anchor_resolver,
            polling: PollSettings::default(),
        }
    }

    pub fn with_polling(mut self, polling: PollSettings) -> Self {
        self.polling = polling;
        self
    }

    pub fn adapter(&self) -> &Arc<CdpAdapter> {
        &self.adapter
    }

    /// Single resolution attempt, no waiting.
    pub async fn resolve_once(
        &self,
        ctx: &ExecCtx,
        locator: &Locator,
    ) -> Result<Resolution, ActionError> {
        self.anchor_resolver
            .resolve(self.adapter.as_ref(), ctx.page, locator)
            .await
    }

    /// Polls until `locator` resolves to a visible element or the context
    /// budget runs out.
    pub async fn locate(
        &self,
        ctx: &ExecCtx,
        locator: &Locator,
    ) -> Result<ResolvedSelector, ActionError> {
        ctx.ensure_active()?;
        let outcome = self
            .polling
            .until(ctx, ctx.remaining_time(), move || async move {
                Ok::<_, ActionError>(match self.resolve_once(ctx, locator).await? {
                    Resolution::Found(resolved) => Check::Ready(resolved),
                    other => Check::Pending(Some(other.observation())),
                })
            })
            .await?;
        outcome.map_err(|stalled| {
            ActionError::AnchorNotFound(format!(
                "{locator} did not resolve to a visible element {}",
                stalled.describe()
            ))
        })
    }
}

#[async_trait]
impl ActionPrimitives for DefaultActionPrimitives {
    async fn navigate(&self, ctx: &ExecCtx, url: &str) -> Result<ActionReport, ActionError> {
        navigate::execute_navigate(self, ctx, url).await
    }

    async fn click(&self, ctx: &ExecCtx, locator: &Locator) -> Result<ActionReport, ActionError> {
        click::execute_click(self, ctx, locator).await
    }

    async fn fill(
        &self,
        ctx: &ExecCtx,
        locator: &Locator,
        value: &str,
    ) -> Result<ActionReport, ActionError> {
        type_text::execute_fill(self, ctx, locator, value).await
    }

    async fn wait_for(
        &self,
        ctx: &ExecCtx,
        condition: &WaitCondition,
        timeout_ms: u64,
    ) -> Result<ActionReport, ActionError> {
        wait::execute_wait(self, ctx, condition, timeout_ms).await
    }

    async fn read_text(&self, ctx: &ExecCtx, locator: &Locator) -> Result<String, ActionError> {
        Ok(self.locate(ctx, locator).await?.text)
    }

    async fn expect_visible(
        &self,
        ctx: &ExecCtx,
        locator: &Locator,
        timeout_ms: u64,
    ) -> Result<ActionReport, ActionError> {
        expect::execute_expect_visible(self, ctx, locator, timeout_ms).await
    }

    async fn expect_text(
        &self,
        ctx: &ExecCtx,
        locator: &Locator,
        expected: &str,
        timeout_ms: u64,
    ) -> Result<ActionReport, ActionError> {
        expect::execute_expect_text(self, ctx, locator, expected, timeout_ms).await
    }

    async fn screenshot(
        &self,
        ctx: &ExecCtx,
        options: &ScreenshotOptions,
    ) -> Result<Vec<u8>, ActionError> {
        screenshot::execute_screenshot(self, ctx, options).await
    }

    async fn current_url(&self, ctx: &ExecCtx) -> Result<String, ActionError> {
        ctx.ensure_active()?;
        Ok(self.adapter.current_url(ctx.page).await?)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::test_support::{page_adapter, Scripted};
    use cdp_adapter::PageId;
    use std::time::Duration;

    pub fn fast_primitives(transport: Arc<Scripted>) -> (DefaultActionPrimitives, PageId) {
        let (adapter, page) = page_adapter(transport);
        let primitives = DefaultActionPrimitives::new(adapter).with_polling(PollSettings {
            interval: Duration::from_millis(5),
        });
        (primitives, page)
    }

    pub fn ctx(page: PageId, budget_ms: u64) -> ExecCtx {
        ExecCtx::new(page, Duration::from_millis(budget_ms))
    }
}
