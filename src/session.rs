//! Browser session scoping
//!
//! A scenario gets one adapter and one page. Both are released on every exit
//! path: the body's result is returned only after `shutdown` has completed.

use std::future::Future;
use std::sync::Arc;

use cdp_adapter::{event_bus, AdapterError, CdpAdapter, CdpConfig, PageId, RawEvent};
use flow_runner::FlowError;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, warn};

pub struct BrowserSession {
    adapter: Arc<CdpAdapter>,
    page: PageId,
    events: broadcast::Receiver<RawEvent>,
}

impl BrowserSession {
    pub fn adapter(&self) -> &Arc<CdpAdapter> {
        &self.adapter
    }

    pub fn page(&self) -> PageId {
        self.page
    }

    /// Drain the adapter events published since the last call and keep the
    /// messages of those that concern this session's page.
    pub fn take_page_errors(&mut self) -> Vec<String> {
        let mut errors = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(event) if event.concerns(self.page) => errors.push(event.message().to_string()),
                Ok(_) => {}
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(target: "flowcheck", skipped, "Page events dropped");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        errors
    }

    /// Launch (or attach to) Chromium, run `body` on a fresh page and close
    /// the browser whatever `body` returned.
    pub async fn scoped<F, Fut, T>(cfg: CdpConfig, body: F) -> Result<T, FlowError>
    where
        F: FnOnce(BrowserSession) -> Fut,
        Fut: Future<Output = T>,
    {
        let (bus, _) = event_bus(256);
        let adapter = CdpAdapter::new(cfg, bus).map_err(browser_error("launching browser"))?;
        Self::scoped_with(Arc::new(adapter), body).await
    }

    /// Same as [`BrowserSession::scoped`] on an adapter built by the caller.
    pub async fn scoped_with<F, Fut, T>(adapter: Arc<CdpAdapter>, body: F) -> Result<T, FlowError>
    where
        F: FnOnce(BrowserSession) -> Fut,
        Fut: Future<Output = T>,
    {
        let events = adapter.subscribe();
        let page = match Self::open(&adapter).await {
            Ok(page) => page,
            Err(err) => {
                adapter.shutdown().await;
                return Err(err);
            }
        };
        info!(target: "flowcheck", %page, "Browser session ready");

        let output = body(BrowserSession {
            adapter: Arc::clone(&adapter),
            page,
            events,
        })
        .await;

        adapter.shutdown().await;
        let traffic = cdp_adapter::metrics::snapshot();
        debug!(
            target: "flowcheck",
            commands = traffic.commands,
            failures = traffic.command_failures,
            events = traffic.events,
            avg_latency = ?traffic.average_latency(),
            "Browser session closed"
        );
        Ok(output)
    }

    async fn open(adapter: &Arc<CdpAdapter>) -> Result<PageId, FlowError> {
        Arc::clone(adapter)
            .start()
            .await
            .map_err(browser_error("starting CDP adapter"))?;
        adapter
            .create_page("about:blank")
            .await
            .map_err(browser_error("opening page"))
    }
}

fn browser_error(stage: &'static str) -> impl Fn(AdapterError) -> FlowError {
    move |err| {
        warn!(target: "flowcheck", kind = ?err.kind, "{stage} failed");
        FlowError::Browser(format!("{stage}: {err}"))
    }
}
