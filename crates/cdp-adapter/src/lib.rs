//! L0 Chromium DevTools Protocol adapter.
//!
//! Owns the browser process and websocket connection, keeps a registry of page
//! targets and their sessions, and exposes the small command surface the
//! action layer drives: navigation, script evaluation, pointer clicks, text
//! entry and screenshots.

use std::{env, path::PathBuf};
use tokio::sync::broadcast;
use which::which;

pub mod ids {
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    /// Unique identifier for the browser instance managed by the adapter.
    #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
    pub struct BrowserId(pub Uuid);

    /// Unique identifier for a page/tab.
    #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
    pub struct PageId(pub Uuid);

    #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
    pub struct SessionId(pub Uuid);

    impl BrowserId {
        pub fn new() -> Self {
            Self(Uuid::new_v4())
        }
    }

    impl PageId {
        pub fn new() -> Self {
            Self(Uuid::new_v4())
        }
    }

    impl SessionId {
        pub fn new() -> Self {
            Self(Uuid::new_v4())
        }
    }

    impl Default for PageId {
        fn default() -> Self {
            Self::new()
        }
    }

    impl std::fmt::Display for PageId {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "page-{}", self.0)
        }
    }
}

pub mod error {
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use thiserror::Error;

    /// High-level error categories surfaced by the adapter.
    #[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
    pub enum AdapterErrorKind {
        #[error("navigation timed out")]
        NavTimeout,
        #[error("cdp i/o failure")]
        CdpIo,
        #[error("target element not found")]
        TargetNotFound,
        #[error("browser executable not found")]
        BrowserNotFound,
        #[error("internal error")]
        Internal,
    }

    /// Enriched error metadata passed back to higher layers.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct AdapterError {
        pub kind: AdapterErrorKind,
        pub hint: Option<String>,
        pub data: Option<serde_json::Value>,
    }

    impl fmt::Display for AdapterError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.kind)?;
            if let Some(hint) = &self.hint {
                write!(f, ": {}", hint)?;
            }
            Ok(())
        }
    }

    impl std::error::Error for AdapterError {}

    impl AdapterError {
        pub fn new(kind: AdapterErrorKind) -> Self {
            Self {
                kind,
                hint: None,
                data: None,
            }
        }

        pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
            self.hint = Some(hint.into());
            self
        }

        pub fn with_data(mut self, data: serde_json::Value) -> Self {
            self.data = Some(data);
            self
        }

        pub fn is_timeout(&self) -> bool {
            matches!(self.kind, AdapterErrorKind::NavTimeout)
        }

        /// The browser rejected a single command (for example a context torn
        /// down by navigation); the connection itself is still usable.
        pub fn is_protocol_error(&self) -> bool {
            self.kind == AdapterErrorKind::CdpIo
                && self
                    .hint
                    .as_deref()
                    .is_some_and(|hint| hint.starts_with("cdp error"))
        }
    }
}

pub mod events {
    use super::ids::PageId;
    use serde::{Deserialize, Serialize};

    /// Events published by the adapter event loop.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub enum RawEvent {
        /// Uncaught exception thrown by a page script. `page` is `None` when
        /// the CDP session is not (or no longer) registered.
        PageException {
            page: Option<PageId>,
            message: String,
        },
        /// Undecodable event or a dropped CDP connection
        Error { message: String },
    }

    impl RawEvent {
        /// Whether the event concerns `page`. Adapter errors concern every page.
        pub fn concerns(&self, page: PageId) -> bool {
            match self {
                RawEvent::PageException { page: source, .. } => {
                    source.map_or(true, |source| source == page)
                }
                RawEvent::Error { .. } => true,
            }
        }

        pub fn message(&self) -> &str {
            match self {
                RawEvent::PageException { message, .. } | RawEvent::Error { message } => message,
            }
        }
    }
}

pub mod config {
    use crate::detect_chrome_executable;
    use serde::{Deserialize, Serialize};
    use std::{env, path::PathBuf};

    /// Configuration for launching and tuning the adapter.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct CdpConfig {
        pub executable: PathBuf,
        /// Profile directory; `None` launches with a throwaway profile that is
        /// removed when the browser is released.
        pub user_data_dir: Option<PathBuf>,
        pub headless: bool,
        pub disable_sandbox: bool,
        pub default_deadline_ms: u64,
        pub websocket_url: Option<String>,
        pub heartbeat_interval_ms: u64,
        pub window_width: u32,
        pub window_height: u32,
    }

    impl Default for CdpConfig {
        fn default() -> Self {
            Self {
                executable: detect_chrome_executable().unwrap_or_default(),
                user_data_dir: profile_dir_from_env(),
                headless: env_flag("FLOWCHECK_HEADLESS").unwrap_or(true),
                disable_sandbox: env_flag("FLOWCHECK_DISABLE_SANDBOX").unwrap_or(false),
                default_deadline_ms: 30_000,
                websocket_url: None,
                heartbeat_interval_ms: 15_000,
                window_width: 1280,
                window_height: 720,
            }
        }
    }

    /// `0/false/no/off` read as false, any other non-empty value as true.
    fn env_flag(key: &str) -> Option<bool> {
        let value = env::var(key).ok()?;
        let lower = value.trim().to_ascii_lowercase();
        if lower.is_empty() {
            return None;
        }
        Some(!matches!(lower.as_str(), "0" | "false" | "no" | "off"))
    }

    fn profile_dir_from_env() -> Option<PathBuf> {
        env::var("FLOWCHECK_PROFILE_DIR")
            .ok()
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .map(PathBuf::from)
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use serial_test::serial;

        #[test]
        #[serial]
        fn headless_flag_follows_env() {
            env::set_var("FLOWCHECK_HEADLESS", "off");
            assert!(!CdpConfig::default().headless);
            env::set_var("FLOWCHECK_HEADLESS", "1");
            assert!(CdpConfig::default().headless);
            env::remove_var("FLOWCHECK_HEADLESS");
            assert!(CdpConfig::default().headless);
        }

        #[test]
        #[serial]
        fn profile_dir_defaults_to_throwaway() {
            env::remove_var("FLOWCHECK_PROFILE_DIR");
            assert!(CdpConfig::default().user_data_dir.is_none());
            env::set_var("FLOWCHECK_PROFILE_DIR", "/tmp/flowcheck-profile");
            assert_eq!(
                CdpConfig::default().user_data_dir,
                Some(PathBuf::from("/tmp/flowcheck-profile"))
            );
            env::remove_var("FLOWCHECK_PROFILE_DIR");
        }
    }
}

/// Locates a Chromium build: `FLOWCHECK_CHROME`, then `PATH`, then the usual
/// install locations for the host OS.
pub fn detect_chrome_executable() -> Option<PathBuf> {
    if let Ok(raw) = env::var("FLOWCHECK_CHROME") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            let candidate = PathBuf::from(trimmed);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    for name in chrome_executable_names() {
        if let Ok(path) = which(name) {
            return Some(path);
        }
    }

    let skip_defaults = env::var("FLOWCHECK_SKIP_OS_PATHS")
        .map(|value| !value.trim().is_empty())
        .unwrap_or(false);
    if skip_defaults {
        return None;
    }

    os_specific_chrome_paths()
        .into_iter()
        .find(|candidate| candidate.exists())
}

fn chrome_executable_names() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["chrome.exe", "chromium.exe", "msedge.exe"]
    }

    #[cfg(not(target_os = "windows"))]
    {
        &[
            "google-chrome-stable",
            "google-chrome",
            "chromium",
            "chromium-browser",
        ]
    }
}

fn os_specific_chrome_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let mut paths = Vec::new();
        for key in ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"] {
            if let Ok(value) = env::var(key) {
                let root = PathBuf::from(value.trim());
                paths.push(root.join("Google/Chrome/Application/chrome.exe"));
                paths.push(root.join("Chromium/Application/chrome.exe"));
            }
        }
        paths
    }

    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ]
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        vec![
            PathBuf::from("/usr/bin/google-chrome-stable"),
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/usr/bin/chromium"),
            PathBuf::from("/snap/bin/chromium"),
        ]
    }
}


pub mod adapter {
    use super::commands::{Anchor, ScreenshotClip, ScreenshotFormat, ScreenshotOptions};
    use super::config::CdpConfig;
    use super::detect_chrome_executable;
    use super::error::{AdapterError, AdapterErrorKind};
    use super::events::RawEvent;
    use super::ids::{BrowserId, PageId};
    use super::metrics;
    use super::registry::Registry;
    use super::transport::{CdpTransport, ChromiumTransport, CommandTarget, TransportEvent};
    use async_trait::async_trait;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::Deserialize;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tokio::sync::{broadcast, Mutex};
    use tokio::task::JoinHandle;
    use tokio::time::sleep;
    use tokio::{select, spawn};
    use tokio_util::sync::CancellationToken;
    use tracing::{debug, info, warn};

    pub type EventBus = broadcast::Sender<RawEvent>;

    const POLL_INTERVAL: Duration = Duration::from_millis(100);
    const ATTACH_TIMEOUT: Duration = Duration::from_secs(5);

    /// Minimal CDP capability surface required by the action layer.
    #[async_trait]
    pub trait Cdp: Send + Sync {
        /// Navigates and waits until the document is at least interactive.
        async fn navigate(&self, page: PageId, url: &str, deadline: Duration)
            -> Result<(), AdapterError>;
        async fn evaluate_script(&self, page: PageId, expression: &str)
            -> Result<Value, AdapterError>;
        /// Pointer click at the centre of the first element matching `selector`.
        async fn click(&self, page: PageId, selector: &str, deadline: Duration)
            -> Result<(), AdapterError>;
        /// Replaces the value of the element matching `selector` with `text`.
        async fn type_text(
            &self,
            page: PageId,
            selector: &str,
            text: &str,
            deadline: Duration,
        ) -> Result<(), AdapterError>;
        async fn screenshot(
            &self,
            page: PageId,
            options: &ScreenshotOptions,
            deadline: Duration,
        ) -> Result<Vec<u8>, AdapterError>;
    }

    /// Adapter implementation with pluggable transport.
    pub struct CdpAdapter {
        pub browser_id: BrowserId,
        pub cfg: CdpConfig,
        pub bus: EventBus,
        pub registry: Arc<Registry>,
        shutdown: CancellationToken,
        tasks: Mutex<Vec<JoinHandle<()>>>,
        transport: Arc<dyn CdpTransport>,
    }

    impl CdpAdapter {
        /// Builds an adapter on a real Chromium transport. Fails when no
        /// browser can be located and no websocket endpoint was given.
        pub fn new(mut cfg: CdpConfig, bus: EventBus) -> Result<Self, AdapterError> {
            if cfg.websocket_url.is_none() {
                let executable = if !cfg.executable.as_os_str().is_empty()
                    && cfg.executable.exists()
                {
                    Some(cfg.executable.clone())
                } else {
                    detect_chrome_executable()
                };
                cfg.executable = executable.ok_or_else(|| {
                    AdapterError::new(AdapterErrorKind::BrowserNotFound)
                        .with_hint("no chrome/chromium executable found")
                        .with_data(json!({
                            "hint": "Install Chrome/Chromium, set FLOWCHECK_CHROME or pass --chrome-path/--ws-url",
                        }))
                })?;
            }
            info!(
                target: "cdp-adapter",
                executable = %cfg.executable.display(),
                attach = cfg.websocket_url.is_some(),
                headless = cfg.headless,
                "using Chromium transport"
            );
            let transport = Arc::new(ChromiumTransport::new(cfg.clone()));
            Ok(Self::with_transport(cfg, bus, transport))
        }

        pub fn with_transport(
            cfg: CdpConfig,
            bus: EventBus,
            transport: Arc<dyn CdpTransport>,
        ) -> Self {
            Self {
                browser_id: BrowserId::new(),
                cfg,
                bus,
                registry: Arc::new(Registry::new()),
                shutdown: CancellationToken::new(),
                tasks: Mutex::new(Vec::new()),
                transport,
            }
        }

        pub fn registry(&self) -> Arc<Registry> {
            Arc::clone(&self.registry)
        }

        pub fn subscribe(&self) -> broadcast::Receiver<RawEvent> {
            self.bus.subscribe()
        }

        pub async fn start(self: Arc<Self>) -> Result<(), AdapterError> {
            {
                let guard = self.tasks.lock().await;
                if !guard.is_empty() {
                    return Ok(());
                }
            }

            self.transport.start().await?;
            let loop_task = spawn(Self::event_loop(Arc::clone(&self)));
            self.tasks.lock().await.push(loop_task);
            info!(target: "cdp-adapter", browser = %self.browser_id.0, "event loop started");
            Ok(())
        }

        /// Stops the event loop and releases the browser. Safe to call twice.
        pub async fn shutdown(&self) {
            self.shutdown.cancel();
            let mut handles = self.tasks.lock().await;
            while let Some(handle) = handles.pop() {
                let _ = handle.await;
            }
            drop(handles);
            self.transport.shutdown().await;
            self.registry.clear();
        }

        /// Opens a new tab and waits until its session is attached and the
        /// Page/Runtime domains are enabled.
        pub async fn create_page(&self, url: &str) -> Result<PageId, AdapterError> {
            let response = self
                .send_command("Target.createTarget", json!({ "url": url }))
                .await?;
            let target_id = response
                .get("targetId")
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    AdapterError::new(AdapterErrorKind::Internal)
                        .with_hint("createTarget missing targetId")
                })?
                .to_string();

            let deadline = Instant::now() + ATTACH_TIMEOUT;
            let page = loop {
                if let Some(page) = self.registry.page_for_target(&target_id) {
                    if self.registry.cdp_session(&page).is_some() {
                        break page;
                    }
                }
                if Instant::now() >= deadline {
                    return Err(AdapterError::new(AdapterErrorKind::CdpIo)
                        .with_hint(format!("timed out waiting for target {target_id} to attach")));
                }
                sleep(Duration::from_millis(50)).await;
            };

            self.send_page_command(page, "Page.enable", json!({})).await?;
            self.send_page_command(page, "Runtime.enable", json!({})).await?;
            debug!(target: "cdp-adapter", %page, %target_id, "page ready");
            Ok(page)
        }

        pub async fn current_url(&self, page: PageId) -> Result<String, AdapterError> {
            let value = self.evaluate_script(page, "window.location.href").await?;
            value.as_str().map(str::to_string).ok_or_else(|| {
                AdapterError::new(AdapterErrorKind::Internal)
                    .with_hint("location.href did not evaluate to a string")
            })
        }

        pub async fn dispatch_mouse_event(
            &self,
            page: PageId,
            payload: Value,
        ) -> Result<(), AdapterError> {
            self.send_page_command(page, "Input.dispatchMouseEvent", payload)
                .await
                .map(|_| ())
        }

        pub async fn insert_text_event(&self, page: PageId, text: &str) -> Result<(), AdapterError> {
            self.send_page_command(page, "Input.insertText", json!({ "text": text }))
                .await
                .map(|_| ())
        }

        async fn event_loop(self: Arc<Self>) {
            debug!(target: "cdp-adapter", "event loop entered");
            loop {
                select! {
                    _ = self.shutdown.cancelled() => break,
                    event = self.transport.next_event() => match event {
                        Some(ev) => self.handle_event(ev).await,
                        None => {
                            if !self.shutdown.is_cancelled() {
                                self.handle_transport_disconnect();
                            }
                            break;
                        }
                    }
                }
            }
            debug!(target: "cdp-adapter", "event loop exiting");
        }

        fn handle_transport_disconnect(&self) {
            let pages = self.registry.pages().len();
            self.registry.clear();
            warn!(target: "cdp-adapter", pages, "cdp transport stream ended");
            let _ = self.bus.send(RawEvent::Error {
                message: "cdp transport disconnected".to_string(),
            });
        }

        pub(crate) async fn handle_event(&self, event: TransportEvent) {
            let method = event.method.clone();
            if let Err(err) = self.process_event(event) {
                warn!(target: "cdp-adapter", %method, %err, "failed to handle cdp event");
                let _ = self.bus.send(RawEvent::Error {
                    message: format!("cdp event {method} could not be handled: {err}"),
                });
            }
        }

        fn process_event(&self, event: TransportEvent) -> Result<(), AdapterError> {
            metrics::record_event();
            match event.method.as_str() {
                "Target.targetCreated" => {
                    let payload: TargetInfoParams = decode(event.params)?;
                    if payload.target_info.is_page() {
                        let page = self.registry.track_target(&payload.target_info.target_id);
                        debug!(target: "cdp-adapter", %page, "page target created");
                    }
                }
                "Target.targetDestroyed" => {
                    let payload: TargetDestroyedParams = decode(event.params)?;
                    if let Some(page) = self.registry.forget_target(&payload.target_id) {
                        debug!(target: "cdp-adapter", %page, "page target destroyed");
                    }
                }
                "Target.attachedToTarget" => {
                    let payload: AttachedToTargetParams = decode(event.params)?;
                    if payload.target_info.is_page() {
                        let target_id = &payload.target_info.target_id;
                        // attach can arrive before targetCreated on some builds
                        self.registry.track_target(target_id);
                        if let Some(page) =
                            self.registry.attach_session(target_id, payload.session_id)
                        {
                            debug!(target: "cdp-adapter", %page, "page session attached");
                        }
                    }
                }
                "Target.detachedFromTarget" => {
                    let payload: DetachedFromTargetParams = decode(event.params)?;
                    self.registry.detach_session(&payload.session_id);
                }
                "Runtime.exceptionThrown" => {
                    let payload: ExceptionThrownParams = decode(event.params)?;
                    let message = payload
                        .exception_details
                        .exception
                        .and_then(|ex| ex.description)
                        .or(payload.exception_details.text)
                        .unwrap_or_else(|| "runtime exception".to_string());
                    let page = self.page_from_session(event.session_id.as_deref());
                    debug!(target: "cdp-adapter", ?page, %message, "page exception");
                    let _ = self.bus.send(RawEvent::PageException { page, message });
                }
                _ => {
                    debug!(target: "cdp-adapter", method = %event.method, "unhandled cdp event");
                }
            }
            Ok(())
        }

        fn page_from_session(&self, session: Option<&str>) -> Option<PageId> {
            session.and_then(|sid| self.registry.page_for_session(sid))
        }

        async fn wait_for_dom_ready(&self, page: PageId, deadline: Instant) -> Result<(), AdapterError> {
            loop {
                let response = self
                    .send_page_command(
                        page,
                        "Runtime.evaluate",
                        json!({
                            "expression": "document.readyState",
                            "returnByValue": true,
                        }),
                    )
                    .await;

                // contexts are torn down mid-navigation; treat that as not ready yet
                let ready = match response {
                    Ok(response) => response
                        .get("result")
                        .and_then(|v| v.get("value"))
                        .and_then(|v| v.as_str())
                        .map(|state| matches!(state, "interactive" | "complete"))
                        .unwrap_or(false),
                    Err(err) if err.is_protocol_error() => false,
                    Err(err) => return Err(err),
                };

                if ready {
                    return Ok(());
                }
                if Instant::now() >= deadline {
                    return Err(AdapterError::new(AdapterErrorKind::NavTimeout)
                        .with_hint("document did not become ready before deadline"));
                }
                sleep(POLL_INTERVAL).await;
            }
        }

        async fn wait_for_page_ready(&self, page: PageId) -> Result<String, AdapterError> {
            let deadline = Instant::now() + ATTACH_TIMEOUT;
            loop {
                if let Some(session) = self.registry.cdp_session(&page) {
                    return Ok(session);
                }
                if self.registry.get(&page).is_none() || Instant::now() >= deadline {
                    return Err(AdapterError::new(AdapterErrorKind::CdpIo)
                        .with_hint(format!("cdp session not ready for {page}")));
                }
                sleep(Duration::from_millis(50)).await;
            }
        }

        async fn locate(&self, page: PageId, selector: &str) -> Result<Option<Anchor>, AdapterError> {
            let selector_literal = serde_json::to_string(selector).map_err(|err| {
                AdapterError::new(AdapterErrorKind::Internal).with_hint(err.to_string())
            })?;
            let expression = format!(
                "(() => {{\n    let el;\n    try {{ el = document.querySelector({selector}); }} catch (err) {{ return null; }}\n    if (!el) {{ return null; }}\n    el.scrollIntoView({{ block: 'center', inline: 'center' }});\n    const rect = el.getBoundingClientRect();\n    if (rect.width === 0 && rect.height === 0) {{ return null; }}\n    return {{ x: rect.left + rect.width / 2, y: rect.top + rect.height / 2 }};\n}})()",
                selector = selector_literal
            );
            let value = self.evaluate_script(page, &expression).await?;
            if value.is_null() {
                return Ok(None);
            }
            serde_json::from_value::<Anchor>(value).map(Some).map_err(|err| {
                AdapterError::new(AdapterErrorKind::Internal)
                    .with_hint(format!("malformed anchor: {err}"))
            })
        }

        async fn send_command(&self, method: &str, params: Value) -> Result<Value, AdapterError> {
            self.send_to(CommandTarget::Browser, method, params).await
        }

        async fn send_page_command(
            &self,
            page: PageId,
            method: &str,
            params: Value,
        ) -> Result<Value, AdapterError> {
            let session = self.registry.cdp_session(&page).ok_or_else(|| {
                AdapterError::new(AdapterErrorKind::CdpIo)
                    .with_hint(format!("missing cdp session for {page}"))
            })?;
            self.send_to(CommandTarget::Session(session), method, params)
                .await
        }

        async fn send_to(
            &self,
            target: CommandTarget,
            method: &str,
            params: Value,
        ) -> Result<Value, AdapterError> {
            let start = Instant::now();
            metrics::record_command();
            match self.transport.send_command(target, method, params).await {
                Ok(value) => {
                    metrics::record_command_success(start.elapsed());
                    Ok(value)
                }
                Err(err) => {
                    metrics::record_command_failure();
                    debug!(target: "cdp-adapter", method, %err, "cdp command failed");
                    Err(err)
                }
            }
        }

        async fn full_page_clip(&self, page: PageId) -> Result<ScreenshotClip, AdapterError> {
            let metrics = self
                .send_page_command(page, "Page.getLayoutMetrics", json!({}))
                .await?;
            let size = metrics
                .get("cssContentSize")
                .or_else(|| metrics.get("contentSize"))
                .ok_or_else(|| {
                    AdapterError::new(AdapterErrorKind::Internal)
                        .with_hint("layout metrics missing content size")
                })?;
            let dimension = |key: &str| size.get(key).and_then(Value::as_f64).unwrap_or(0.0);
            Ok(ScreenshotClip {
                x: 0.0,
                y: 0.0,
                width: dimension("width").ceil(),
                height: dimension("height").ceil(),
                scale: 1.0,
            })
        }
    }

    #[async_trait]
    impl Cdp for CdpAdapter {
        async fn navigate(
            &self,
            page: PageId,
            url: &str,
            deadline: Duration,
        ) -> Result<(), AdapterError> {
            self.wait_for_page_ready(page).await?;
            let deadline_at = Instant::now() + deadline;
            let response = self
                .send_page_command(page, "Page.navigate", json!({ "url": url }))
                .await?;
            if let Some(error_text) = response.get("errorText").and_then(Value::as_str) {
                return Err(AdapterError::new(AdapterErrorKind::CdpIo)
                    .with_hint(format!("navigation to {url} failed: {error_text}")));
            }
            self.wait_for_dom_ready(page, deadline_at).await
        }

        async fn evaluate_script(&self, page: PageId, expression: &str) -> Result<Value, AdapterError> {
            self.wait_for_page_ready(page).await?;
            let response = self
                .send_page_command(
                    page,
                    "Runtime.evaluate",
                    json!({
                        "expression": expression,
                        "awaitPromise": true,
                        "returnByValue": true,
                        "userGesture": true,
                    }),
                )
                .await?;

            if let Some(details) = response.get("exceptionDetails") {
                return Err(AdapterError::new(AdapterErrorKind::Internal)
                    .with_hint("evaluate_script raised exception")
                    .with_data(details.clone()));
            }

            Ok(response
                .get("result")
                .and_then(|res| res.get("value"))
                .cloned()
                .unwrap_or(Value::Null))
        }

        async fn click(&self, page: PageId, selector: &str, deadline: Duration) -> Result<(), AdapterError> {
            let deadline_at = Instant::now() + deadline;
            let anchor = loop {
                if let Some(anchor) = self.locate(page, selector).await? {
                    break anchor;
                }
                if Instant::now() >= deadline_at {
                    return Err(AdapterError::new(AdapterErrorKind::TargetNotFound)
                        .with_hint(format!("click target not found for selector '{selector}'")));
                }
                sleep(POLL_INTERVAL).await;
            };

            for kind in ["mouseMoved", "mousePressed", "mouseReleased"] {
                let mut payload = json!({
                    "type": kind,
                    "x": anchor.x,
                    "y": anchor.y,
                    "pointerType": "mouse",
                });
                if kind != "mouseMoved" {
                    payload["button"] = json!("left");
                    payload["buttons"] = json!(1);
                    payload["clickCount"] = json!(1);
                }
                self.dispatch_mouse_event(page, payload).await?;
            }
            Ok(())
        }

        async fn type_text(
            &self,
            page: PageId,
            selector: &str,
            text: &str,
            deadline: Duration,
        ) -> Result<(), AdapterError> {
            let selector_literal = serde_json::to_string(selector).map_err(|err| {
                AdapterError::new(AdapterErrorKind::Internal).with_hint(err.to_string())
            })?;
            let focus_expression = format!(
                "(() => {{\n    const el = document.querySelector({selector});\n    if (!el) {{ return {{ status: 'not-found' }}; }}\n    if (el.disabled || el.readOnly) {{ return {{ status: 'not-editable' }}; }}\n    el.scrollIntoView({{ block: 'center' }});\n    if (typeof el.focus === 'function') {{ el.focus(); }}\n    if (typeof el.select === 'function') {{ el.select(); }}\n    return {{ status: 'focused' }};\n}})()",
                selector = selector_literal,
            );

            let focus_deadline = Instant::now() + deadline;
            loop {
                let value = self.evaluate_script(page, &focus_expression).await?;
                let status = value
                    .get("status")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                match status {
                    "focused" => break,
                    "not-found" if Instant::now() < focus_deadline => sleep(POLL_INTERVAL).await,
                    "not-found" => {
                        return Err(AdapterError::new(AdapterErrorKind::TargetNotFound)
                            .with_hint(format!("selector '{selector}' not found before deadline")))
                    }
                    other => {
                        return Err(AdapterError::new(AdapterErrorKind::Internal).with_hint(format!(
                            "failed to focus element for selector '{selector}' (status: {other})"
                        )))
                    }
                }
            }

            if text.is_empty() {
                for kind in ["keyDown", "keyUp"] {
                    self.send_page_command(
                        page,
                        "Input.dispatchKeyEvent",
                        json!({
                            "type": kind,
                            "key": "Backspace",
                            "code": "Backspace",
                            "windowsVirtualKeyCode": 8,
                        }),
                    )
                    .await?;
                }
                return Ok(());
            }
            self.insert_text_event(page, text).await
        }

        async fn screenshot(
            &self,
            page: PageId,
            options: &ScreenshotOptions,
            deadline: Duration,
        ) -> Result<Vec<u8>, AdapterError> {
            self.wait_for_page_ready(page).await?;
            let mut params = json!({ "format": options.format.as_str() });
            if let ScreenshotFormat::Jpeg { quality: Some(q) } = &options.format {
                params["quality"] = json!(q);
            }
            if options.full_page {
                let clip = self.full_page_clip(page).await?;
                params["clip"] = serde_json::to_value(clip).map_err(|err| {
                    AdapterError::new(AdapterErrorKind::Internal).with_hint(err.to_string())
                })?;
                params["captureBeyondViewport"] = json!(true);
            }

            let response = tokio::time::timeout(
                deadline,
                self.send_page_command(page, "Page.captureScreenshot", params),
            )
            .await
            .map_err(|_| {
                AdapterError::new(AdapterErrorKind::NavTimeout).with_hint("screenshot timed out")
            })??;
            let data = response
                .get("data")
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    AdapterError::new(AdapterErrorKind::Internal).with_hint("missing screenshot data")
                })?;
            STANDARD.decode(data).map_err(|err| {
                AdapterError::new(AdapterErrorKind::Internal).with_hint(err.to_string())
            })
        }
    }

    fn decode<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, AdapterError> {
        serde_json::from_value(params)
            .map_err(|err| AdapterError::new(AdapterErrorKind::Internal).with_hint(err.to_string()))
    }

    #[derive(Debug, Deserialize)]
    struct TargetInfoParams {
        #[serde(rename = "targetInfo")]
        target_info: TargetInfoPayload,
    }

    #[derive(Debug, Deserialize)]
    struct TargetDestroyedParams {
        #[serde(rename = "targetId")]
        target_id: String,
    }

    #[derive(Debug, Deserialize)]
    struct AttachedToTargetParams {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(rename = "targetInfo")]
        target_info: TargetInfoPayload,
    }

    #[derive(Debug, Deserialize)]
    struct DetachedFromTargetParams {
        #[serde(rename = "sessionId")]
        session_id: String,
    }

    #[derive(Debug, Deserialize)]
    struct TargetInfoPayload {
        #[serde(rename = "targetId")]
        target_id: String,
        #[serde(rename = "type")]
        target_type: String,
    }

    impl TargetInfoPayload {
        fn is_page(&self) -> bool {
            self.target_type == "page"
        }
    }

    #[derive(Debug, Deserialize)]
    struct ExceptionThrownParams {
        #[serde(rename = "exceptionDetails")]
        exception_details: ExceptionDetails,
    }

    #[derive(Debug, Deserialize)]
    struct ExceptionDetails {
        text: Option<String>,
        exception: Option<ExceptionObject>,
    }

    #[derive(Debug, Deserialize)]
    struct ExceptionObject {
        description: Option<String>,
    }

}

pub use adapter::{Cdp, CdpAdapter, EventBus};
pub use commands::*;
pub use config::CdpConfig;
pub use error::{AdapterError, AdapterErrorKind};
pub use events::RawEvent;
pub use ids::{BrowserId, PageId, SessionId};
pub use metrics::AdapterMetricsSnapshot;
pub mod commands;
pub mod metrics;
pub mod registry;
pub mod transport;
pub mod util;
pub use transport::{CdpTransport, CommandTarget, TransportEvent};

/// Creates the broadcast bus the adapter publishes raw events on.
pub fn event_bus(buffer: usize) -> (EventBus, broadcast::Receiver<RawEvent>) {
    broadcast::channel(buffer)
}
