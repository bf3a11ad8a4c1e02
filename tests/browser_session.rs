use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use cdp_adapter::{
    event_bus, AdapterError, AdapterErrorKind, CdpAdapter, CdpConfig, CdpTransport, CommandTarget,
    TransportEvent,
};
use flow_runner::FlowError;
use flowcheck_cli::BrowserSession;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};

/// Browser double: `Target.createTarget` answers with a target id and
/// queues the matching attach event.
struct FakeBrowser {
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events_rx: Mutex<mpsc::UnboundedReceiver<TransportEvent>>,
    methods: Mutex<Vec<String>>,
    refuse_start: bool,
    closed: AtomicBool,
}

impl FakeBrowser {
    fn new(refuse_start: bool) -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            events_tx,
            events_rx: Mutex::new(events_rx),
            methods: Mutex::new(Vec::new()),
            refuse_start,
            closed: AtomicBool::new(false),
        })
    }

    fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CdpTransport for FakeBrowser {
    async fn start(&self) -> Result<(), AdapterError> {
        if self.refuse_start {
            return Err(AdapterError::new(AdapterErrorKind::BrowserNotFound)
                .with_hint("no chrome/chromium executable found"));
        }
        Ok(())
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        self.events_rx.lock().await.recv().await
    }

    async fn send_command(
        &self,
        _target: CommandTarget,
        method: &str,
        _params: Value,
    ) -> Result<Value, AdapterError> {
        self.methods.lock().await.push(method.to_string());
        if method == "Target.createTarget" {
            let _ = self.events_tx.send(TransportEvent {
                method: "Target.attachedToTarget".into(),
                params: json!({
                    "sessionId": "S1",
                    "targetInfo": { "targetId": "T1", "type": "page", "url": "about:blank" }
                }),
                session_id: None,
            });
            return Ok(json!({ "targetId": "T1" }));
        }
        Ok(json!({}))
    }

    async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

fn adapter(browser: &Arc<FakeBrowser>) -> Arc<CdpAdapter> {
    let (bus, _rx) = event_bus(16);
    Arc::new(CdpAdapter::with_transport(
        CdpConfig::default(),
        bus,
        Arc::clone(browser) as Arc<dyn CdpTransport>,
    ))
}

#[tokio::test]
async fn session_is_closed_after_a_passing_body() -> Result<()> {
    let browser = FakeBrowser::new(false);

    let page = BrowserSession::scoped_with(adapter(&browser), |session| async move {
        assert!(!session.adapter().registry().is_empty());
        session.page()
    })
    .await?;

    assert!(browser.closed());
    let methods = browser.methods.lock().await.clone();
    assert_eq!(methods[0], "Target.createTarget");
    assert!(methods.contains(&"Runtime.enable".to_string()));
    assert!(!page.0.is_nil());
    Ok(())
}

#[tokio::test]
async fn session_is_closed_when_the_body_fails() {
    let browser = FakeBrowser::new(false);

    let outcome: Result<Result<(), FlowError>, FlowError> =
        BrowserSession::scoped_with(adapter(&browser), |_session| async move {
            Err(FlowError::Browser("page crashed".into()))
        })
        .await;

    assert!(browser.closed());
    assert!(matches!(outcome, Ok(Err(FlowError::Browser(_)))));
}

#[tokio::test]
async fn failed_launch_still_releases_the_browser() {
    let browser = FakeBrowser::new(true);
    let mut ran = false;

    let outcome = BrowserSession::scoped_with(adapter(&browser), |_session| {
        ran = true;
        async {}
    })
    .await;

    assert!(!ran);
    assert!(browser.closed());
    let err = outcome.unwrap_err();
    assert!(err.to_string().contains("starting CDP adapter"), "{err}");
}

#[tokio::test]
async fn page_exceptions_reach_the_session() -> Result<()> {
    let browser = FakeBrowser::new(false);
    let events = browser.events_tx.clone();

    let errors = BrowserSession::scoped_with(adapter(&browser), |mut session| async move {
        assert!(session.take_page_errors().is_empty());
        let _ = events.send(TransportEvent {
            method: "Runtime.exceptionThrown".into(),
            params: json!({
                "timestamp": 1.0,
                "exceptionDetails": {
                    "text": "Uncaught",
                    "exception": { "description": "ReferenceError: session is not defined" }
                }
            }),
            session_id: Some("S1".into()),
        });
        for _ in 0..50 {
            let errors = session.take_page_errors();
            if !errors.is_empty() {
                return errors;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        Vec::new()
    })
    .await?;

    assert_eq!(errors, vec!["ReferenceError: session is not defined".to_string()]);
    assert!(browser.closed());
    Ok(())
}
