//! Scripted CDP transport for unit tests.

use async_trait::async_trait;
use cdp_adapter::{
    event_bus, AdapterError, CdpAdapter, CdpConfig, CdpTransport, CommandTarget, PageId,
    TransportEvent,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

type Responder = dyn Fn(&str, &Value) -> Result<Value, AdapterError> + Send + Sync;

/// Kind of page script the adapter sent through `Runtime.evaluate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Locator,
    ReadyState,
    Location,
    Focus,
    Anchor,
    Other,
}

pub fn classify(params: &Value) -> Script {
    let expression = params["expression"].as_str().unwrap_or_default();
    if expression.contains("(query, attr, token)") {
        Script::Locator
    } else if expression == "document.readyState" {
        Script::ReadyState
    } else if expression == "window.location.href" {
        Script::Location
    } else if expression.contains("el.focus()") {
        Script::Focus
    } else if expression.contains("getBoundingClientRect") {
        Script::Anchor
    } else {
        Script::Other
    }
}

/// Wraps a value the way `Runtime.evaluate` returns it.
pub fn evaluated(value: Value) -> Value {
    json!({ "result": { "value": value } })
}

pub struct Scripted {
    responder: Box<Responder>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl Scripted {
    pub fn new(respond: impl Fn(&str, &Value) -> Value + Send + Sync + 'static) -> Arc<Self> {
        Self::fallible(move |method, params| Ok(respond(method, params)))
    }

    pub fn fallible(
        respond: impl Fn(&str, &Value) -> Result<Value, AdapterError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(respond),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing_evaluate(hint: &'static str) -> Arc<Self> {
        Self::fallible(move |method, _| match method {
            "Runtime.evaluate" => Err(AdapterError::new(cdp_adapter::AdapterErrorKind::CdpIo)
                .with_hint(hint)),
            _ => Ok(json!({})),
        })
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls().into_iter().map(|(method, _)| method).collect()
    }

    pub fn scripts(&self) -> Vec<Script> {
        self.calls()
            .iter()
            .filter(|(method, _)| method == "Runtime.evaluate")
            .map(|(_, params)| classify(params))
            .collect()
    }
}

#[async_trait]
impl CdpTransport for Scripted {
    async fn start(&self) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        std::future::pending().await
    }

    async fn send_command(
        &self,
        _target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError> {
        let reply = (self.responder)(method, &params);
        self.calls.lock().unwrap().push((method.to_string(), params));
        reply
    }
}

/// Adapter with a single attached page, driven by `transport`.
pub fn page_adapter(transport: Arc<Scripted>) -> (Arc<CdpAdapter>, PageId) {
    let (bus, _rx) = event_bus(16);
    let adapter = Arc::new(CdpAdapter::with_transport(
        CdpConfig::default(),
        bus,
        transport as Arc<dyn CdpTransport>,
    ));
    let page = adapter.registry.track_target("T1");
    adapter.registry.attach_session("T1", "S1".to_string());
    (adapter, page)
}
