//! Shared test doubles: a scripted in-memory transport and a recording
//! event sink.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use acp_runtime::{
    AcpError, EventRecord, EventSink, InteractionId, InteractionOption, InteractionRequest,
    ProviderId, Result, RuntimeEvent, Transport,
};

/// How the scripted provider reacts to one outgoing request line
pub enum Reaction {
    /// Emit these messages, in order
    Emit(Vec<Value>),
    /// Emit, then close stdout while the process stays alive
    EmitThenCloseStdout(Vec<Value>),
    /// Emit, then exit the process
    EmitThenExit(Vec<Value>),
}

type Script = Box<dyn FnMut(&Value) -> Reaction + Send>;

/// In-memory transport driven by a per-write script
///
/// Every outgoing line is parsed, recorded, and handed to the script; the
/// messages the script returns are pushed into the incoming queue as if the
/// provider had written them.
pub struct MockTransport {
    script: Mutex<Script>,
    tx: Option<mpsc::UnboundedSender<Result<Value>>>,
    rx: Option<mpsc::UnboundedReceiver<Result<Value>>>,
    ready: Arc<AtomicBool>,
    writes: Arc<Mutex<Vec<Value>>>,
    stderr: Vec<String>,
}

impl MockTransport {
    pub fn scripted(script: impl FnMut(&Value) -> Reaction + Send + 'static) -> Self {
        Self {
            script: Mutex::new(Box::new(script)),
            tx: None,
            rx: None,
            ready: Arc::new(AtomicBool::new(false)),
            writes: Arc::new(Mutex::new(Vec::new())),
            stderr: Vec::new(),
        }
    }

    /// Script that only ever emits messages
    pub fn responding(mut script: impl FnMut(&Value) -> Vec<Value> + Send + 'static) -> Self {
        Self::scripted(move |msg| Reaction::Emit(script(msg)))
    }

    pub fn with_stderr(mut self, lines: Vec<String>) -> Self {
        self.stderr = lines;
        self
    }

    /// Handle onto the recorded outgoing messages, usable after the
    /// transport has been moved into a client
    pub fn writes_handle(&self) -> Arc<Mutex<Vec<Value>>> {
        self.writes.clone()
    }
}

impl Transport for MockTransport {
    async fn connect(&mut self) -> Result<()> {
        if self.tx.is_none() {
            let (tx, rx) = mpsc::unbounded_channel();
            self.tx = Some(tx);
            self.rx = Some(rx);
        }
        self.ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn write(&mut self, data: &str) -> Result<()> {
        if !self.ready.load(Ordering::SeqCst) {
            return Err(AcpError::pipe_closed(
                "mock transport is closed",
                self.stderr.clone(),
            ));
        }
        let value: Value = serde_json::from_str(data.trim())?;
        self.writes.lock().push(value.clone());

        let reaction = {
            let mut script = self.script.lock();
            (*script)(&value)
        };
        let (messages, close_stdout, exit) = match reaction {
            Reaction::Emit(m) => (m, false, false),
            Reaction::EmitThenCloseStdout(m) => (m, true, false),
            Reaction::EmitThenExit(m) => (m, false, true),
        };

        if let Some(tx) = &self.tx {
            for message in messages {
                let _ = tx.send(Ok(message));
            }
        }
        if close_stdout || exit {
            self.tx = None;
        }
        if exit {
            self.ready.store(false, Ordering::SeqCst);
        }
        Ok(())
    }

    fn read_messages(&mut self) -> mpsc::UnboundedReceiver<Result<Value>> {
        self.rx
            .take()
            .expect("read_messages called before connect or taken twice")
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn stderr_tail(&self) -> Vec<String> {
        self.stderr.clone()
    }

    async fn close(&mut self) -> Result<()> {
        self.ready.store(false, Ordering::SeqCst);
        self.tx = None;
        Ok(())
    }
}

/// Build a success response echoing the given wire id
pub fn respond(id: &Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

/// Build an error response echoing the given wire id
pub fn respond_err(id: &Value, code: i64, message: &str) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message } })
}

/// Build a notification
pub fn notify(method: &str, params: Value) -> Value {
    json!({ "jsonrpc": "2.0", "method": method, "params": params })
}

/// Event sink that records every event for later assertions
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RuntimeEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<RuntimeEvent> {
        self.events.lock().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(RuntimeEvent::name).collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, record: &EventRecord) {
        self.events.lock().push(record.event.clone());
    }
}

/// Build a pending confirmation with densely indexed options
pub fn sample_request(
    id: &str,
    options: &[(&str, &str)],
    allow_custom_input: bool,
) -> InteractionRequest {
    InteractionRequest {
        interaction_id: InteractionId::new(id),
        question: "Allow the operation?".to_string(),
        options: options
            .iter()
            .enumerate()
            .map(|(i, (option_id, label))| InteractionOption {
                index: i as u32 + 1,
                option_id: (*option_id).to_string(),
                label: (*label).to_string(),
                description: None,
                metadata: Value::Null,
            })
            .collect(),
        allow_custom_input,
        source_method: "session/request_permission".to_string(),
        conversation_id: None,
        run_id: None,
        trace_id: None,
        session_id: None,
        provider_id: ProviderId::new("test"),
        raw: Value::Null,
    }
}
