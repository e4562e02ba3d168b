//! Test doubles shared by the agent, orchestrator and server tests.

use super::model::ModelInvoker;
use super::registry::{optional_u64, required_str, Tool, ToolError};
use super::transcript::{Message, ToolRequest, Transcript};
use crate::checkpoint::{CheckpointStore, MemoryCheckpointStore, SessionSummary};
use crate::error::{DocentError, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Returns its `text` argument unchanged.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Return the given text"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "text": { "type": "string" } },
            "required": ["text"]
        })
    }

    async fn invoke(&self, arguments: &Map<String, Value>) -> std::result::Result<String, ToolError> {
        Ok(required_str(arguments, "text")?.to_string())
    }
}

/// Always fails.
pub struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "fail"
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn invoke(&self, _arguments: &Map<String, Value>) -> std::result::Result<String, ToolError> {
        Err(ToolError::Failed("disk on fire".to_string()))
    }
}

/// Sleeps `millis` before echoing `text`.
pub struct SleepTool;

#[async_trait]
impl Tool for SleepTool {
    fn name(&self) -> &str {
        "sleep"
    }

    fn description(&self) -> &str {
        "Sleep, then echo"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": { "type": "string" },
                "millis": { "type": "integer" }
            },
            "required": ["text", "millis"]
        })
    }

    async fn invoke(&self, arguments: &Map<String, Value>) -> std::result::Result<String, ToolError> {
        let millis = optional_u64(arguments, "millis")?.unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(millis)).await;
        Ok(required_str(arguments, "text")?.to_string())
    }
}

/// Build a tool request with JSON object arguments.
pub fn request(id: &str, tool_name: &str, arguments: Value) -> ToolRequest {
    ToolRequest::new(id, tool_name, arguments.as_object().cloned().unwrap_or_default())
}

/// Model double that replays scripted responses and records what it saw.
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<Message>>>,
    seen: Mutex<Vec<Transcript>>,
    repeat_last: Option<Message>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<Result<Message>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            seen: Mutex::new(Vec::new()),
            repeat_last: None,
        }
    }

    /// A model that answers every call with `message`.
    pub fn always(message: Message) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            seen: Mutex::new(Vec::new()),
            repeat_last: Some(message),
        }
    }

    /// Transcripts passed to each call, in call order.
    pub fn seen(&self) -> Vec<Transcript> {
        self.seen.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelInvoker for ScriptedModel {
    async fn invoke(&self, _system_directive: &str, transcript: &Transcript) -> Result<Message> {
        self.seen.lock().unwrap().push(transcript.clone());

        if let Some(message) = &self.repeat_last {
            return Ok(message.clone());
        }

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(DocentError::ModelUnavailable("script exhausted".to_string())))
    }
}

/// Saves `allowed` checkpoints, then fails every save.
pub struct FlakyStore {
    inner: MemoryCheckpointStore,
    allowed: AtomicUsize,
}

impl FlakyStore {
    pub fn new(allowed: usize) -> Self {
        Self {
            inner: MemoryCheckpointStore::new(),
            allowed: AtomicUsize::new(allowed),
        }
    }
}

#[async_trait]
impl CheckpointStore for FlakyStore {
    async fn save(&self, session_id: &str, transcript: &Transcript) -> Result<()> {
        let left = self.allowed.load(Ordering::SeqCst);
        if left == 0 {
            return Err(DocentError::Checkpoint("disk full".to_string()));
        }
        self.allowed.store(left - 1, Ordering::SeqCst);
        self.inner.save(session_id, transcript).await
    }

    async fn load(&self, session_id: &str) -> Result<Option<Transcript>> {
        self.inner.load(session_id).await
    }

    async fn list(&self) -> Result<Vec<SessionSummary>> {
        self.inner.list().await
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        self.inner.delete(session_id).await
    }
}
