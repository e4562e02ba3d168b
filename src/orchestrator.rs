//! Conversation orchestrator for Docent.
//!
//! Drives one turn of a session as a small state machine: ask the model,
//! run the tools it requests, feed the results back, and stop when the model
//! answers without requesting tools. The transcript is checkpointed after
//! every mutation.

use crate::agent::{Message, ModelInvoker, OpenAiModel, ToolDispatcher, ToolRegistry, Transcript};
use crate::checkpoint::{open_store, CheckpointStore, SessionSummary};
use crate::config::{AgentSettings, Prompts, Settings};
use crate::corpus::SqliteCorpus;
use crate::embedding::OpenAIEmbedder;
use crate::error::{DocentError, Result};
use crate::tools::document_registry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Where a turn currently is.
#[derive(Debug)]
enum TurnState {
    /// The next step is a model call.
    AwaitingModel,
    /// The model requested tools. `pending` is not part of the transcript
    /// until its results are in.
    AwaitingTools { pending: Message },
    /// The model replied without requesting tools.
    Terminated { reply: String },
}

/// Record of a tool call made during a turn.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolCallRecord {
    /// Name of the tool called.
    pub name: String,
    /// JSON arguments passed to the tool.
    pub arguments: String,
    /// Result returned to the model.
    pub result: String,
}

impl std::fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.arguments)
    }
}

/// Result of a completed turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub session_id: String,
    /// The model's final reply.
    pub reply: String,
    /// The session transcript after the turn.
    pub transcript: Transcript,
    /// Number of model calls made.
    pub model_calls: usize,
    /// Tool calls made, in request order.
    pub tool_calls: Vec<ToolCallRecord>,
    turn_start: usize,
}

impl TurnOutcome {
    /// Messages appended during this turn. A new turn starts with its user
    /// message; a resumed turn starts with the first new model reply.
    pub fn new_messages(&self) -> &[Message] {
        self.transcript.since(self.turn_start)
    }
}

/// The main orchestrator for Docent conversations.
pub struct Orchestrator {
    model: Arc<dyn ModelInvoker>,
    dispatcher: ToolDispatcher,
    store: Arc<dyn CheckpointStore>,
    system_directive: String,
    max_model_calls: usize,
    turn_timeout: Option<Duration>,
    /// One turn at a time per session.
    session_locks: SessionLocks,
}

impl Orchestrator {
    /// Create an orchestrator from the settings: OpenAI model, document
    /// tools over the corpus, and the configured checkpoint store.
    pub fn new(settings: &Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let corpus = Arc::new(SqliteCorpus::open(&settings.corpus_path())?);
        let embedder = Arc::new(OpenAIEmbedder::from_settings(&settings.embedding)?);
        let registry = document_registry(corpus, embedder, &settings.corpus)?;

        info!(
            "Using model {} with tools: {}",
            settings.model.name,
            registry.names().join(", ")
        );

        let model = OpenAiModel::new(
            &settings.model.client_config(),
            &settings.model.name,
            &registry.definitions(),
        )?
        .with_temperature(settings.model.temperature);

        let store = open_store(settings)?;

        Ok(Self::with_components(
            Arc::new(model),
            Arc::new(registry),
            store,
            prompts.system_directive(),
            &settings.agent,
        ))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        model: Arc<dyn ModelInvoker>,
        registry: Arc<ToolRegistry>,
        store: Arc<dyn CheckpointStore>,
        system_directive: impl Into<String>,
        agent: &AgentSettings,
    ) -> Self {
        let dispatcher = ToolDispatcher::new(registry)
            .with_parallel(agent.parallel_tools)
            .with_timeout(agent.tool_timeout_secs.map(Duration::from_secs));

        Self {
            model,
            dispatcher,
            store,
            system_directive: system_directive.into(),
            max_model_calls: agent.max_model_calls,
            turn_timeout: agent.turn_timeout_secs.map(Duration::from_secs),
            session_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Override the wall-clock budget of a turn.
    pub fn with_turn_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.turn_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        self.dispatcher.registry()
    }

    /// Run one turn: add `user_text` to the session and drive the loop until
    /// the model replies without requesting tools.
    #[instrument(skip_all, fields(session = %session_id))]
    pub async fn run_turn(
        &self,
        session_id: &str,
        user_text: &str,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome> {
        let _lease = self.lock_session(session_id, cancel).await?;
        self.bounded(self.drive(session_id, Some(user_text), cancel)).await
    }

    /// Finish a turn that stopped early, from the stored transcript.
    ///
    /// Nothing is appended before the first model call. The session must end
    /// in a user message or tool results; a session whose last turn already
    /// has a final reply has nothing to resume.
    #[instrument(skip_all, fields(session = %session_id))]
    pub async fn resume_turn(
        &self,
        session_id: &str,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome> {
        let _lease = self.lock_session(session_id, cancel).await?;
        self.bounded(self.drive(session_id, None, cancel)).await
    }

    async fn bounded(
        &self,
        turn: impl std::future::Future<Output = Result<TurnOutcome>>,
    ) -> Result<TurnOutcome> {
        match self.turn_timeout {
            Some(limit) => tokio::time::timeout(limit, turn).await.map_err(|_| {
                warn!("Turn exceeded its {:?} budget", limit);
                DocentError::TurnBudgetExceeded(format!("turn took longer than {:?}", limit))
            })?,
            None => turn.await,
        }
    }

    async fn drive(
        &self,
        session_id: &str,
        user_text: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome> {
        let stored = self.store.load(session_id).await?;
        let (mut transcript, turn_start) = match (stored, user_text) {
            (stored, Some(text)) => {
                let mut transcript = match stored {
                    Some(transcript) => {
                        debug!("Resuming session with {} messages", transcript.len());
                        transcript
                    }
                    None => {
                        info!("Starting new session");
                        Transcript::new()
                    }
                };
                let turn_start = transcript.len();
                transcript.append_user(text);
                self.checkpoint(session_id, &transcript).await?;
                (transcript, turn_start)
            }
            (Some(transcript), None) => {
                if transcript.is_empty() || transcript.final_reply().is_some() {
                    return Err(DocentError::NothingToResume(session_id.to_string()));
                }
                info!("Retrying turn from {} stored messages", transcript.len());
                let turn_start = transcript.len();
                (transcript, turn_start)
            }
            (None, None) => return Err(DocentError::SessionNotFound(session_id.to_string())),
        };

        let mut state = TurnState::AwaitingModel;
        let mut model_calls = 0;
        let mut tool_calls = Vec::new();

        loop {
            state = match state {
                TurnState::AwaitingModel => {
                    if model_calls >= self.max_model_calls {
                        warn!("No final reply after {} model calls", model_calls);
                        return Err(DocentError::TurnBudgetExceeded(format!(
                            "no final reply after {} model calls",
                            model_calls
                        )));
                    }

                    model_calls += 1;
                    debug!("Model call {}", model_calls);

                    let response = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(DocentError::Cancelled),
                        response = self.model.invoke(&self.system_directive, &transcript) => response?,
                    };

                    if response.requests_tools() {
                        TurnState::AwaitingTools { pending: response }
                    } else {
                        let reply = response.content().to_string();
                        transcript.append_reply(response)?;
                        self.checkpoint(session_id, &transcript).await?;
                        TurnState::Terminated { reply }
                    }
                }
                TurnState::AwaitingTools { pending } => {
                    let results = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            debug!(
                                "Discarding {} pending tool requests",
                                pending.tool_requests().len()
                            );
                            return Err(DocentError::Cancelled);
                        }
                        results = self.dispatcher.dispatch(pending.tool_requests()) => results,
                    };

                    tool_calls.extend(pending.tool_requests().iter().zip(&results).map(
                        |(request, result)| ToolCallRecord {
                            name: request.tool_name.clone(),
                            arguments: request.arguments_json(),
                            result: result.content().to_string(),
                        },
                    ));

                    transcript.append_exchange(pending, results)?;
                    self.checkpoint(session_id, &transcript).await?;
                    TurnState::AwaitingModel
                }
                TurnState::Terminated { reply } => {
                    info!(
                        "Turn finished after {} model calls and {} tool calls",
                        model_calls,
                        tool_calls.len()
                    );
                    return Ok(TurnOutcome {
                        session_id: session_id.to_string(),
                        reply,
                        transcript,
                        model_calls,
                        tool_calls,
                        turn_start,
                    });
                }
            };
        }
    }

    async fn checkpoint(&self, session_id: &str, transcript: &Transcript) -> Result<()> {
        self.store.save(session_id, transcript).await.map_err(|e| {
            error!("Checkpoint write failed: {}", e);
            DocentError::CheckpointWriteFailed {
                session_id: session_id.to_string(),
                reason: e.to_string(),
                transcript: Box::new(transcript.clone()),
            }
        })
    }

    /// Wait for the session's turn lock.
    async fn lock_session(
        &self,
        session_id: &str,
        cancel: &CancellationToken,
    ) -> Result<SessionLease<'_>> {
        let mut lease = SessionLease {
            locks: &self.session_locks,
            session_id: session_id.to_string(),
            guard: None,
        };
        let lock = lease.map().entry(session_id.to_string()).or_default().clone();

        lease.guard = Some(tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DocentError::Cancelled),
            guard = lock.lock_owned() => guard,
        });
        Ok(lease)
    }

    /// The stored transcript of a session.
    pub async fn session(&self, session_id: &str) -> Result<Transcript> {
        self.store
            .load(session_id)
            .await?
            .ok_or_else(|| DocentError::SessionNotFound(session_id.to_string()))
    }

    /// Stored sessions, most recently updated first.
    pub async fn sessions(&self) -> Result<Vec<SessionSummary>> {
        self.store.list().await
    }

    /// Delete a stored session.
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        let _lease = self
            .lock_session(session_id, &CancellationToken::new())
            .await?;

        if !self.store.delete(session_id).await? {
            return Err(DocentError::SessionNotFound(session_id.to_string()));
        }
        info!("Deleted session {}", session_id);
        Ok(())
    }
}

type SessionLocks = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// Holds a session's turn lock. The session's entry leaves the lock map
/// once no other caller holds or waits for it.
struct SessionLease<'a> {
    locks: &'a SessionLocks,
    session_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl SessionLease<'_> {
    fn map(&self) -> MutexGuard<'_, HashMap<String, Arc<tokio::sync::Mutex<()>>>> {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for SessionLease<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self.map();
        if locks
            .get(&self.session_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.session_id);
        }
    }
}
