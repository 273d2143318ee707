//! Chat relay — per-session transcripts and the idle/processing turn cycle.
//!
//! DESIGN
//! ======
//! Each browser session owns a [`ChatSession`]: a transcript seeded with
//! [`GREETING`] and a two-state machine. A turn moves the session from
//! idle to processing (appending the user's message), the agent runs with
//! no lock held, and the result moves it back to idle.
//!
//! The agent call runs on its own task, so a turn always finishes even if
//! the request that started it is dropped mid-flight. A panicking agent
//! abandons the turn; the session still returns to idle.
//!
//! ERROR HANDLING
//! ==============
//! Only parse-classified agent errors are recovered: they surface as a
//! "Parsing error occurred" banner and the transcript keeps just the user's
//! message. Every other agent error propagates to the caller. Neither case
//! appends an assistant message or retries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::agent::{AgentError, SqlAgent};
use super::env_parse;
use crate::error::ErrorCode;

pub const GREETING: &str = "Hello! How can I assist you with your database today?";

const DEFAULT_SESSION_IDLE_SECS: u64 = 24 * 60 * 60;
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
/// A turn with no progress for this long is treated as lost by the sweeper.
const STALLED_TURN: Duration = Duration::from_secs(15 * 60);

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Assistant,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

/// Ordered chat history. Append-only apart from [`Transcript::reset`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript(Vec<ChatMessage>);

impl Transcript {
    #[must_use]
    pub fn seeded() -> Self {
        Self(vec![ChatMessage::new(Role::Assistant, GREETING)])
    }

    fn push(&mut self, message: ChatMessage) {
        self.0.push(message);
    }

    fn reset(&mut self) {
        *self = Self::seeded();
    }

    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::seeded()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayState {
    Idle,
    Processing,
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("a request is already being processed for this session")]
    Busy,
    #[error("message must not be empty")]
    EmptyInput,
    #[error(transparent)]
    Agent(AgentError),
    #[error("the request was interrupted before an answer was produced")]
    TurnAborted,
}

impl ErrorCode for ChatError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Busy => "E_SESSION_BUSY",
            Self::EmptyInput => "E_EMPTY_INPUT",
            Self::Agent(e) => e.error_code(),
            Self::TurnAborted => "E_TURN_ABORTED",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Busy => true,
            Self::EmptyInput | Self::TurnAborted => false,
            Self::Agent(e) => e.retryable(),
        }
    }
}

/// How a completed turn ended, when it did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Answered(String),
    /// The agent's output could not be parsed; carries the banner text.
    ParseFailed(String),
}

/// Anything that can turn a natural-language request into an answer.
#[async_trait]
pub trait QueryAnswerer: Send + Sync {
    async fn answer(&self, input: &str) -> Result<String, AgentError>;
}

#[async_trait]
impl QueryAnswerer for SqlAgent {
    async fn answer(&self, input: &str) -> Result<String, AgentError> {
        self.run(input).await
    }
}

// =============================================================================
// SESSION
// =============================================================================

#[derive(Debug)]
pub struct ChatSession {
    transcript: Transcript,
    state: RelayState,
    last_active: Instant,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    #[must_use]
    pub fn new() -> Self {
        Self { transcript: Transcript::seeded(), state: RelayState::Idle, last_active: Instant::now() }
    }

    #[must_use]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    #[must_use]
    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Start a turn: append the user's message and enter processing.
    ///
    /// # Errors
    ///
    /// [`ChatError::EmptyInput`] for blank input, [`ChatError::Busy`] while
    /// another turn is in flight. The transcript is unchanged in both cases.
    pub fn begin(&mut self, input: &str) -> Result<(), ChatError> {
        if input.trim().is_empty() {
            return Err(ChatError::EmptyInput);
        }
        if self.state == RelayState::Processing {
            return Err(ChatError::Busy);
        }
        self.transcript.push(ChatMessage::new(Role::User, input));
        self.state = RelayState::Processing;
        self.last_active = Instant::now();
        Ok(())
    }

    /// Finish the in-flight turn with the agent's result and return to idle.
    ///
    /// # Errors
    ///
    /// [`ChatError::Agent`] for any agent failure other than a parse error.
    pub fn complete(&mut self, result: Result<String, AgentError>) -> Result<TurnOutcome, ChatError> {
        self.state = RelayState::Idle;
        self.last_active = Instant::now();
        match result {
            Ok(answer) => {
                self.transcript.push(ChatMessage::new(Role::Assistant, answer.clone()));
                Ok(TurnOutcome::Answered(answer))
            }
            Err(AgentError::Parse(msg)) => Ok(TurnOutcome::ParseFailed(format!("Parsing error occurred: {msg}"))),
            Err(other) => Err(ChatError::Agent(other)),
        }
    }

    /// Give up on the in-flight turn without an answer. The user's message
    /// stays in the transcript.
    pub fn abandon(&mut self) {
        self.state = RelayState::Idle;
        self.last_active = Instant::now();
    }

    /// Reset the transcript to the greeting.
    ///
    /// # Errors
    ///
    /// [`ChatError::Busy`] while a turn is in flight.
    pub fn clear(&mut self) -> Result<(), ChatError> {
        if self.state == RelayState::Processing {
            return Err(ChatError::Busy);
        }
        self.transcript.reset();
        self.last_active = Instant::now();
        Ok(())
    }

    fn idle_for(&self) -> Duration {
        self.last_active.elapsed()
    }
}

// =============================================================================
// STORE
// =============================================================================

/// Result of one relay turn plus the transcript as it stood afterwards.
#[derive(Debug)]
pub struct TurnReply {
    pub outcome: TurnOutcome,
    pub messages: Vec<ChatMessage>,
}

/// All chat sessions, keyed by the session cookie.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, ChatSession>>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Transcript for `id`, creating a seeded session on first contact.
    pub async fn messages(&self, id: Uuid) -> Vec<ChatMessage> {
        let mut sessions = self.sessions.write().await;
        sessions.entry(id).or_default().transcript().messages().to_vec()
    }

    /// # Errors
    ///
    /// [`ChatError::Busy`] while a turn is in flight for `id`.
    pub async fn clear(&self, id: Uuid) -> Result<Vec<ChatMessage>, ChatError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(id).or_default();
        session.clear()?;
        info!(session_id = %id, "chat: transcript cleared");
        Ok(session.transcript().messages().to_vec())
    }

    /// Run one turn for `id` through `answerer`. The session map is locked
    /// only to begin and to complete the turn, never across the agent call.
    /// The turn completes on a spawned task, so dropping the returned future
    /// does not leave the session processing.
    ///
    /// # Errors
    ///
    /// See [`ChatSession::begin`] and [`ChatSession::complete`];
    /// [`ChatError::TurnAborted`] if the agent task panicked.
    pub async fn relay_turn(
        self: &Arc<Self>,
        id: Uuid,
        answerer: Arc<dyn QueryAnswerer>,
        input: &str,
    ) -> Result<TurnReply, ChatError> {
        self.sessions.write().await.entry(id).or_default().begin(input)?;
        info!(session_id = %id, input_len = input.len(), "chat: turn started");

        let store = Arc::clone(self);
        let input = input.to_string();
        let turn = tokio::spawn(async move {
            let result = answerer.answer(&input).await;
            store.finish_turn(id, result).await
        });

        match turn.await {
            Ok(reply) => reply,
            Err(e) => {
                error!(session_id = %id, error = %e, "chat: turn task failed");
                if let Some(session) = self.sessions.write().await.get_mut(&id) {
                    session.abandon();
                }
                Err(ChatError::TurnAborted)
            }
        }
    }

    async fn finish_turn(&self, id: Uuid, result: Result<String, AgentError>) -> Result<TurnReply, ChatError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(id).or_default();
        let outcome = session.complete(result);
        match &outcome {
            Ok(TurnOutcome::Answered(_)) => info!(session_id = %id, "chat: turn answered"),
            Ok(TurnOutcome::ParseFailed(msg)) => warn!(session_id = %id, error = %msg, "chat: parse error"),
            Err(e) => warn!(session_id = %id, error = %e, "chat: turn failed"),
        }
        Ok(TurnReply { outcome: outcome?, messages: session.transcript().messages().to_vec() })
    }

    /// Drop idle sessions untouched for at least `max_idle`. Sessions with a
    /// turn in flight are kept until the turn has stalled past
    /// [`STALLED_TURN`]. Returns how many were removed.
    pub async fn sweep_idle(&self, max_idle: Duration) -> usize {
        self.sweep(max_idle, STALLED_TURN).await
    }

    async fn sweep(&self, max_idle: Duration, stalled_after: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| match s.state() {
            RelayState::Idle => s.idle_for() < max_idle,
            RelayState::Processing => s.idle_for() < stalled_after,
        });
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

// =============================================================================
// SWEEPER
// =============================================================================

/// `SESSION_IDLE_SECS`, defaulting to one day.
#[must_use]
pub fn session_idle_from_env() -> Duration {
    Duration::from_secs(env_parse("SESSION_IDLE_SECS", DEFAULT_SESSION_IDLE_SECS))
}

/// Spawn the background task that evicts idle chat sessions.
pub fn spawn_session_sweeper(store: Arc<SessionStore>, max_idle: Duration) -> JoinHandle<()> {
    info!(max_idle_secs = max_idle.as_secs(), "chat session sweeper configured");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let removed = store.sweep_idle(max_idle).await;
            if removed > 0 {
                info!(removed, "chat: swept idle sessions");
            }
        }
    })
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
