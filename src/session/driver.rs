//! Session table and per-session turn driver.
//!
//! The UI host calls [`SessionDriver::on_session_start`],
//! [`SessionDriver::on_message`] and [`SessionDriver::on_session_end`].
//! Each session owns its agent and thread; sessions share nothing but the
//! provider handle inside their agents.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agent::{AgentStreamItem, AgentThread, ChatAgent};
use crate::error::ShimError;
use crate::types::Usage;

use super::outbound::OutboundMessage;
use super::state::{SessionState, TurnPolicy};

/// Builds the agent for a new session.
pub trait AgentFactory: Send + Sync {
    fn create(&self, session_id: &str) -> Result<ChatAgent, ShimError>;
}

impl<F> AgentFactory for F
where
    F: Fn(&str) -> Result<ChatAgent, ShimError> + Send + Sync,
{
    fn create(&self, session_id: &str) -> Result<ChatAgent, ShimError> {
        self(session_id)
    }
}

/// Outcome of a committed turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnSummary {
    pub content: String,
    pub thread: AgentThread,
    pub usage: Usage,
}

struct SessionSlot {
    agent: ChatAgent,
    thread: Mutex<Option<AgentThread>>,
    turn: Mutex<()>,
    streaming: AtomicBool,
    cancel: CancellationToken,
}

struct StreamingFlag<'a>(&'a AtomicBool);

impl<'a> StreamingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for StreamingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// How many ended session ids are remembered for [`SessionState::Terminated`].
pub const DEFAULT_ENDED_CAPACITY: usize = 1024;

/// Drives streaming turns for every live UI session.
pub struct SessionDriver {
    factory: Arc<dyn AgentFactory>,
    policy: TurnPolicy,
    sessions: RwLock<HashMap<String, Arc<SessionSlot>>>,
    // Most recently ended last; older ids fall back to `Uninitialized`.
    ended: RwLock<VecDeque<String>>,
    ended_capacity: usize,
}

impl SessionDriver {
    pub fn new(factory: impl AgentFactory + 'static) -> Self {
        Self {
            factory: Arc::new(factory),
            policy: TurnPolicy::default(),
            sessions: RwLock::new(HashMap::new()),
            ended: RwLock::new(VecDeque::new()),
            ended_capacity: DEFAULT_ENDED_CAPACITY,
        }
    }

    /// Remember at most `capacity` ended session ids.
    pub fn with_ended_capacity(mut self, capacity: usize) -> Self {
        self.ended_capacity = capacity;
        self
    }

    pub fn with_turn_policy(mut self, policy: TurnPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn turn_policy(&self) -> TurnPolicy {
        self.policy
    }

    /// Build the session's agent and enter `Active` with no thread.
    pub async fn on_session_start(&self, session_id: &str) -> Result<(), ShimError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(session_id) {
            return Err(ShimError::SessionExists(session_id.to_string()));
        }
        let agent = self.factory.create(session_id)?;
        info!(session_id, agent = %agent.name(), "session started");
        sessions.insert(
            session_id.to_string(),
            Arc::new(SessionSlot {
                agent,
                thread: Mutex::new(None),
                turn: Mutex::new(()),
                streaming: AtomicBool::new(false),
                cancel: CancellationToken::new(),
            }),
        );
        self.ended.write().await.retain(|id| id != session_id);
        Ok(())
    }

    /// Run one streaming turn, forwarding fragments to `outbound`.
    ///
    /// On success the stored thread is replaced and `outbound.send()` is
    /// called. On failure the stored thread is left as it was and
    /// `outbound.fail()` is called. If the session ends mid-turn the turn is
    /// abandoned: no further fragments, no `send`/`fail`, no thread update,
    /// and the result is [`ShimError::Canceled`].
    pub async fn on_message(
        &self,
        session_id: &str,
        message: &str,
        outbound: &mut dyn OutboundMessage,
    ) -> Result<TurnSummary, ShimError> {
        let slot = self.slot(session_id).await?;
        let _turn = self.acquire_turn(session_id, &slot).await?;
        let _streaming = StreamingFlag::raise(&slot.streaming);

        let thread = slot.thread.lock().await.clone();
        debug!(
            session_id,
            history = thread.as_ref().map_or(0, AgentThread::len),
            "turn started"
        );
        let mut stream = slot.agent.invoke_stream(message, thread);

        loop {
            let item = tokio::select! {
                biased;
                _ = slot.cancel.cancelled() => None,
                item = stream.next() => Some(item),
            };
            let Some(item) = item else {
                info!(session_id, "session ended mid-turn; turn abandoned");
                return Err(ShimError::Canceled);
            };
            if slot.cancel.is_cancelled() {
                info!(session_id, "session ended mid-turn; turn abandoned");
                return Err(ShimError::Canceled);
            }

            match item {
                Some(Ok(AgentStreamItem::Fragment(text))) => {
                    outbound.stream_token(&text).await?;
                }
                Some(Ok(AgentStreamItem::Completed {
                    message,
                    thread,
                    usage,
                })) => {
                    *slot.thread.lock().await = Some(thread.clone());
                    debug!(session_id, history = thread.len(), "thread committed");
                    outbound.send().await?;
                    return Ok(TurnSummary {
                        content: message.text(),
                        thread,
                        usage,
                    });
                }
                Some(Err(err)) => return Err(self.fail_turn(session_id, outbound, err).await),
                None => {
                    let err = ShimError::Stream("agent stream ended without completion".into());
                    return Err(self.fail_turn(session_id, outbound, err).await);
                }
            }
        }
    }

    /// Discard the session's agent and thread, cancelling any turn in flight.
    pub async fn on_session_end(&self, session_id: &str) -> Result<(), ShimError> {
        let slot = self
            .sessions
            .write()
            .await
            .remove(session_id)
            .ok_or_else(|| ShimError::SessionNotFound(session_id.to_string()))?;
        slot.cancel.cancel();
        let mut ended = self.ended.write().await;
        ended.retain(|id| id != session_id);
        ended.push_back(session_id.to_string());
        while ended.len() > self.ended_capacity {
            ended.pop_front();
        }
        drop(ended);
        info!(session_id, "session ended");
        Ok(())
    }

    /// Current thread of an active session.
    pub async fn thread(&self, session_id: &str) -> Option<AgentThread> {
        let slot = self.sessions.read().await.get(session_id).cloned()?;
        let thread = slot.thread.lock().await.clone();
        thread
    }

    pub async fn state(&self, session_id: &str) -> SessionState {
        let slot = self.sessions.read().await.get(session_id).cloned();
        if let Some(slot) = slot {
            let thread = slot.thread.lock().await.clone();
            return SessionState::Active {
                thread,
                streaming: slot.streaming.load(Ordering::SeqCst),
            };
        }
        if self.ended.read().await.iter().any(|id| id == session_id) {
            SessionState::Terminated
        } else {
            SessionState::Uninitialized
        }
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn slot(&self, session_id: &str) -> Result<Arc<SessionSlot>, ShimError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| ShimError::SessionNotFound(session_id.to_string()))
    }

    async fn acquire_turn<'a>(
        &self,
        session_id: &str,
        slot: &'a SessionSlot,
    ) -> Result<MutexGuard<'a, ()>, ShimError> {
        match self.policy {
            TurnPolicy::Reject => slot.turn.try_lock().map_err(|_| {
                warn!(session_id, "rejecting overlapping turn");
                ShimError::ConcurrentTurn {
                    session_id: session_id.to_string(),
                }
            }),
            TurnPolicy::Queue => {
                debug!(session_id, "waiting for in-flight turn");
                tokio::select! {
                    biased;
                    _ = slot.cancel.cancelled() => Err(ShimError::Canceled),
                    guard = slot.turn.lock() => Ok(guard),
                }
            }
        }
    }

    async fn fail_turn(
        &self,
        session_id: &str,
        outbound: &mut dyn OutboundMessage,
        err: ShimError,
    ) -> ShimError {
        warn!(
            session_id,
            error = %err,
            backing_service = err.is_backing_service_failure(),
            "turn failed; thread left unchanged"
        );
        if let Err(report) = outbound.fail(&err).await {
            warn!(session_id, error = %report, "could not report failed turn to UI");
        }
        err
    }
}

impl std::fmt::Debug for SessionDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionDriver")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
