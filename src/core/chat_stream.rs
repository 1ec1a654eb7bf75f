//! Streaming chat turns.
//!
//! A [`ChatSession`] owns the conversation. Each [`ChatSession::send`] spawns
//! one background task that streams the reply, posts every fragment to the
//! [`EventSink`] in arrival order, and records the finished turn in the
//! history before announcing completion.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{ChatRequest, ChatResponse, CHAT_ENDPOINT};
use crate::core::config::{ConnectionConfig, TimeoutPolicy};
use crate::core::error::{OperationError, UnexpectedKind};
use crate::core::events::{CoreEvent, EventSink};
use crate::core::message::{ConversationHistory, Message};
use crate::core::transport::{ApiRequest, Transport};

/// Where the session is in its current turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    /// Request issued, response headers not yet received.
    Sending,
    Streaming,
}

/// How a turn ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed { content: String },
    /// Stopped by the caller; `content` holds what arrived before the stop and
    /// was recorded in the history.
    Cancelled { content: String },
    /// Nothing was recorded for the assistant.
    Failed(OperationError),
}

/// Reasons a [`ChatSession`] refuses a call outright.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SendError {
    EmptyMessage,
    NoModelSelected,
    TurnInProgress,
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::EmptyMessage => write!(f, "Message is empty"),
            SendError::NoModelSelected => write!(f, "No model selected"),
            SendError::TurnInProgress => write!(f, "A reply is still streaming"),
        }
    }
}

impl StdError for SendError {}

/// Handle to a running turn.
#[derive(Debug)]
pub struct TurnHandle {
    cancel: CancellationToken,
    task: JoinHandle<TurnOutcome>,
}

impl TurnHandle {
    /// Stop consuming the reply and keep what arrived. Delivery stops at the
    /// next line boundary: at most a fragment already past its check point
    /// is still posted.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn join(self) -> TurnOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(err) => TurnOutcome::Failed(OperationError::from(err)),
        }
    }
}

#[derive(Debug)]
struct SessionShared {
    history: ConversationHistory,
    state: TurnState,
    active_cancel: Option<CancellationToken>,
}

pub struct ChatSession {
    transport: Transport,
    connection: ConnectionConfig,
    model: Option<String>,
    shared: Arc<Mutex<SessionShared>>,
    events: EventSink,
}

impl ChatSession {
    pub fn new(transport: Transport, connection: ConnectionConfig, events: EventSink) -> Self {
        Self {
            transport,
            connection,
            model: None,
            shared: Arc::new(Mutex::new(SessionShared {
                history: ConversationHistory::new(),
                state: TurnState::Idle,
                active_cancel: None,
            })),
            events,
        }
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = Some(model.into());
    }

    pub fn connection(&self) -> &ConnectionConfig {
        &self.connection
    }

    /// Point later turns at another server. A turn already running keeps the
    /// address it started with.
    pub fn set_connection(&mut self, connection: ConnectionConfig) {
        self.connection = connection;
    }

    pub async fn state(&self) -> TurnState {
        self.shared.lock().await.state
    }

    pub async fn history(&self) -> Vec<Message> {
        self.shared.lock().await.history.messages().to_vec()
    }

    pub async fn export_history(&self) -> String {
        self.shared.lock().await.history.to_json_pretty()
    }

    /// Forget the conversation. Refused while a reply is streaming.
    pub async fn clear(&self) -> Result<(), SendError> {
        let mut shared = self.shared.lock().await;
        if shared.state != TurnState::Idle {
            return Err(SendError::TurnInProgress);
        }
        shared.history.clear();
        debug!("Conversation cleared");
        Ok(())
    }

    /// Cancel the running turn, if there is one.
    pub async fn cancel(&self) -> bool {
        match &self.shared.lock().await.active_cancel {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Record `text` as the user's turn and start streaming the reply.
    pub async fn send(&self, text: &str) -> Result<TurnHandle, SendError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SendError::EmptyMessage);
        }
        let model = self.model.clone().ok_or(SendError::NoModelSelected)?;

        let mut shared = self.shared.lock().await;
        if shared.state != TurnState::Idle {
            return Err(SendError::TurnInProgress);
        }
        shared.history.push(Message::user(text));
        let messages = shared.history.to_api_messages();
        let cancel = CancellationToken::new();
        shared.state = TurnState::Sending;
        shared.active_cancel = Some(cancel.clone());
        drop(shared);

        info!(model = %model, messages = messages.len(), "Starting chat turn");
        self.events.post(CoreEvent::ChatStarted {
            model: model.clone(),
        });

        let turn = Turn {
            transport: self.transport.clone(),
            connection: self.connection.clone(),
            request: ChatRequest {
                model,
                messages,
                stream: true,
            },
            cancel: cancel.clone(),
            shared: Arc::clone(&self.shared),
            events: self.events.clone(),
            abnormal_end: AbnormalEnd {
                shared: Arc::clone(&self.shared),
                events: self.events.clone(),
                armed: true,
            },
        };
        let task = tokio::spawn(turn.run());
        Ok(TurnHandle { cancel, task })
    }
}

struct Reply {
    content: String,
    cancelled: bool,
    fragments: usize,
}

/// Everything one turn needs, captured when the turn starts.
struct Turn {
    transport: Transport,
    connection: ConnectionConfig,
    request: ChatRequest,
    cancel: CancellationToken,
    shared: Arc<Mutex<SessionShared>>,
    events: EventSink,
    abnormal_end: AbnormalEnd,
}

/// Returns the session to `Idle` and reports a failure when a turn is dropped
/// before its own bookkeeping ran (the task panicked or was aborted).
struct AbnormalEnd {
    shared: Arc<Mutex<SessionShared>>,
    events: EventSink,
    armed: bool,
}

impl Drop for AbnormalEnd {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match self.shared.try_lock() {
            Ok(mut shared) => {
                shared.state = TurnState::Idle;
                shared.active_cancel = None;
            }
            Err(_) => warn!("Session lock busy while abandoning a chat turn"),
        }
        warn!("Chat turn ended abnormally");
        self.events.post(CoreEvent::ChatFailed(OperationError::Unexpected(
            UnexpectedKind::Task("chat turn ended abnormally".to_string()),
        )));
    }
}

impl Turn {
    async fn run(mut self) -> TurnOutcome {
        let result = self.stream_reply().await;

        let mut shared = self.shared.lock().await;
        shared.state = TurnState::Idle;
        shared.active_cancel = None;
        self.abnormal_end.armed = false;

        match result {
            Ok(reply) => {
                shared.history.push(Message::assistant(reply.content.clone()));
                drop(shared);
                info!(
                    fragments = reply.fragments,
                    chars = reply.content.len(),
                    cancelled = reply.cancelled,
                    "Chat turn finished"
                );
                self.events.post(CoreEvent::ChatCompleted {
                    content: reply.content.clone(),
                    cancelled: reply.cancelled,
                });
                if reply.cancelled {
                    TurnOutcome::Cancelled {
                        content: reply.content,
                    }
                } else {
                    TurnOutcome::Completed {
                        content: reply.content,
                    }
                }
            }
            Err(err) => {
                drop(shared);
                warn!(error_kind = err.kind(), error = %err, "Chat turn failed");
                self.events.post(CoreEvent::ChatFailed(err.clone()));
                TurnOutcome::Failed(err)
            }
        }
    }

    async fn stream_reply(&self) -> Result<Reply, OperationError> {
        let mut reply = Reply {
            content: String::new(),
            cancelled: false,
            fragments: 0,
        };

        let request = ApiRequest::post(CHAT_ENDPOINT, &self.request)?.timeout(TimeoutPolicy::Chat);
        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                reply.cancelled = true;
                return Ok(reply);
            }
            response = self.transport.execute(&self.connection, request) => {
                response?.error_for_status()?
            }
        };

        self.shared.lock().await.state = TurnState::Streaming;
        let mut lines = response.lines::<ChatResponse>();

        loop {
            let record = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                record = lines.next_record() => Some(record),
            };
            let Some(record) = record else {
                reply.cancelled = true;
                break;
            };
            let Some(record) = record else {
                break;
            };
            let record = record?;

            if let Some(error) = &record.error {
                warn!(error = %error, "Server reported an error line in the chat stream");
            }
            if let Some(message) = record.message {
                if self.cancel.is_cancelled() {
                    reply.cancelled = true;
                    break;
                }
                if !message.content.is_empty() {
                    reply.content.push_str(&message.content);
                    reply.fragments += 1;
                    self.events.post(CoreEvent::ChatFragment(message.content));
                }
            }
            // Servers may keep the connection open after the final record.
            if record.done {
                break;
            }
        }

        if reply.cancelled {
            debug!(fragments = reply.fragments, "Chat stream cancelled");
        }
        Ok(reply)
    }
}
