//! Conversation state manager
//!
//! Owns the message list, the draft and the outstanding reply. Replies are
//! produced on a spawned task and come back as [`ReplyOutcome`]s through the
//! channel handed to [`Conversation::new`]; the owner feeds them to
//! [`Conversation::apply_reply`]. Nothing else mutates the conversation.
//!
//! States: Idle -> (submit) -> AwaitingReply -> (reply, error or cancel) -> Idle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::backend::ReplyBackend;
use crate::draft::Draft;
use crate::error::{ChatError, Result};
use crate::state::ChatMessage;

/// Result of one reply task, tagged with the ticket it answers.
#[derive(Debug)]
pub struct ReplyOutcome {
    pub ticket: u64,
    pub result: Result<String>,
}

#[derive(Debug)]
struct PendingReply {
    ticket: u64,
    task: JoinHandle<()>,
}

pub struct Conversation {
    messages: Vec<ChatMessage>,
    pub draft: Draft,
    pending: Option<PendingReply>,
    next_ticket: u64,
    backend: Arc<dyn ReplyBackend>,
    reply_timeout: Duration,
    replies: mpsc::UnboundedSender<ReplyOutcome>,
}

impl Conversation {
    pub fn new(
        backend: Arc<dyn ReplyBackend>,
        reply_timeout: Duration,
        replies: mpsc::UnboundedSender<ReplyOutcome>,
    ) -> Self {
        Self {
            messages: Vec::new(),
            draft: Draft::new(),
            pending: None,
            next_ticket: 1,
            backend,
            reply_timeout,
            replies,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_ticket(&self) -> Option<u64> {
        self.pending.as_ref().map(|p| p.ticket)
    }

    pub fn backend_name(&self) -> String {
        self.backend.name()
    }

    /// Whether the send action is currently available.
    pub fn can_send(&self) -> bool {
        !self.is_pending() && !self.draft.is_blank()
    }

    /// Append `text` as a user message and start producing the reply.
    ///
    /// Returns `Ok(false)` without touching anything when `text` is blank, and
    /// `Err(ChatError::ReplyPending)` while another reply is outstanding.
    /// Must be called from within a tokio runtime.
    pub fn submit(&mut self, text: &str) -> Result<bool> {
        if text.trim().is_empty() {
            return Ok(false);
        }
        if self.is_pending() {
            tracing::debug!("submit rejected: reply already pending");
            return Err(ChatError::ReplyPending);
        }

        self.messages.push(ChatMessage::user(text));
        self.draft.clear();

        let ticket = self.next_ticket;
        self.next_ticket += 1;

        let history = self.messages.clone();
        let backend = Arc::clone(&self.backend);
        let replies = self.replies.clone();
        let timeout = self.reply_timeout;

        tracing::info!(ticket, backend = %backend.name(), messages = history.len(), "requesting reply");

        let task = tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, backend.reply(&history)).await {
                Ok(result) => result,
                Err(_) => Err(ChatError::ReplyTimeout(timeout)),
            };
            // Receiver gone means the shell is shutting down
            let _ = replies.send(ReplyOutcome { ticket, result });
        });

        self.pending = Some(PendingReply { ticket, task });
        Ok(true)
    }

    /// Submit whatever is in the draft.
    pub fn submit_draft(&mut self) -> Result<bool> {
        let text = self.draft.text().to_string();
        self.submit(&text)
    }

    /// Apply a finished reply.
    ///
    /// Returns `Ok(true)` when an assistant message was appended, `Ok(false)`
    /// when the outcome belongs to a cancelled or superseded request, and the
    /// backend's error otherwise. Either way a matching outcome ends the wait.
    pub fn apply_reply(&mut self, outcome: ReplyOutcome) -> Result<bool> {
        if self.pending_ticket() != Some(outcome.ticket) {
            tracing::debug!(ticket = outcome.ticket, "dropping stale reply");
            return Ok(false);
        }
        self.pending = None;

        match outcome.result {
            Ok(text) => {
                tracing::info!(ticket = outcome.ticket, chars = text.chars().count(), "reply received");
                self.messages.push(ChatMessage::assistant(text));
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(ticket = outcome.ticket, error = %e, "reply failed");
                Err(e)
            }
        }
    }

    /// Abort the outstanding reply, if any.
    pub fn cancel_pending(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                pending.task.abort();
                tracing::info!(ticket = pending.ticket, "reply cancelled");
                true
            }
            None => false,
        }
    }

    /// Start over: cancel any pending reply and drop all messages. The draft is kept.
    pub fn clear(&mut self) {
        self.cancel_pending();
        self.messages.clear();
    }
}

impl Drop for Conversation {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.task.abort();
        }
    }
}
