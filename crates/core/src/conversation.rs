//! Conversation state.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// The human name used when a conversation is started without one.
pub const DEFAULT_HUMAN_NAME: &str = "HUMAN";

/// The transcript and per-turn bookkeeping of a conversation.
///
/// The state can only be changed through the operations of
/// [`Agent`](crate::Agent): the transcript is either replaced as a whole
/// or appended to, and the message/reply logs only grow.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Conversation {
    transcript: String,
    active: bool,
    human_name: Option<String>,
    started_at: Option<DateTime<Utc>>,
    messages: Vec<String>,
    replies: Vec<String>,
}

impl Conversation {
    /// Returns the full transcript.
    #[inline]
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Returns `true` once a conversation has been started.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Returns the human name the conversation was started with, or
    /// [`DEFAULT_HUMAN_NAME`].
    #[inline]
    pub fn human_name(&self) -> &str {
        self.human_name.as_deref().unwrap_or(DEFAULT_HUMAN_NAME)
    }

    /// Returns the time the current conversation was started.
    #[inline]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Returns every message recorded so far, in order.
    #[inline]
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Returns every non-empty reply recorded so far, in order.
    #[inline]
    pub fn replies(&self) -> &[String] {
        &self.replies
    }

    /// Counts the human turns in the transcript, by counting the
    /// occurrences of `"{human_name}:"`.
    ///
    /// The name is matched literally, so it may contain any character.
    pub fn turn_count(&self) -> usize {
        let label = format!("{}:", self.human_name());
        self.transcript.matches(label.as_str()).count()
    }

    /// Starts over with a freshly rendered transcript.
    pub(crate) fn restart(
        &mut self,
        transcript: String,
        human_name: Option<String>,
    ) {
        self.transcript = transcript;
        self.active = true;
        self.human_name = human_name;
        self.started_at = Some(Utc::now());
    }

    /// Replaces the transcript verbatim.
    pub(crate) fn replace_transcript(&mut self, transcript: String) {
        self.transcript = transcript;
    }

    /// Appends a turn: the rendered prefix, the trimmed reply and a line
    /// feed.
    pub(crate) fn append_turn(
        &mut self,
        prefix: &str,
        message: &str,
        reply: Option<&str>,
    ) {
        let reply = reply.unwrap_or_default();
        self.transcript.push_str(prefix);
        self.transcript.push_str(reply.trim());
        self.transcript.push('\n');

        self.messages.push(message.to_owned());
        if !reply.is_empty() {
            self.replies.push(reply.to_owned());
        }
    }
}
