//! Conversation state: messages, routing hint, language, and entitlements.
//!
//! A `ConversationState` is the unit of routing truth for one cycle. History
//! is loaded before the cycle starts, messages are append-only within the
//! cycle, and the cost ledger only grows.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::ledger::CostLedger;
use crate::trace::RouteTrace;

/// Route hint sentinel written when a supervisor signals completion.
pub const ROUTE_TERMINATE: &str = "terminate";

/// The role of a message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions
    System,
    /// Human counterpart input
    User,
    /// Assistant reply
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A message in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: Role,
    /// Content of the message
    pub content: String,
    /// When the message was created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Side-channel annotations (media urls, per-message cost deltas, etc.)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<HashMap<String, Value>>,
}

impl Message {
    /// Create a new message with just role and content.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Some(Utc::now()),
            annotations: None,
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Attach an annotation to the message.
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.annotations
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Get an annotation value.
    pub fn get_annotation(&self, key: &str) -> Option<&Value> {
        self.annotations.as_ref()?.get(key)
    }

    /// Media URL carried by this message, either as an explicit annotation
    /// set by the channel transport or embedded in the text.
    pub fn media_url(&self) -> Option<String> {
        if let Some(Value::String(url)) = self.get_annotation("media_url") {
            return Some(url.clone());
        }
        media_url_pattern()
            .find(&self.content)
            .map(|m| m.as_str().to_string())
    }
}

fn media_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Signed CDN links carry auth in the query string, so the suffix
        // must be kept or the URL is unfetchable.
        Regex::new(r"(?i)https?://\S+\.(?:png|jpe?g|gif|webp|heic|pdf)\b(?:[?#]\S*)?")
            .expect("media url pattern is valid")
    })
}

/// Read-only credit/subscription numbers captured at cycle start.
///
/// Responders may read these but never write them; spending is settled by
/// the billing collaborator after the cycle using the cost ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitlementSnapshot {
    /// Credits remaining at cycle start
    pub credits_remaining: i64,
    /// Whether the subject holds an active subscription
    pub subscription_active: bool,
}

/// The full conversation state threaded through one routing cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationState {
    /// Ordered conversation history, append-only within a cycle
    pub messages: Vec<Message>,
    /// Last routing decision's target name, or the terminate sentinel.
    /// Observability only; control flow never reads it back.
    pub route_hint: Option<String>,
    /// Natural language for outbound replies; set once before any
    /// user-facing generation runs.
    pub language: String,
    /// Phone number / username of the human counterpart
    pub subject_identity: String,
    /// Metered work performed this cycle
    pub cost: CostLedger,
    /// Credits/subscription snapshot, read-only for the whole cycle
    pub entitlements: EntitlementSnapshot,
    /// Routing path taken so far (observability only)
    #[serde(default)]
    pub trace: RouteTrace,
}

impl ConversationState {
    /// Create a fresh state for a subject, with the default language.
    pub fn new(subject_identity: impl Into<String>) -> Self {
        Self {
            messages: Vec::new(),
            route_hint: None,
            language: "english".to_string(),
            subject_identity: subject_identity.into(),
            cost: CostLedger::new(),
            entitlements: EntitlementSnapshot::default(),
            trace: RouteTrace::new(),
        }
    }

    /// Set the reply language.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set the entitlement snapshot.
    pub fn with_entitlements(mut self, entitlements: EntitlementSnapshot) -> Self {
        self.entitlements = entitlements;
        self
    }

    /// Append a message to the history.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append a user message.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    /// Append an assistant message.
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(Message::assistant(content));
    }

    /// Record the last routing decision (observability only).
    pub fn note_route(&mut self, target: impl Into<String>) {
        self.route_hint = Some(target.into());
    }

    /// Record supervisor completion (observability only).
    pub fn note_terminate(&mut self) {
        self.route_hint = Some(ROUTE_TERMINATE.to_string());
    }

    /// The final message, if any.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// The most recent user message.
    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::User)
    }

    /// The most recent assistant message.
    pub fn last_assistant_message(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
    }

    /// True if the cycle already produced a reply.
    pub fn ends_with_assistant(&self) -> bool {
        matches!(self.last_message(), Some(m) if m.role == Role::Assistant)
    }

    /// The most recent media URL anywhere in the history.
    pub fn latest_media_url(&self) -> Option<String> {
        self.messages.iter().rev().find_map(|m| m.media_url())
    }

    /// The last N messages.
    pub fn last_messages(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let msg = Message::user("What's a good recipe?");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "What's a good recipe?");
        assert!(msg.timestamp.is_some());
    }

    #[test]
    fn test_media_url_from_annotation() {
        let msg = Message::user("what's wrong with this?")
            .with_annotation("media_url", "https://cdn.example.com/uploads/sink");
        assert_eq!(
            msg.media_url().as_deref(),
            Some("https://cdn.example.com/uploads/sink")
        );
    }

    #[test]
    fn test_media_url_from_content() {
        let msg = Message::user("see https://cdn.example.com/leak.JPG please");
        assert_eq!(
            msg.media_url().as_deref(),
            Some("https://cdn.example.com/leak.JPG")
        );

        let plain = Message::user("no media here, just https://example.com/page");
        assert_eq!(plain.media_url(), None);
    }

    #[test]
    fn test_media_url_keeps_signed_query_suffix() {
        let msg = Message::user(
            "here https://cdn.example.com/sink.jpg?X-Amz-Signature=abc123&X-Amz-Expires=300",
        );
        assert_eq!(
            msg.media_url().as_deref(),
            Some("https://cdn.example.com/sink.jpg?X-Amz-Signature=abc123&X-Amz-Expires=300")
        );
    }

    #[test]
    fn test_state_defaults() {
        let state = ConversationState::new("+15551234567");
        assert_eq!(state.language, "english");
        assert_eq!(state.subject_identity, "+15551234567");
        assert!(state.messages.is_empty());
        assert!(state.route_hint.is_none());
        assert!(state.cost.is_empty());
    }

    #[test]
    fn test_ends_with_assistant() {
        let mut state = ConversationState::new("user1");
        state.push_user("hello");
        assert!(!state.ends_with_assistant());

        state.push_assistant("hi there");
        assert!(state.ends_with_assistant());
    }

    #[test]
    fn test_latest_media_url_scans_backwards() {
        let mut state = ConversationState::new("user1");
        state.push(Message::user("first").with_annotation("media_url", "https://a/img1.png"));
        state.push_assistant("got it");
        state.push(Message::user("second").with_annotation("media_url", "https://a/img2.png"));

        assert_eq!(state.latest_media_url().as_deref(), Some("https://a/img2.png"));
    }

    #[test]
    fn test_route_notes() {
        let mut state = ConversationState::new("user1");
        state.note_route("food");
        assert_eq!(state.route_hint.as_deref(), Some("food"));

        state.note_terminate();
        assert_eq!(state.route_hint.as_deref(), Some(ROUTE_TERMINATE));
    }
}
