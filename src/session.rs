//! Dialogue session controller.
//!
//! Owns one processing cycle: load history, resolve the reply language,
//! drive the root graph under a deadline, and apply the finalization
//! guarantee — every cycle that receives a user message ends with exactly
//! one assistant reply appended, however the internal routing degenerated.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::clients::{Collaborators, GenerationClient, GenerationRequest, LanguageClient};
use crate::error::{Error, Result};
use crate::history::HistoryStore;
use crate::ledger::CostLedger;
use crate::responder::Responder;
use crate::state::{ConversationState, EntitlementSnapshot, Message};
use crate::workers::apology_in;

const FALLBACK_INSTRUCTIONS: &str = "You are a friendly chat assistant. The previous \
step failed to produce an answer. Read the conversation and reply helpfully to the \
latest user message. If you cannot help, apologize briefly and ask the user to \
rephrase.";

/// Controller tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Overall per-cycle deadline; expiry triggers the fallback-reply path
    pub cycle_deadline_ms: u64,
    /// Language used when neither hint nor detection yields one
    pub default_language: String,
    /// Whether to run language detection when no hint is given
    pub detect_language: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cycle_deadline_ms: 90_000,
            default_language: "english".to_string(),
            detect_language: true,
        }
    }
}

/// A normalized inbound message handed over by the channel transport.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Phone number / username of the sender
    pub subject_identity: String,
    /// Message text
    pub text: String,
    /// Channel-assigned message id, unique per inbound message
    pub message_id: Option<String>,
    /// Attached media, already validated and uploaded by the transport
    pub media_url: Option<String>,
    /// Language declared by the transport, if any
    pub language_hint: Option<String>,
    /// Credit/subscription snapshot captured by the billing layer
    pub entitlements: EntitlementSnapshot,
}

impl InboundMessage {
    pub fn new(subject_identity: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            subject_identity: subject_identity.into(),
            text: text.into(),
            message_id: None,
            media_url: None,
            language_hint: None,
            entitlements: EntitlementSnapshot::default(),
        }
    }

    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    pub fn with_media_url(mut self, url: impl Into<String>) -> Self {
        self.media_url = Some(url.into());
        self
    }

    pub fn with_language_hint(mut self, language: impl Into<String>) -> Self {
        self.language_hint = Some(language.into());
        self
    }

    pub fn with_entitlements(mut self, entitlements: EntitlementSnapshot) -> Self {
        self.entitlements = entitlements;
        self
    }
}

/// Non-fatal degradations surfaced alongside a successful reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleWarning {
    /// A domain graph hit its iteration cap
    RoutingExhausted,
    /// The cycle deadline expired before routing finished. The dropped
    /// dispatch takes its ledger charges with it: the report bills nothing
    /// for the expired cycle.
    DeadlineExpired,
    /// The traversal ended without a reply; the fallback generator produced one
    FallbackReply,
}

/// Result of one completed cycle, returned to the channel transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    /// Correlation id for logs
    pub cycle_id: Uuid,
    /// The guaranteed assistant reply
    pub reply_text: String,
    /// Metered work for billing settlement
    pub cost: CostLedger,
    /// Degradation note, if the fallback path was taken
    pub warning: Option<CycleWarning>,
    /// Compact routing path for observability
    pub route_path: String,
    /// Key for billing-side deduplication of cycle retries. Derived from
    /// the channel's message id; absent when the channel supplied none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

/// Drives the supervisor→responder loop for one inbound message at a time.
///
/// Stateless across cycles; safe to share across concurrent cycles for
/// different subjects. The channel transport serializes cycles per subject.
pub struct SessionController {
    root: Arc<dyn Responder>,
    generation: Arc<dyn GenerationClient>,
    language: Arc<dyn LanguageClient>,
    history: Arc<dyn HistoryStore>,
    config: SessionConfig,
}

impl SessionController {
    /// Create a controller over a wired root responder.
    pub fn new(root: Arc<dyn Responder>, collaborators: &Collaborators) -> Self {
        Self {
            root,
            generation: collaborators.generation.clone(),
            language: collaborators.language.clone(),
            history: collaborators.history.clone(),
            config: SessionConfig::default(),
        }
    }

    /// Override the controller tunables.
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Process one inbound message to a guaranteed reply.
    pub async fn run_cycle(&self, inbound: InboundMessage) -> Result<CycleReport> {
        let cycle_id = Uuid::new_v4();

        let mut state = ConversationState::new(&inbound.subject_identity)
            .with_entitlements(inbound.entitlements);
        state.messages = self.history.load(&inbound.subject_identity)?;
        let loaded = state.messages.len();

        let mut user_message = Message::user(&inbound.text);
        if let Some(url) = &inbound.media_url {
            user_message = user_message.with_annotation("media_url", url.clone());
        }
        state.push(user_message);

        // Language is fixed before any user-facing generation runs.
        state.language = self.resolve_language(&inbound, &state).await;
        info!(
            %cycle_id,
            subject = %inbound.subject_identity,
            language = %state.language,
            "cycle start"
        );

        let pre_dispatch = state.clone();
        let deadline = Duration::from_millis(self.config.cycle_deadline_ms);
        let (mut state, mut warning) =
            match tokio::time::timeout(deadline, self.root.respond(state)).await {
                Ok(Ok(state)) => {
                    let warning = state
                        .trace
                        .was_exhausted()
                        .then_some(CycleWarning::RoutingExhausted);
                    (state, warning)
                }
                Ok(Err(Error::GenerationUnavailable(message))) => {
                    warn!(%cycle_id, %message, "generation backend unavailable");
                    return Err(Error::GenerationUnavailable(message));
                }
                Ok(Err(err)) => {
                    warn!(%cycle_id, %err, "routing failed, taking fallback path");
                    (pre_dispatch, Some(CycleWarning::FallbackReply))
                }
                Err(_) => {
                    // The timed-out future is dropped with its state, so any
                    // charges metered before expiry never reach the report.
                    warn!(
                        %cycle_id,
                        deadline_ms = self.config.cycle_deadline_ms,
                        "cycle deadline expired, taking fallback path"
                    );
                    (pre_dispatch, Some(CycleWarning::DeadlineExpired))
                }
            };

        // Finalization guarantee: a cycle never ends on the user's message.
        if !state.ends_with_assistant() {
            self.fallback_reply(&mut state).await;
            warning.get_or_insert(CycleWarning::FallbackReply);
        }

        for message in &state.messages[loaded..] {
            if let Err(err) = self.history.append(&inbound.subject_identity, message) {
                warn!(%cycle_id, %err, "failed to persist message");
            }
        }

        let reply_text = state
            .last_assistant_message()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let route_path = state.trace.path();
        info!(
            %cycle_id,
            route = %route_path,
            cost_units = state.cost.total_units(),
            warning = ?warning,
            "cycle complete"
        );

        Ok(CycleReport {
            cycle_id,
            reply_text,
            cost: state.cost,
            warning,
            route_path,
            idempotency_key: inbound
                .message_id
                .as_deref()
                .map(|id| idempotency_key(&inbound.subject_identity, id)),
        })
    }

    /// Supervisor-bypassing reply of last resort. Never fails: if the
    /// generator is also unusable, a static localized apology goes out.
    async fn fallback_reply(&self, state: &mut ConversationState) {
        state.trace.fallback("controller");

        let request = GenerationRequest::new()
            .with_instructions(FALLBACK_INSTRUCTIONS)
            .with_history(state.messages.clone())
            .with_language(state.language.clone());

        match self.generation.generate(request).await {
            Ok(reply) => state.push_assistant(reply),
            Err(err) => {
                warn!(%err, "fallback generator failed, using static apology");
                state.push_assistant(apology_in(&state.language));
            }
        }
    }

    async fn resolve_language(
        &self,
        inbound: &InboundMessage,
        state: &ConversationState,
    ) -> String {
        if let Some(hint) = &inbound.language_hint {
            return hint.to_lowercase();
        }
        if !self.config.detect_language {
            return self.config.default_language.clone();
        }
        match self.language.detect(&state.messages).await {
            Ok(language) => language.to_lowercase(),
            Err(err) => {
                warn!(%err, "language detection failed, using default");
                self.config.default_language.clone()
            }
        }
    }
}

/// Key the billing caller can use to deduplicate retried cycles. Keyed on
/// the channel's message id, not the text: the same subject sending the
/// same text twice is two billable cycles.
fn idempotency_key(subject_identity: &str, message_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(subject_identity.as_bytes());
    hasher.update(b"\n");
    hasher.update(message_id.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
