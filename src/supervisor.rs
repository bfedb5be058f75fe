//! Domain supervisor: single-step classification over a closed worker set.
//!
//! Each `decide` call is a fresh classification with no memory besides the
//! message history. The supervisor delegates the choice to the generation
//! collaborator constrained to the closed candidate set, then validates the
//! answer at the boundary: anything that is not a registered worker or the
//! finish sentinel is remapped to the set's nominated fallback worker —
//! never to finish, never left unresolved.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::clients::{GenerationClient, GenerationRequest};
use crate::error::{Error, Result};
use crate::state::{ConversationState, Message, Role};
use crate::workerset::WorkerSet;

/// Answer value a supervisor may return to signal completion.
pub const FINISH: &str = "FINISH";

const HISTORY_TAIL_MESSAGES: usize = 12;
const HISTORY_TAIL_MESSAGE_CHARS: usize = 400;

/// Outcome of one supervisor classification. `Worker` indexes are validated
/// against the worker set, so a decision is a valid member by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// Run the worker at this index in the set
    Worker(usize),
    /// The conversation turn is complete
    Finish,
}

/// A routing decision-maker scoped to one worker set.
#[derive(Clone)]
pub struct Supervisor {
    domain: String,
    guidance: String,
    generation: Arc<dyn GenerationClient>,
}

impl Supervisor {
    /// Create a supervisor for a domain with its routing guidance text.
    /// Guidance is policy data tuned without redeploys, not control flow.
    pub fn new(
        domain: impl Into<String>,
        guidance: impl Into<String>,
        generation: Arc<dyn GenerationClient>,
    ) -> Self {
        Self {
            domain: domain.into(),
            guidance: guidance.into(),
            generation,
        }
    }

    /// Domain this supervisor routes for.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Classify the next routing target for the conversation.
    ///
    /// Only a backend that is down propagates an error; a malformed or
    /// failed single classification resolves to the fallback worker so the
    /// traversal always continues with a valid member.
    pub async fn decide(
        &self,
        state: &ConversationState,
        workers: &WorkerSet,
    ) -> Result<RouteDecision> {
        let mut choices = workers.names();
        choices.push(FINISH.to_string());

        let request = GenerationRequest::new()
            .with_instructions(self.decision_instructions(workers))
            .with_history(vec![Message::user(render_history_tail(state))])
            .with_temperature(0.0);

        let raw = match self.generation.classify(request, &choices).await {
            Ok(raw) => raw,
            Err(Error::GenerationUnavailable(message)) => {
                return Err(Error::GenerationUnavailable(message));
            }
            Err(err) => {
                warn!(domain = %self.domain, %err, "classification call failed, using fallback worker");
                return Ok(RouteDecision::Worker(workers.fallback_index()));
            }
        };

        debug!(domain = %self.domain, %raw, "supervisor classification");
        Ok(self.resolve(&raw, workers))
    }

    /// Validate a raw classification answer against the closed set.
    pub fn resolve(&self, raw: &str, workers: &WorkerSet) -> RouteDecision {
        let answer = normalize(raw);

        if answer == normalize(FINISH) {
            return RouteDecision::Finish;
        }
        if let Some(index) = workers
            .iter()
            .position(|e| normalize(e.name()) == answer)
        {
            return RouteDecision::Worker(index);
        }

        // Lenient pass: a known identity embedded in a longer reply still
        // counts. Checked in registration order for determinism.
        if let Some(index) = workers
            .iter()
            .position(|e| answer.contains(&normalize(e.name())))
        {
            return RouteDecision::Worker(index);
        }

        warn!(
            domain = %self.domain,
            %raw,
            "classification outside the closed set, using fallback worker"
        );
        RouteDecision::Worker(workers.fallback_index())
    }

    fn decision_instructions(&self, workers: &WorkerSet) -> String {
        let mut candidates = String::new();
        for entry in workers.iter() {
            candidates.push_str(&format!("- {}: {}\n", entry.name(), entry.description()));
        }
        candidates.push_str(&format!(
            "- {FINISH}: the latest user message has already been answered\n"
        ));

        format!(
            "You are the routing supervisor for the {domain} domain of a chat \
             assistant. Read the conversation and pick which worker should \
             handle the next step, or {FINISH} if the turn is complete. Weigh \
             the most recent user message most heavily, but do not discard \
             earlier context.\n\n{guidance}\n\nWorkers:\n{candidates}",
            domain = self.domain,
            guidance = self.guidance,
        )
    }
}

fn normalize(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '.' || c == '`')
        .to_lowercase()
}

/// Render a compact tail of the conversation for the decision prompt.
/// Long messages are truncated on a char boundary.
fn render_history_tail(state: &ConversationState) -> String {
    let mut out = String::new();
    for message in state.last_messages(HISTORY_TAIL_MESSAGES) {
        if message.role == Role::System {
            continue;
        }
        let label = match message.role {
            Role::User => "User",
            _ => "Assistant",
        };
        let content = truncate_chars(&message.content, HISTORY_TAIL_MESSAGE_CHARS);
        out.push_str(&format!("{label}: {content}\n"));
        if let Some(url) = message.media_url() {
            out.push_str(&format!("{label} attached media: {url}\n"));
        }
    }
    out
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}…")
}
