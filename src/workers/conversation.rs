//! Plain conversational worker.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::clients::{GenerationClient, GenerationRequest};
use crate::error::{Error, Result};
use crate::responder::Responder;
use crate::state::ConversationState;

use super::apology_in;

/// Answers with free-form generation conditioned on the full history.
///
/// Plain generation is bundled into the subscription, so this worker does
/// not charge the ledger. It is the usual fallback nominee for its domain.
pub struct ConversationWorker {
    name: String,
    instructions: String,
    generation: Arc<dyn GenerationClient>,
}

impl ConversationWorker {
    pub fn new(
        name: impl Into<String>,
        instructions: impl Into<String>,
        generation: Arc<dyn GenerationClient>,
    ) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            generation,
        }
    }
}

#[async_trait]
impl Responder for ConversationWorker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn respond(&self, mut state: ConversationState) -> Result<ConversationState> {
        let request = GenerationRequest::new()
            .with_instructions(self.instructions.clone())
            .with_history(state.messages.clone())
            .with_language(state.language.clone());

        match self.generation.generate(request).await {
            Ok(reply) => state.push_assistant(reply),
            Err(Error::GenerationUnavailable(message)) => {
                return Err(Error::GenerationUnavailable(message));
            }
            Err(err) => {
                warn!(worker = %self.name, %err, "generation failed, substituting apology");
                state.push_assistant(apology_in(&state.language));
            }
        }

        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Fixed(&'static str);

    #[async_trait]
    impl GenerationClient for Fixed {
        async fn generate(&self, request: GenerationRequest) -> Result<String> {
            assert_eq!(request.language, "english");
            Ok(self.0.to_string())
        }
    }

    struct Failing;

    #[async_trait]
    impl GenerationClient for Failing {
        async fn generate(&self, _request: GenerationRequest) -> Result<String> {
            Err(Error::generation("test", "boom"))
        }
    }

    struct Down;

    #[async_trait]
    impl GenerationClient for Down {
        async fn generate(&self, _request: GenerationRequest) -> Result<String> {
            Err(Error::unavailable("connect refused"))
        }
    }

    #[tokio::test]
    async fn test_appends_one_reply_without_charging() {
        let worker = ConversationWorker::new(
            "conversation",
            "Answer food questions.",
            Arc::new(Fixed("Try arroz con pollo.")),
        );
        let mut state = ConversationState::new("u");
        state.push_user("What's a good recipe with chicken and rice?");

        let state = worker.respond(state).await.unwrap();
        assert_eq!(state.messages.len(), 2);
        assert_eq!(
            state.last_assistant_message().unwrap().content,
            "Try arroz con pollo."
        );
        assert!(state.cost.is_empty());
    }

    #[tokio::test]
    async fn test_failed_call_substitutes_localized_apology() {
        let worker = ConversationWorker::new("conversation", "", Arc::new(Failing));
        let mut state = ConversationState::new("u").with_language("spanish");
        state.push_user("hola");

        let state = worker.respond(state).await.unwrap();
        assert!(state
            .last_assistant_message()
            .unwrap()
            .content
            .starts_with("Lo siento"));
    }

    #[tokio::test]
    async fn test_unavailable_backend_propagates() {
        let worker = ConversationWorker::new("conversation", "", Arc::new(Down));
        let mut state = ConversationState::new("u");
        state.push_user("hi");

        let err = worker.respond(state).await.unwrap_err();
        assert!(matches!(err, Error::GenerationUnavailable(_)));
    }

    #[tokio::test]
    async fn test_independent_states_do_not_share_mutations() {
        let worker = Arc::new(ConversationWorker::new(
            "conversation",
            "",
            Arc::new(Fixed("ok")),
        ));

        let mut a = ConversationState::new("subject_a");
        a.push_user("hello from a");
        let mut b = ConversationState::new("subject_b");
        b.push_user("hello from b");

        let (a, b) = tokio::join!(worker.respond(a), worker.respond(b));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.messages.len(), 2);
        assert_eq!(b.messages.len(), 2);
        assert_eq!(a.subject_identity, "subject_a");
        assert_eq!(b.messages[0].content, "hello from b");
    }
}
