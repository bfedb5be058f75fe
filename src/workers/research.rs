//! Search-augmented research worker.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::clients::{ChannelNotifier, SearchClient, SearchRequest};
use crate::error::{Error, Result};
use crate::ledger::CostCategory;
use crate::responder::Responder;
use crate::state::ConversationState;

use super::{apology_in, wait_notice_in};

/// Answers questions that need live web data.
///
/// Search is slow, so the subject gets an out-of-band "working on it" note
/// first; a failed notification never blocks the reply. Each search call
/// charges one `WebResearch` unit before the collaborator is invoked.
pub struct ResearchWorker {
    name: String,
    instructions: String,
    search: Arc<dyn SearchClient>,
    notifier: Arc<dyn ChannelNotifier>,
}

impl ResearchWorker {
    pub fn new(
        name: impl Into<String>,
        instructions: impl Into<String>,
        search: Arc<dyn SearchClient>,
        notifier: Arc<dyn ChannelNotifier>,
    ) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            search,
            notifier,
        }
    }
}

#[async_trait]
impl Responder for ResearchWorker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn respond(&self, mut state: ConversationState) -> Result<ConversationState> {
        if let Err(err) = self
            .notifier
            .notify(&state.subject_identity, wait_notice_in(&state.language))
            .await
        {
            debug!(worker = %self.name, %err, "wait notice failed");
        }

        state.cost.charge(CostCategory::WebResearch);

        let request = SearchRequest {
            instructions: self.instructions.clone(),
            history: state.messages.clone(),
            model_hint: None,
            language: state.language.clone(),
        };

        match self.search.search(request).await {
            Ok(reply) => state.push_assistant(reply),
            Err(Error::GenerationUnavailable(message)) => {
                return Err(Error::GenerationUnavailable(message));
            }
            Err(err) => {
                warn!(worker = %self.name, %err, "search failed, substituting apology");
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
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedSearch(&'static str);

    #[async_trait]
    impl SearchClient for FixedSearch {
        async fn search(&self, request: SearchRequest) -> Result<String> {
            assert!(!request.history.is_empty());
            Ok(self.0.to_string())
        }
    }

    struct FailingSearch;

    #[async_trait]
    impl SearchClient for FailingSearch {
        async fn search(&self, _request: SearchRequest) -> Result<String> {
            Err(Error::generation("search", "provider hiccup"))
        }
    }

    #[derive(Default)]
    struct CountingNotifier(AtomicUsize);

    #[async_trait]
    impl ChannelNotifier for CountingNotifier {
        async fn notify(&self, _subject: &str, _text: &str) -> Result<bool> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }
    }

    struct BrokenNotifier;

    #[async_trait]
    impl ChannelNotifier for BrokenNotifier {
        async fn notify(&self, _subject: &str, _text: &str) -> Result<bool> {
            Err(Error::Internal("channel closed".to_string()))
        }
    }

    fn state_with_question() -> ConversationState {
        let mut state = ConversationState::new("u");
        state.push_user("what's on in town this weekend?");
        state
    }

    #[tokio::test]
    async fn test_notifies_then_replies_and_charges() {
        let notifier = Arc::new(CountingNotifier::default());
        let worker = ResearchWorker::new(
            "research",
            "Find current listings.",
            Arc::new(FixedSearch("Three concerts this weekend.")),
            notifier.clone(),
        );

        let state = worker.respond(state_with_question()).await.unwrap();
        assert_eq!(notifier.0.load(Ordering::SeqCst), 1);
        assert_eq!(state.cost.units(CostCategory::WebResearch), 1);
        assert_eq!(
            state.last_assistant_message().unwrap().content,
            "Three concerts this weekend."
        );
    }

    #[tokio::test]
    async fn test_two_searches_charge_two_units() {
        let worker = ResearchWorker::new(
            "research",
            "",
            Arc::new(FixedSearch("found it")),
            Arc::new(CountingNotifier::default()),
        );

        let state = worker.respond(state_with_question()).await.unwrap();
        let state = worker.respond(state).await.unwrap();
        assert_eq!(state.cost.units(CostCategory::WebResearch), 2);
    }

    #[tokio::test]
    async fn test_broken_notifier_does_not_block_reply() {
        let worker = ResearchWorker::new(
            "research",
            "",
            Arc::new(FixedSearch("still answered")),
            Arc::new(BrokenNotifier),
        );

        let state = worker.respond(state_with_question()).await.unwrap();
        assert_eq!(
            state.last_assistant_message().unwrap().content,
            "still answered"
        );
    }

    #[tokio::test]
    async fn test_failed_search_substitutes_apology() {
        let worker = ResearchWorker::new(
            "research",
            "",
            Arc::new(FailingSearch),
            Arc::new(CountingNotifier::default()),
        );

        let state = worker.respond(state_with_question()).await.unwrap();
        assert!(state.ends_with_assistant());
        assert!(state
            .last_assistant_message()
            .unwrap()
            .content
            .starts_with("Sorry"));
    }
}
