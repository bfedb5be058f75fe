//! Translation worker.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::clients::{GenerationClient, GenerationRequest, LanguageClient};
use crate::error::{Error, Result};
use crate::ledger::CostCategory;
use crate::responder::Responder;
use crate::state::{ConversationState, Message};

use super::apology_in;

const EXTRACTION_INSTRUCTIONS: &str = "The user wants something translated. From their \
message, extract the target language and the text to translate. Reply with the target \
language, then '||', then the text. Example: french||where is the station";

/// Translates text on the subject's behalf.
///
/// A small generation call extracts the target language and source text
/// from the request, then the translation collaborator does the work.
/// Charges one `Translation` unit per translated text.
pub struct TranslationWorker {
    name: String,
    generation: Arc<dyn GenerationClient>,
    language: Arc<dyn LanguageClient>,
}

impl TranslationWorker {
    pub fn new(
        name: impl Into<String>,
        generation: Arc<dyn GenerationClient>,
        language: Arc<dyn LanguageClient>,
    ) -> Self {
        Self {
            name: name.into(),
            generation,
            language,
        }
    }

    async fn extract_task(&self, state: &ConversationState) -> (String, String) {
        let latest = state
            .last_user_message()
            .map(|m| m.content.clone())
            .unwrap_or_default();

        let request = GenerationRequest::new()
            .with_instructions(EXTRACTION_INSTRUCTIONS)
            .with_history(vec![Message::user(latest.clone())])
            .with_temperature(0.0);

        match self.generation.generate(request).await {
            Ok(raw) => match raw.split_once("||") {
                Some((target, text)) => (target.trim().to_string(), text.trim().to_string()),
                None => (state.language.clone(), latest),
            },
            Err(err) => {
                warn!(worker = %self.name, %err, "extraction failed, translating verbatim");
                (state.language.clone(), latest)
            }
        }
    }
}

#[async_trait]
impl Responder for TranslationWorker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn respond(&self, mut state: ConversationState) -> Result<ConversationState> {
        let (target, text) = self.extract_task(&state).await;

        state.cost.charge(CostCategory::Translation);

        match self.language.translate(&text, &target).await {
            Ok(translated) => state.push_assistant(translated),
            Err(Error::GenerationUnavailable(message)) => {
                return Err(Error::GenerationUnavailable(message));
            }
            Err(err) => {
                warn!(worker = %self.name, %err, "translation failed");
                state.push_assistant(apology_in(&state.language));
            }
        }

        Ok(state)
    }
}
