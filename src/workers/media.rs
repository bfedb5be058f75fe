//! Media interpretation worker.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::clients::MediaInterpreter;
use crate::error::{Error, Result};
use crate::ledger::CostCategory;
use crate::responder::Responder;
use crate::state::ConversationState;

use super::apology_in;

/// Answers questions about an attached image or document.
///
/// Looks backwards through the history for the most recent media URL and
/// hands it to the interpretation collaborator. Charges one
/// `MediaInterpretation` unit per interpreted attachment. When no media is
/// present it still replies, asking the subject to resend the attachment —
/// a responder never fails for routing reasons.
pub struct MediaWorker {
    name: String,
    instructions: String,
    media: Arc<dyn MediaInterpreter>,
}

impl MediaWorker {
    pub fn new(
        name: impl Into<String>,
        instructions: impl Into<String>,
        media: Arc<dyn MediaInterpreter>,
    ) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            media,
        }
    }

    fn no_media_reply(language: &str) -> &'static str {
        match language.to_lowercase().as_str() {
            "spanish" | "español" | "espanol" => {
                "No encontré ninguna imagen en la conversación. ¿Puedes enviarla de nuevo?"
            }
            "portuguese" | "português" | "portugues" => {
                "Não encontrei nenhuma imagem na conversa. Pode enviá-la novamente?"
            }
            _ => "I couldn't find an image in our conversation. Could you send it again?",
        }
    }
}

#[async_trait]
impl Responder for MediaWorker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn respond(&self, mut state: ConversationState) -> Result<ConversationState> {
        let Some(url) = state.latest_media_url() else {
            state.push_assistant(Self::no_media_reply(&state.language));
            return Ok(state);
        };

        state.cost.charge(CostCategory::MediaInterpretation);

        match self
            .media
            .interpret(&url, &self.instructions, &state.language)
            .await
        {
            Ok(reply) => state.push_assistant(reply),
            Err(Error::GenerationUnavailable(message)) => {
                return Err(Error::GenerationUnavailable(message));
            }
            Err(err) => {
                warn!(worker = %self.name, %url, %err, "media interpretation failed");
                state.push_assistant(apology_in(&state.language));
            }
        }

        Ok(state)
    }
}
