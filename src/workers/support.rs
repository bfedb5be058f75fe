//! Support/feedback ticketing worker.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::clients::TicketClient;
use crate::error::{Error, Result};
use crate::ledger::CostCategory;
use crate::responder::Responder;
use crate::state::ConversationState;

use super::apology_in;

/// Files a support ticket from the subject's latest message.
///
/// Charges one `Ticketing` unit per filed ticket. The contact email, when
/// the channel transport knows it, rides on the message as an `email`
/// annotation.
pub struct SupportWorker {
    name: String,
    category: String,
    tickets: Arc<dyn TicketClient>,
}

impl SupportWorker {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        tickets: Arc<dyn TicketClient>,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            tickets,
        }
    }

    fn confirmation(language: &str, ticket_id: &str) -> String {
        match language.to_lowercase().as_str() {
            "spanish" | "español" | "espanol" => format!(
                "¡Gracias! Registré tu solicitud con el número {ticket_id}. \
                 Nuestro equipo te contactará pronto."
            ),
            "portuguese" | "português" | "portugues" => format!(
                "Obrigado! Registrei sua solicitação com o número {ticket_id}. \
                 Nossa equipe entrará em contato em breve."
            ),
            _ => format!(
                "Thanks! I've filed your request as ticket {ticket_id}. \
                 Our team will get back to you soon."
            ),
        }
    }
}

#[async_trait]
impl Responder for SupportWorker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn respond(&self, mut state: ConversationState) -> Result<ConversationState> {
        let body = state
            .last_user_message()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let email = state.last_user_message().and_then(|m| {
            match m.get_annotation("email") {
                Some(Value::String(email)) => Some(email.clone()),
                _ => None,
            }
        });

        state.cost.charge(CostCategory::Ticketing);

        match self
            .tickets
            .create_ticket(&self.category, &body, email.as_deref())
            .await
        {
            Ok(Some(ticket_id)) => {
                state.push_assistant(Self::confirmation(&state.language, &ticket_id));
            }
            Ok(None) => {
                warn!(worker = %self.name, "ticketing backend declined the ticket");
                state.push_assistant(apology_in(&state.language));
            }
            Err(err) => {
                warn!(worker = %self.name, %err, "ticket creation failed");
                state.push_assistant(apology_in(&state.language));
            }
        }

        Ok(state)
    }
}
