//! Leaf responders, one per collaborator concern.
//!
//! Each worker wraps exactly one paid collaborator, charges its own ledger
//! category before invoking it, and recovers a failed call with a localized
//! apology so the finalization guarantee holds trivially. Only a backend
//! that is down propagates.

mod conversation;
mod media;
mod research;
mod support;
mod translation;

pub use conversation::ConversationWorker;
pub use media::MediaWorker;
pub use research::ResearchWorker;
pub use support::SupportWorker;
pub use translation::TranslationWorker;

/// Best-effort apology reply in the subject's language. Static text: internal
/// errors are never surfaced raw to the end user.
pub fn apology_in(language: &str) -> &'static str {
    match language.to_lowercase().as_str() {
        "spanish" | "español" | "espanol" => {
            "Lo siento, tuve un problema al preparar la respuesta. \
             ¿Podrías intentarlo de nuevo en un momento?"
        }
        "portuguese" | "português" | "portugues" => {
            "Desculpe, tive um problema ao preparar a resposta. \
             Pode tentar novamente em instantes?"
        }
        _ => {
            "Sorry, I ran into a problem while putting your answer together. \
             Could you try again in a moment?"
        }
    }
}

/// Out-of-band "working on it" text for slow workers.
pub fn wait_notice_in(language: &str) -> &'static str {
    match language.to_lowercase().as_str() {
        "spanish" | "español" | "espanol" => "Un momento, estoy buscando eso para ti…",
        "portuguese" | "português" | "portugues" => "Um momento, estou pesquisando isso para você…",
        _ => "One moment, I'm looking that up for you…",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apology_localization() {
        assert!(apology_in("spanish").starts_with("Lo siento"));
        assert!(apology_in("Portuguese").starts_with("Desculpe"));
        assert!(apology_in("english").starts_with("Sorry"));
        // Unknown languages fall back to english
        assert!(apology_in("klingon").starts_with("Sorry"));
    }
}
