//! Collaborator capability traits consumed by supervisors and workers.
//!
//! Every external dependency of the routing core (generation, search, media
//! interpretation, channel notification, ticketing, language services,
//! persistence) is an injected trait object rather than a module-level
//! singleton, so each can be replaced by a test double.

mod http;

pub use http::{ClientConfig, HttpGenerationClient};

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::history::HistoryStore;
use crate::state::Message;

/// A prompt for the text-generation collaborator.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    /// System-level instructions
    pub instructions: Option<String>,
    /// Conversation history to condition on
    pub history: Vec<Message>,
    /// Natural language the reply must be written in
    pub language: String,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    pub temperature: Option<f64>,
}

impl GenerationRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 1.0));
        self
    }

    /// Constrain the request to a closed answer set by folding the choices
    /// into the instructions. The caller still validates the raw reply.
    pub fn constrained_to(mut self, choices: &[String]) -> Self {
        let menu = format!(
            "Answer with exactly one of the following values and nothing else: {}.",
            choices.join(", ")
        );
        self.instructions = Some(match self.instructions.take() {
            Some(existing) => format!("{existing}\n\n{menu}"),
            None => menu,
        });
        self
    }
}

/// Text generation collaborator.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Produce free-form text for the request.
    async fn generate(&self, request: GenerationRequest) -> Result<String>;

    /// Produce a value expected to come from a closed set. Backends with
    /// native constrained decoding can override this; the default folds the
    /// choices into the prompt, and the supervisor validates the answer.
    async fn classify(&self, request: GenerationRequest, choices: &[String]) -> Result<String> {
        self.generate(request.constrained_to(choices)).await
    }
}

/// Search-augmented generation request.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    /// System-level instructions for the search synthesis
    pub instructions: String,
    /// Conversation history providing the query context
    pub history: Vec<Message>,
    /// Optional backend model hint
    pub model_hint: Option<String>,
    /// Language for the synthesized answer
    pub language: String,
}

/// Web search collaborator.
#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(&self, request: SearchRequest) -> Result<String>;
}

/// Media interpretation collaborator (images, PDFs).
#[async_trait]
pub trait MediaInterpreter: Send + Sync {
    async fn interpret(&self, url: &str, instructions: &str, language: &str) -> Result<String>;
}

/// Out-of-band channel notification ("working on it" messages).
#[async_trait]
pub trait ChannelNotifier: Send + Sync {
    async fn notify(&self, subject_identity: &str, text: &str) -> Result<bool>;
}

/// Support/feedback ticketing collaborator.
#[async_trait]
pub trait TicketClient: Send + Sync {
    /// Returns the ticket id, or None if the ticketing backend declined.
    async fn create_ticket(
        &self,
        category: &str,
        body: &str,
        subject_email: Option<&str>,
    ) -> Result<Option<String>>;
}

/// Language detection and translation collaborator.
#[async_trait]
pub trait LanguageClient: Send + Sync {
    /// Detect the natural language of a conversation.
    async fn detect(&self, messages: &[Message]) -> Result<String>;

    /// Translate text into the target language.
    async fn translate(&self, text: &str, language: &str) -> Result<String>;
}

/// Bundle of collaborator handles shared by the whole assistant.
///
/// Process-wide lifetime, no hidden globals; cloned cheaply into each
/// worker at wiring time.
#[derive(Clone)]
pub struct Collaborators {
    pub generation: Arc<dyn GenerationClient>,
    pub search: Arc<dyn SearchClient>,
    pub media: Arc<dyn MediaInterpreter>,
    pub notifier: Arc<dyn ChannelNotifier>,
    pub tickets: Arc<dyn TicketClient>,
    pub language: Arc<dyn LanguageClient>,
    pub history: Arc<dyn HistoryStore>,
}
