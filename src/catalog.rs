//! Static domain wiring for the assistant.
//!
//! Domains, their workers, and their routing guidance are configuration
//! data, not code: the guidance strings are policy text consumed by the
//! classification collaborator and meant to be tuned without redeploys.
//! Building the catalog validates every worker set, so a mis-wired
//! deployment fails at process startup, never at request time.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clients::Collaborators;
use crate::error::Result;
use crate::graph::DomainGraph;
use crate::responder::Responder;
use crate::supervisor::Supervisor;
use crate::workers::{
    ConversationWorker, MediaWorker, ResearchWorker, SupportWorker, TranslationWorker,
};
use crate::workerset::WorkerSet;

const ROOT_GUIDANCE: &str = "Pick the topic domain that best matches what the user \
needs right now. A conversation can move between domains turn by turn. Use support \
only when the user reports a problem with the assistant itself or wants to leave \
feedback, translation only when the user explicitly asks for a translation, and \
anything_else when no domain fits.";

const GENERAL_INSTRUCTIONS: &str = "You are a helpful general-purpose assistant. \
Answer the user's latest message as well as you can. If the request is outside \
your abilities, say so briefly and suggest what you can help with instead.";

/// Kind of leaf worker a domain registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerKind {
    /// Plain generation over the history
    Conversation,
    /// Search-augmented generation
    Research,
    /// Image/document interpretation
    Media,
}

/// One worker in a domain's closed set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerDef {
    /// Routing identity within the domain
    pub name: String,
    /// Capability description shown to the domain supervisor
    pub description: String,
    /// Which implementation backs it
    pub kind: WorkerKind,
    /// Prompt instructions for the backing collaborator
    pub instructions: String,
}

impl WorkerDef {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        kind: WorkerKind,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
            instructions: instructions.into(),
        }
    }
}

/// One topic domain: supervisor guidance plus its worker set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainSpec {
    /// Routing identity within the root set
    pub name: String,
    /// Capability description shown to the root supervisor
    pub description: String,
    /// Routing guidance for the domain supervisor (policy text, tunable)
    pub guidance: String,
    /// Nominated fallback worker for malformed classifications
    pub fallback: String,
    /// The domain's closed worker set
    pub workers: Vec<WorkerDef>,
}

fn build_worker(def: &WorkerDef, collaborators: &Collaborators) -> Arc<dyn Responder> {
    match def.kind {
        WorkerKind::Conversation => Arc::new(ConversationWorker::new(
            &def.name,
            &def.instructions,
            collaborators.generation.clone(),
        )),
        WorkerKind::Research => Arc::new(ResearchWorker::new(
            &def.name,
            &def.instructions,
            collaborators.search.clone(),
            collaborators.notifier.clone(),
        )),
        WorkerKind::Media => Arc::new(MediaWorker::new(
            &def.name,
            &def.instructions,
            collaborators.media.clone(),
        )),
    }
}

/// Build one domain graph from its spec.
pub fn build_domain(spec: &DomainSpec, collaborators: &Collaborators) -> Result<DomainGraph> {
    let mut builder = WorkerSet::builder();
    for def in &spec.workers {
        builder = builder.worker(def.description.clone(), build_worker(def, collaborators));
    }
    let workers = builder.fallback(&spec.fallback).build(&spec.name)?;

    let supervisor = Supervisor::new(&spec.name, &spec.guidance, collaborators.generation.clone());
    Ok(DomainGraph::new(&spec.name, supervisor, workers))
}

/// Build the root graph over the given domains plus the global responders
/// (support, translation, unknown intent).
pub fn build_assistant_with(
    domains: &[DomainSpec],
    collaborators: &Collaborators,
) -> Result<DomainGraph> {
    let mut builder = WorkerSet::builder();
    for spec in domains {
        let graph = build_domain(spec, collaborators)?;
        builder = builder.worker(spec.description.clone(), Arc::new(graph));
    }

    let workers = builder
        .worker(
            "problems with the assistant itself, complaints, feature requests, feedback",
            Arc::new(SupportWorker::new(
                "support",
                "feedback",
                collaborators.tickets.clone(),
            )),
        )
        .worker(
            "explicit requests to translate a phrase or text into another language",
            Arc::new(TranslationWorker::new(
                "translation",
                collaborators.generation.clone(),
                collaborators.language.clone(),
            )),
        )
        .fallback_worker(
            "greetings, small talk, and anything no domain covers",
            Arc::new(ConversationWorker::new(
                "anything_else",
                GENERAL_INSTRUCTIONS,
                collaborators.generation.clone(),
            )),
        )
        .build("root")?;

    let supervisor = Supervisor::new("root", ROOT_GUIDANCE, collaborators.generation.clone());
    Ok(DomainGraph::new("root", supervisor, workers))
}

/// Build the root graph with the stock domain catalog.
pub fn build_assistant(collaborators: &Collaborators) -> Result<DomainGraph> {
    build_assistant_with(&default_domains(), collaborators)
}

fn conversation(description: &str, instructions: &str) -> WorkerDef {
    WorkerDef::new("conversation", description, WorkerKind::Conversation, instructions)
}

fn research(description: &str, instructions: &str) -> WorkerDef {
    WorkerDef::new("research", description, WorkerKind::Research, instructions)
}

fn photo(description: &str, instructions: &str) -> WorkerDef {
    WorkerDef::new("photo", description, WorkerKind::Media, instructions)
}

/// The stock domain catalog.
pub fn default_domains() -> Vec<DomainSpec> {
    let media_policy = "When the latest user message carries an image attachment, \
prefer the photo worker; otherwise use the conversation worker.";
    let research_policy = "Use the research worker when the answer depends on \
current real-world data; otherwise use the conversation worker.";

    vec![
        DomainSpec {
            name: "food".to_string(),
            description: "cooking, recipes, ingredients, nutrition, restaurants".to_string(),
            guidance: media_policy.to_string(),
            fallback: "conversation".to_string(),
            workers: vec![
                conversation(
                    "recipe ideas, cooking technique, nutrition questions",
                    "You are a cooking and nutrition expert. Give practical, concrete \
                     answers with ingredient amounts and steps when relevant.",
                ),
                photo(
                    "questions about a photographed dish, fridge, or ingredient",
                    "Identify the food in the image and answer the user's question \
                     about it: what it is, how to cook with it, or what's wrong with it.",
                ),
            ],
        },
        DomainSpec {
            name: "travel".to_string(),
            description: "trips, destinations, itineraries, flights, hotels".to_string(),
            guidance: research_policy.to_string(),
            fallback: "conversation".to_string(),
            workers: vec![
                conversation(
                    "destination advice, itinerary planning, packing tips",
                    "You are a travel planner. Suggest destinations and itineraries \
                     matched to the user's dates, budget, and interests.",
                ),
                research(
                    "current prices, schedules, visa rules, weather",
                    "Research up-to-date travel information and summarize it with \
                     sources the user can check.",
                ),
            ],
        },
        DomainSpec {
            name: "stocks".to_string(),
            description: "stock markets, investing, company financials".to_string(),
            guidance: research_policy.to_string(),
            fallback: "conversation".to_string(),
            workers: vec![
                conversation(
                    "investing concepts, strategy discussion, terminology",
                    "You explain markets and investing concepts clearly. You never \
                     give personalized financial advice; say so when asked for it.",
                ),
                research(
                    "current quotes, recent company news, market moves",
                    "Research current market data and recent news, and present it \
                     neutrally with timestamps.",
                ),
            ],
        },
        DomainSpec {
            name: "events".to_string(),
            description: "concerts, shows, local happenings, things to do".to_string(),
            guidance: research_policy.to_string(),
            fallback: "conversation".to_string(),
            workers: vec![
                conversation(
                    "general questions about kinds of events and planning outings",
                    "You help plan outings and suggest kinds of events matched to the \
                     user's tastes.",
                ),
                research(
                    "what's on at a specific place and time",
                    "Find current event listings for the user's location and dates, \
                     with venues and times.",
                ),
            ],
        },
        DomainSpec {
            name: "handyman".to_string(),
            description: "home repairs, DIY, tools, plumbing, electrics".to_string(),
            guidance: media_policy.to_string(),
            fallback: "conversation".to_string(),
            workers: vec![
                conversation(
                    "repair walkthroughs, tool choice, DIY planning",
                    "You are an experienced handyman. Give step-by-step repair \
                     guidance and always flag when a job needs a licensed professional.",
                ),
                photo(
                    "diagnosing a photographed fault or damaged fixture",
                    "Look at the image, identify the fixture and the visible problem, \
                     and explain how to fix it or who to call.",
                ),
            ],
        },
        DomainSpec {
            name: "fitness".to_string(),
            description: "workouts, training plans, exercise form".to_string(),
            guidance: media_policy.to_string(),
            fallback: "conversation".to_string(),
            workers: vec![
                conversation(
                    "training plans, exercise selection, recovery questions",
                    "You are a fitness coach. Build simple, progressive plans and \
                     remind users to consult a doctor for medical concerns.",
                ),
                photo(
                    "form checks and equipment questions from a photo",
                    "Review the exercise or equipment shown and give specific, safe \
                     corrections.",
                ),
            ],
        },
        DomainSpec {
            name: "beauty".to_string(),
            description: "skincare, haircare, cosmetics, grooming".to_string(),
            guidance: media_policy.to_string(),
            fallback: "conversation".to_string(),
            workers: vec![
                conversation(
                    "routines, product categories, grooming advice",
                    "You are a beauty consultant. Recommend routines and product \
                     types, not specific brands unless asked.",
                ),
                photo(
                    "advice based on a photo of skin, hair, or a product",
                    "Describe what the image shows and give gentle, practical \
                     suggestions; recommend a dermatologist for medical-looking issues.",
                ),
            ],
        },
        DomainSpec {
            name: "tech".to_string(),
            description: "phones, computers, apps, gadgets, troubleshooting".to_string(),
            guidance: research_policy.to_string(),
            fallback: "conversation".to_string(),
            workers: vec![
                conversation(
                    "troubleshooting steps, how-tos, buying advice",
                    "You are a patient tech support agent. Give numbered steps and \
                     ask one clarifying question when the problem is ambiguous.",
                ),
                research(
                    "current product specs, prices, release information",
                    "Research current device and software information and compare \
                     options concisely.",
                ),
            ],
        },
        DomainSpec {
            name: "careers".to_string(),
            description: "job hunting, CVs, interviews, workplace advice".to_string(),
            guidance: "Route every message to the conversation worker unless the \
                       supervisor has a strong reason not to."
                .to_string(),
            fallback: "conversation".to_string(),
            workers: vec![conversation(
                "CV feedback, interview preparation, career moves",
                "You are a career coach. Give direct, actionable feedback and \
                 concrete examples.",
            )],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{
        ChannelNotifier, GenerationClient, GenerationRequest, LanguageClient, MediaInterpreter,
        SearchClient, SearchRequest, TicketClient,
    };
    use crate::error::Error;
    use crate::history::InMemoryHistoryStore;
    use crate::ledger::CostCategory;
    use crate::session::{InboundMessage, SessionController};
    use crate::state::Message;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    /// Pops scripted classification answers in order; free generation
    /// returns a fixed reply.
    struct Scripted {
        answers: Mutex<Vec<String>>,
        reply: &'static str,
    }

    impl Scripted {
        fn new(answers: &[&str], reply: &'static str) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers.iter().rev().map(|s| s.to_string()).collect()),
                reply,
            })
        }
    }

    #[async_trait]
    impl GenerationClient for Scripted {
        async fn generate(&self, _request: GenerationRequest) -> Result<String> {
            Ok(self.reply.to_string())
        }

        async fn classify(
            &self,
            _request: GenerationRequest,
            _choices: &[String],
        ) -> Result<String> {
            Ok(self
                .answers
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| "FINISH".to_string()))
        }
    }

    struct StubSearch;

    #[async_trait]
    impl SearchClient for StubSearch {
        async fn search(&self, _request: SearchRequest) -> Result<String> {
            Ok("search result".to_string())
        }
    }

    struct StubMedia;

    #[async_trait]
    impl MediaInterpreter for StubMedia {
        async fn interpret(&self, url: &str, _i: &str, _l: &str) -> Result<String> {
            Ok(format!("the image at {url} shows a leaking trap"))
        }
    }

    struct StubNotifier;

    #[async_trait]
    impl ChannelNotifier for StubNotifier {
        async fn notify(&self, _s: &str, _t: &str) -> Result<bool> {
            Ok(true)
        }
    }

    struct StubTickets;

    #[async_trait]
    impl TicketClient for StubTickets {
        async fn create_ticket(
            &self,
            _c: &str,
            _b: &str,
            _e: Option<&str>,
        ) -> Result<Option<String>> {
            Ok(Some("TCK-1".to_string()))
        }
    }

    struct EnglishOnly;

    #[async_trait]
    impl LanguageClient for EnglishOnly {
        async fn detect(&self, _messages: &[Message]) -> Result<String> {
            Ok("english".to_string())
        }

        async fn translate(&self, text: &str, _language: &str) -> Result<String> {
            Ok(text.to_string())
        }
    }

    fn collaborators(generation: Arc<dyn GenerationClient>) -> Collaborators {
        Collaborators {
            generation,
            search: Arc::new(StubSearch),
            media: Arc::new(StubMedia),
            notifier: Arc::new(StubNotifier),
            tickets: Arc::new(StubTickets),
            language: Arc::new(EnglishOnly),
            history: Arc::new(InMemoryHistoryStore::new()),
        }
    }

    #[test]
    fn test_stock_catalog_builds() {
        let collab = collaborators(Scripted::new(&[], "unused"));
        let root = build_assistant(&collab).unwrap();

        // 9 domains + support + translation + anything_else
        assert_eq!(root.workers().len(), 12);
        assert_eq!(
            root.workers().get(root.workers().fallback_index()).name(),
            "anything_else"
        );
    }

    #[test]
    fn test_unknown_fallback_nomination_fails_at_startup() {
        let mut domains = default_domains();
        domains[0].fallback = "no_such_worker".to_string();

        let collab = collaborators(Scripted::new(&[], "unused"));
        let err = build_assistant_with(&domains, &collab).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[tokio::test]
    async fn test_scenario_recipe_question_routes_to_food_conversation() {
        // Root picks food, food picks its conversation worker, both finish.
        let generation = Scripted::new(
            &["food", "conversation", "FINISH", "FINISH"],
            "Try a simple arroz con pollo.",
        );
        let collab = collaborators(generation);
        let root = Arc::new(build_assistant(&collab).unwrap());
        let controller = SessionController::new(root, &collab);

        let report = controller
            .run_cycle(InboundMessage::new(
                "+15550001111",
                "What's a good recipe with chicken and rice?",
            ))
            .await
            .unwrap();

        assert_eq!(report.reply_text, "Try a simple arroz con pollo.");
        assert!(report.cost.is_empty());
        assert_eq!(report.warning, None);
        assert_eq!(report.route_path, "root>food food>conversation food. root.");

        let history = collab.history.load("+15550001111").unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_scenario_media_question_routes_to_handyman_photo() {
        let generation = Scripted::new(&["handyman", "photo", "FINISH", "FINISH"], "unused");
        let collab = collaborators(generation);
        let root = Arc::new(build_assistant(&collab).unwrap());
        let controller = SessionController::new(root, &collab);

        let report = controller
            .run_cycle(
                InboundMessage::new("+15550001111", "what's wrong with this?")
                    .with_media_url("https://cdn.example.com/sink.jpg"),
            )
            .await
            .unwrap();

        assert_eq!(
            report.reply_text,
            "the image at https://cdn.example.com/sink.jpg shows a leaking trap"
        );
        assert_eq!(report.cost.units(CostCategory::MediaInterpretation), 1);
        assert!(report.route_path.contains("handyman>photo"));
    }

    #[tokio::test]
    async fn test_scenario_bogus_classification_finalizes_via_domain_fallback() {
        // The handyman supervisor answers outside its closed set; the cycle
        // must still finalize with exactly one assistant reply, produced by
        // the domain's nominated fallback worker.
        let generation = Scripted::new(
            &["handyman", "bogus_worker", "FINISH", "FINISH"],
            "A licensed plumber is your best bet here.",
        );
        let collab = collaborators(generation);
        let root = Arc::new(build_assistant(&collab).unwrap());
        let controller = SessionController::new(root, &collab);

        let report = controller
            .run_cycle(InboundMessage::new("+15550001111", "pipe burst, help"))
            .await
            .unwrap();

        assert_eq!(report.reply_text, "A licensed plumber is your best bet here.");
        assert!(report.route_path.contains("handyman>conversation"));

        let history = collab.history.load("+15550001111").unwrap();
        let replies = history
            .iter()
            .filter(|m| m.role == crate::state::Role::Assistant)
            .count();
        assert_eq!(replies, 1);
    }

    #[tokio::test]
    async fn test_double_research_charges_two_units() {
        // The events supervisor sends two research passes before finishing.
        let generation = Scripted::new(
            &["events", "research", "research", "FINISH", "FINISH"],
            "unused",
        );
        let collab = collaborators(generation);
        let root = Arc::new(build_assistant(&collab).unwrap());
        let controller = SessionController::new(root, &collab);

        let report = controller
            .run_cycle(InboundMessage::new("+15550001111", "what's on this weekend?"))
            .await
            .unwrap();

        assert_eq!(report.cost.units(CostCategory::WebResearch), 2);
    }

    #[test]
    fn test_domain_specs_serialize_as_config() {
        let domains = default_domains();
        let json = serde_json::to_string(&domains).unwrap();
        let parsed: Vec<DomainSpec> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), domains.len());
        assert_eq!(parsed[0].name, "food");
    }
}
