//! # parley-core
//!
//! A hierarchical supervisor/worker dialogue-routing core for multi-domain
//! chat assistants over messaging channels.
//!
//! ## Core Components
//!
//! - **Responder**: The uniform state-in/state-out conversation contract
//! - **Supervisor**: Closed-set routing decisions over a worker enumeration
//! - **DomainGraph**: Bounded supervisor→worker loop, nestable as a worker
//! - **SessionController**: Per-message cycle with the finalization guarantee
//! - **CostLedger**: Metered-work side channel for billing settlement
//!
//! ## Example
//!
//! ```rust,ignore
//! use parley_core::{build_assistant, InboundMessage, SessionController};
//! use std::sync::Arc;
//!
//! let root = Arc::new(build_assistant(&collaborators)?);
//! let controller = SessionController::new(root, &collaborators);
//!
//! let report = controller
//!     .run_cycle(InboundMessage::new("+15550001111", "dinner ideas?"))
//!     .await?;
//! println!("{} via {}", report.reply_text, report.route_path);
//! ```

pub mod catalog;
pub mod clients;
pub mod error;
pub mod graph;
pub mod history;
pub mod ledger;
pub mod responder;
pub mod session;
pub mod state;
pub mod supervisor;
pub mod trace;
pub mod workers;
pub mod workerset;

// Re-exports for convenience
pub use catalog::{build_assistant, build_assistant_with, default_domains, DomainSpec, WorkerDef, WorkerKind};
pub use clients::{
    ChannelNotifier, ClientConfig, Collaborators, GenerationClient, GenerationRequest,
    HttpGenerationClient, LanguageClient, MediaInterpreter, SearchClient, SearchRequest,
    TicketClient,
};
pub use error::{Error, Result};
pub use graph::{DomainGraph, DEFAULT_MAX_ITERATIONS};
pub use history::{HistoryStore, InMemoryHistoryStore, SqliteHistoryStore};
pub use ledger::{CostCategory, CostLedger};
pub use responder::Responder;
pub use session::{
    CycleReport, CycleWarning, InboundMessage, SessionConfig, SessionController,
};
pub use state::{ConversationState, EntitlementSnapshot, Message, Role, ROUTE_TERMINATE};
pub use supervisor::{RouteDecision, Supervisor, FINISH};
pub use trace::{RouteHop, RouteHopKind, RouteTrace};
pub use workers::{
    ConversationWorker, MediaWorker, ResearchWorker, SupportWorker, TranslationWorker,
};
pub use workerset::{WorkerEntry, WorkerSet, WorkerSetBuilder};
