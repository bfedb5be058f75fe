//! Domain graph: one supervisor and its worker set wrapped into a closed
//! routing loop, exposed to the outer system as a single responder.
//!
//! This is the recursion point for hierarchical delegation: the root
//! supervisor routes to a whole domain without knowing its internals,
//! because the domain graph satisfies the same `Responder` contract as a
//! leaf worker.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::Result;
use crate::responder::Responder;
use crate::state::ConversationState;
use crate::supervisor::{RouteDecision, Supervisor};
use crate::workerset::WorkerSet;

/// Iteration cap guaranteeing termination even under misconfiguration.
/// Most workers yield finish after one reply, so the common case is a
/// single iteration.
pub const DEFAULT_MAX_ITERATIONS: u32 = 6;

/// A self-contained routing loop over one domain's workers.
///
/// Stateless and reentrant: holds only static wiring, is recreated fresh
/// per process start, and is invoked per cycle with the cycle's state.
#[derive(Clone)]
pub struct DomainGraph {
    name: String,
    supervisor: Supervisor,
    workers: WorkerSet,
    max_iterations: u32,
}

// Manual impl: the supervisor holds an `Arc<dyn GenerationClient>`, which
// has no Debug.
impl std::fmt::Debug for DomainGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainGraph")
            .field("name", &self.name)
            .field("workers", &self.workers)
            .field("max_iterations", &self.max_iterations)
            .finish_non_exhaustive()
    }
}

impl DomainGraph {
    /// Wrap a supervisor and its worker set into a graph.
    pub fn new(name: impl Into<String>, supervisor: Supervisor, workers: WorkerSet) -> Self {
        Self {
            name: name.into(),
            supervisor,
            workers,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Override the iteration cap.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// The workers this graph routes across.
    pub fn workers(&self) -> &WorkerSet {
        &self.workers
    }
}

#[async_trait]
impl Responder for DomainGraph {
    fn name(&self) -> &str {
        &self.name
    }

    async fn respond(&self, mut state: ConversationState) -> Result<ConversationState> {
        for iteration in 0..self.max_iterations {
            match self.supervisor.decide(&state, &self.workers).await? {
                RouteDecision::Finish => {
                    state.note_terminate();
                    state.trace.finished(&self.name);
                    info!(domain = %self.name, iteration, "supervisor signalled finish");
                    return Ok(state);
                }
                RouteDecision::Worker(index) => {
                    let entry = self.workers.get(index);
                    state.note_route(entry.name());
                    state.trace.delegated(&self.name, entry.name());
                    info!(domain = %self.name, worker = %entry.name(), iteration, "delegating");
                    state = entry.responder().respond(state).await?;
                }
            }
        }

        // Cap hit: force finish with whatever reply is present. If none is,
        // the session controller's finalization pass produces one.
        warn!(
            domain = %self.name,
            max_iterations = self.max_iterations,
            "iteration cap hit, forcing finish"
        );
        state.note_terminate();
        state.trace.exhausted(&self.name);
        Ok(state)
    }
}
