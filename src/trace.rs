//! Routing trace: the observable path a cycle took through the graph.
//!
//! Purely observational. Supervisors and graphs append hops; the session
//! controller logs the path and exports it with the cycle report. Nothing
//! in the routing loop reads the trace back to make decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened at one point in the routing traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteHopKind {
    /// A supervisor delegated to a worker
    Delegated,
    /// A supervisor signalled completion
    Finished,
    /// A domain graph hit its iteration cap
    Exhausted,
    /// The controller produced the supervisor-bypassing fallback reply
    Fallback,
}

/// One hop in the routing path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteHop {
    /// Domain whose supervisor made the decision
    pub domain: String,
    /// Chosen worker, when one was chosen
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// What kind of hop this was
    pub kind: RouteHopKind,
    /// When the hop happened
    pub at: DateTime<Utc>,
}

/// The full routing path taken by one cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteTrace {
    hops: Vec<RouteHop>,
}

impl RouteTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a delegation to a worker.
    pub fn delegated(&mut self, domain: impl Into<String>, target: impl Into<String>) {
        self.push(domain, Some(target.into()), RouteHopKind::Delegated);
    }

    /// Record a supervisor signalling completion.
    pub fn finished(&mut self, domain: impl Into<String>) {
        self.push(domain, None, RouteHopKind::Finished);
    }

    /// Record an iteration-cap overrun.
    pub fn exhausted(&mut self, domain: impl Into<String>) {
        self.push(domain, None, RouteHopKind::Exhausted);
    }

    /// Record the controller's fallback reply.
    pub fn fallback(&mut self, domain: impl Into<String>) {
        self.push(domain, None, RouteHopKind::Fallback);
    }

    fn push(&mut self, domain: impl Into<String>, target: Option<String>, kind: RouteHopKind) {
        self.hops.push(RouteHop {
            domain: domain.into(),
            target,
            kind,
            at: Utc::now(),
        });
    }

    /// All hops in order.
    pub fn hops(&self) -> &[RouteHop] {
        &self.hops
    }

    /// True if any graph on the path hit its iteration cap.
    pub fn was_exhausted(&self) -> bool {
        self.hops.iter().any(|h| h.kind == RouteHopKind::Exhausted)
    }

    /// Worker names delegated to, in order.
    pub fn targets(&self) -> Vec<&str> {
        self.hops
            .iter()
            .filter_map(|h| h.target.as_deref())
            .collect()
    }

    /// Compact rendering of the path for logs, e.g. `root>food food>recipes`.
    pub fn path(&self) -> String {
        self.hops
            .iter()
            .map(|h| match (&h.target, h.kind) {
                (Some(target), _) => format!("{}>{}", h.domain, target),
                (None, RouteHopKind::Exhausted) => format!("{}!exhausted", h.domain),
                (None, RouteHopKind::Fallback) => format!("{}!fallback", h.domain),
                (None, _) => format!("{}.", h.domain),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}
