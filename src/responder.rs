//! The responder contract shared by leaf workers and whole domain graphs.

use async_trait::async_trait;

use crate::error::Result;
use crate::state::ConversationState;

/// A unit of work that, given conversation state, produces exactly one reply
/// and terminates.
///
/// Leaf workers and whole `DomainGraph`s both implement this, which is what
/// lets a root supervisor treat "the events domain" as a single opaque
/// worker. Implementations must be stateless and reentrant: the only fields
/// a responder may touch are the message list (append) and its own cost
/// category on the ledger.
///
/// Responders never fail for routing reasons. A failed paid-work call is
/// recovered locally with a best-effort apology reply; only a backend that
/// is genuinely down (`GenerationUnavailable`) propagates.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Routing identity of this responder within its worker set.
    fn name(&self) -> &str;

    /// Process the state, appending the reply (or, for a graph, the
    /// accumulated effect of its internal loop).
    async fn respond(&self, state: ConversationState) -> Result<ConversationState>;
}
