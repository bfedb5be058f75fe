//! Closed worker enumerations with supervisor-facing capability descriptions.
//!
//! A worker set is static configuration, not runtime state: workers are
//! registered at wiring time and never added or removed while serving.
//! Mis-wiring is caught here, at construction, so a bad deployment fails at
//! startup rather than at request time.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::responder::Responder;

/// One registered worker: routing identity, capability description used in
/// the supervisor's decision prompt, and the implementation.
#[derive(Clone)]
pub struct WorkerEntry {
    name: String,
    description: String,
    responder: Arc<dyn Responder>,
}

impl WorkerEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn responder(&self) -> &Arc<dyn Responder> {
        &self.responder
    }
}

/// A named, closed enumeration of responders available to one supervisor.
#[derive(Clone)]
pub struct WorkerSet {
    entries: Vec<WorkerEntry>,
    fallback: usize,
}

// Manual impl: entries hold `Arc<dyn Responder>`, which has no Debug.
impl std::fmt::Debug for WorkerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerSet")
            .field("names", &self.names())
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

impl WorkerSet {
    /// Start building a worker set.
    pub fn builder() -> WorkerSetBuilder {
        WorkerSetBuilder::default()
    }

    /// Number of registered workers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at a validated index.
    pub fn get(&self, index: usize) -> &WorkerEntry {
        &self.entries[index]
    }

    /// Index of a worker by routing identity.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    /// Index of the nominated fallback worker. Always valid.
    pub fn fallback_index(&self) -> usize {
        self.fallback
    }

    /// Routing identities in registration order.
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    /// All entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &WorkerEntry> {
        self.entries.iter()
    }
}

/// Builder validating the closed set at construction.
#[derive(Default)]
pub struct WorkerSetBuilder {
    entries: Vec<WorkerEntry>,
    fallback_name: Option<String>,
}

impl WorkerSetBuilder {
    /// Register a worker. Its routing identity is `responder.name()`.
    pub fn worker(mut self, description: impl Into<String>, responder: Arc<dyn Responder>) -> Self {
        self.entries.push(WorkerEntry {
            name: responder.name().to_string(),
            description: description.into(),
            responder,
        });
        self
    }

    /// Register a worker and nominate it as the set's fallback.
    pub fn fallback_worker(
        self,
        description: impl Into<String>,
        responder: Arc<dyn Responder>,
    ) -> Self {
        let name = responder.name().to_string();
        self.worker(description, responder).fallback(name)
    }

    /// Nominate an already-registered worker as the fallback.
    pub fn fallback(mut self, name: impl Into<String>) -> Self {
        self.fallback_name = Some(name.into());
        self
    }

    /// Validate and build. Empty sets, duplicate identities, and unresolved
    /// fallback nominations are configuration errors.
    pub fn build(self, set_name: &str) -> Result<WorkerSet> {
        if self.entries.is_empty() {
            return Err(Error::config(format!("worker set '{set_name}' is empty")));
        }

        for (i, entry) in self.entries.iter().enumerate() {
            if self.entries[..i].iter().any(|e| e.name == entry.name) {
                return Err(Error::config(format!(
                    "worker set '{set_name}' registers '{}' twice",
                    entry.name
                )));
            }
        }

        let fallback_name = self.fallback_name.ok_or_else(|| {
            Error::config(format!("worker set '{set_name}' nominates no fallback worker"))
        })?;

        let fallback = self
            .entries
            .iter()
            .position(|e| e.name == fallback_name)
            .ok_or_else(|| {
                Error::config(format!(
                    "worker set '{set_name}' nominates unknown fallback '{fallback_name}'"
                ))
            })?;

        Ok(WorkerSet {
            entries: self.entries,
            fallback,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ConversationState;
    use async_trait::async_trait;

    struct Canned(&'static str);

    #[async_trait]
    impl Responder for Canned {
        fn name(&self) -> &str {
            self.0
        }

        async fn respond(&self, mut state: ConversationState) -> Result<ConversationState> {
            state.push_assistant("canned");
            Ok(state)
        }
    }

    #[test]
    fn test_build_with_fallback() {
        let set = WorkerSet::builder()
            .fallback_worker("general chat", Arc::new(Canned("conversation")))
            .worker("web lookups", Arc::new(Canned("research")))
            .build("travel")
            .unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set.fallback_index(), 0);
        assert_eq!(set.get(set.fallback_index()).name(), "conversation");
        assert_eq!(set.index_of("research"), Some(1));
        assert_eq!(set.index_of("bogus_worker"), None);
    }

    #[test]
    fn test_debug_rendering_lists_names() {
        let set = WorkerSet::builder()
            .fallback_worker("general chat", Arc::new(Canned("conversation")))
            .worker("web lookups", Arc::new(Canned("research")))
            .build("travel")
            .unwrap();

        let rendered = format!("{set:?}");
        assert!(rendered.contains("conversation"));
        assert!(rendered.contains("research"));
    }

    #[test]
    fn test_empty_set_is_config_error() {
        let err = WorkerSet::builder().build("empty").unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn test_duplicate_name_is_config_error() {
        let err = WorkerSet::builder()
            .fallback_worker("a", Arc::new(Canned("conversation")))
            .worker("b", Arc::new(Canned("conversation")))
            .build("dup")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn test_unknown_fallback_is_config_error() {
        let err = WorkerSet::builder()
            .worker("a", Arc::new(Canned("conversation")))
            .fallback("missing")
            .build("bad")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn test_missing_fallback_nomination_is_config_error() {
        let err = WorkerSet::builder()
            .worker("a", Arc::new(Canned("conversation")))
            .build("nofallback")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }
}
