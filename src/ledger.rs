//! Cost ledger for metered collaborator work.
//!
//! Every responder that performs metered work charges exactly its own
//! category before invoking the collaborator. Counters only grow within a
//! cycle; billing settlement happens outside the core using the ledger
//! returned at cycle end.
//!
//! Plain conversational generation is bundled into the subscription and is
//! not metered; only the premium collaborators (web research, media
//! interpretation, translation, ticketing) charge the ledger.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metered cost category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostCategory {
    /// Search-augmented generation
    WebResearch,
    /// Image/document interpretation
    MediaInterpretation,
    /// Translation of an outbound reply
    Translation,
    /// Support/feedback ticket creation
    Ticketing,
}

impl std::fmt::Display for CostCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WebResearch => write!(f, "web_research"),
            Self::MediaInterpretation => write!(f, "media_interpretation"),
            Self::Translation => write!(f, "translation"),
            Self::Ticketing => write!(f, "ticketing"),
        }
    }
}

/// Monotonic per-category counters for one cycle.
///
/// Retrying a whole cycle double-charges by design; the billing caller
/// deduplicates using the cycle's idempotency key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostLedger {
    units: HashMap<CostCategory, u64>,
}

impl CostLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Charge one unit to a category.
    pub fn charge(&mut self, category: CostCategory) {
        self.charge_units(category, 1);
    }

    /// Charge a collaborator-reported unit count to a category.
    pub fn charge_units(&mut self, category: CostCategory, units: u64) {
        *self.units.entry(category).or_insert(0) += units;
    }

    /// Units consumed in a category this cycle.
    pub fn units(&self, category: CostCategory) -> u64 {
        self.units.get(&category).copied().unwrap_or(0)
    }

    /// Total units across all categories.
    pub fn total_units(&self) -> u64 {
        self.units.values().sum()
    }

    /// True if nothing was charged this cycle.
    pub fn is_empty(&self) -> bool {
        self.total_units() == 0
    }

    /// Per-category breakdown, for billing settlement.
    pub fn breakdown(&self) -> impl Iterator<Item = (CostCategory, u64)> + '_ {
        self.units.iter().map(|(c, u)| (*c, *u))
    }

    /// Merge another ledger into this one.
    pub fn merge(&mut self, other: &CostLedger) {
        for (category, units) in &other.units {
            *self.units.entry(*category).or_insert(0) += units;
        }
    }
}
