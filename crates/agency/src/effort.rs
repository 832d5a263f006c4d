//! Aggregated record of one coordinated execution.

use serde::{Deserialize, Serialize};

use crate::action::Outcome;
use crate::identifiers::EffortId;

/// Every attempt of one coordinated execution plus its final outcome.
///
/// ## Invariants
///
/// - `attempts` is never empty and is in chronological order.
/// - `initial_attempt()` is `attempts[0]`, `retries()` is `attempts[1..]`.
/// - `final_attempt()` is the last retry, or the initial attempt if there
///   were no retries.
/// - When produced by a retry policy, `culmination` succeeds exactly when
///   `final_attempt()` does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "EffortRecord")]
pub struct Effort {
    id: EffortId,
    culmination: Outcome,
    attempts: Vec<Outcome>,
}

/// Wire form of an [`Effort`]; normalised through [`Effort::new`] on the way in.
#[derive(Deserialize)]
struct EffortRecord {
    id: EffortId,
    culmination: Outcome,
    #[serde(default)]
    attempts: Vec<Outcome>,
}

impl From<EffortRecord> for Effort {
    fn from(record: EffortRecord) -> Self {
        Self::new(record.culmination, record.attempts).with_id(record.id)
    }
}

impl Effort {
    /// Creates an effort from its culmination and the attempts that led to it.
    ///
    /// If `attempts` is empty the culmination stands in as the only attempt.
    pub fn new(culmination: Outcome, attempts: Vec<Outcome>) -> Self {
        let attempts = if attempts.is_empty() { vec![culmination.clone()] } else { attempts };
        Self { id: EffortId::new_random(), culmination, attempts }
    }

    /// Creates an effort for an execution that was attempted exactly once.
    pub fn from_culmination(culmination: Outcome) -> Self {
        Self::new(culmination, Vec::new())
    }

    /// Replaces the generated identifier (e.g. to reuse a coordinator-assigned id).
    #[must_use]
    pub fn with_id(mut self, id: EffortId) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> EffortId {
        self.id
    }

    /// The final outcome of the execution.
    pub fn culmination(&self) -> &Outcome {
        &self.culmination
    }

    /// Every attempt, oldest first.
    pub fn attempts(&self) -> &[Outcome] {
        &self.attempts
    }

    pub fn initial_attempt(&self) -> &Outcome {
        self.attempts.first().unwrap_or(&self.culmination)
    }

    pub fn retries(&self) -> &[Outcome] {
        self.attempts.get(1..).unwrap_or_default()
    }

    pub fn final_attempt(&self) -> &Outcome {
        self.retries().last().unwrap_or_else(|| self.initial_attempt())
    }

    /// Returns `true` if the culmination is successful.
    pub fn succeeded(&self) -> bool {
        self.culmination.is_ok()
    }
}

impl std::fmt::Display for Effort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = if self.succeeded() { "succeeded" } else { "failed" };
        let retries = if self.retries().is_empty() { "" } else { ":retries" };
        write!(f, "<Effort:{status}{retries}>")
    }
}
