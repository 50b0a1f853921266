//! The disruption method contract.
//!
//! A method is one disruption policy (drift, emptiness, consolidation,
//! ...). The pass driver filters candidates through `should_disrupt` and
//! hands the survivors to `compute_command` together with the pass's
//! shared budgets.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use nodeshift_placement::SchedulingResults;
use nodeshift_state::DisruptionReason;

use crate::budget::DisruptionBudgets;
use crate::candidate::Candidate;
use crate::command::Command;
use crate::context::PassContext;
use crate::error::DisruptionResult;

/// How strictly a method honors blocking pods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisruptionClass {
    /// Always respects PDBs and do-not-disrupt annotations.
    Graceful,
    /// Bounded by the claim's termination grace period instead.
    Eventual,
}

impl fmt::Display for DisruptionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Graceful => write!(f, "graceful"),
            Self::Eventual => write!(f, "eventual"),
        }
    }
}

/// A command plus the simulation that justified it.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub command: Command,
    pub results: SchedulingResults,
}

impl Evaluation {
    pub fn no_op() -> Self {
        Self::default()
    }

    /// Operator-facing summary, or `None` for a no-op.
    pub fn message(&self) -> Option<String> {
        if self.command.candidates().is_empty() {
            return None;
        }
        Some(crate::message::disruption_message(
            self.command.candidates(),
            &self.results,
        ))
    }
}

#[async_trait]
pub trait Method: Send + Sync {
    /// Whether this method wants to act on `candidate` at all.
    fn should_disrupt(&self, candidate: &Candidate) -> bool;

    /// Pick what to disrupt among `candidates`.
    ///
    /// Budget is consumed here only for candidates batched into one
    /// command. A command holding a single candidate is checked against
    /// `budgets` but charged by the orchestrator when it executes.
    async fn compute_command(
        &self,
        ctx: &PassContext,
        budgets: &mut DisruptionBudgets,
        candidates: Vec<Candidate>,
    ) -> DisruptionResult<Evaluation>;

    fn reason(&self) -> DisruptionReason;

    fn class(&self) -> DisruptionClass;

    /// Empty for methods that are not consolidation.
    fn consolidation_type(&self) -> &'static str;
}
