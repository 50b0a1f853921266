//! Disruption budgets — how many more nodes each pool may lose this pass.
//!
//! The mapping is built once at the start of a pass and threaded by
//! `&mut` through every method that runs in it, so budgets consumed by
//! one method are visible to the next. It carries no lock; callers that
//! run methods in parallel must serialize access themselves.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use nodeshift_state::{Budget, DisruptionReason, NodePool, StateNode};

/// Budget applied to pools that configure none.
const DEFAULT_BUDGET: &str = "10%";

const ALL_REASONS: [DisruptionReason; 3] = [
    DisruptionReason::Underutilized,
    DisruptionReason::Empty,
    DisruptionReason::Drifted,
];

/// Pool name → reason → remaining disruptions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DisruptionBudgets {
    inner: HashMap<String, HashMap<DisruptionReason, usize>>,
}

impl DisruptionBudgets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining disruptions. Unknown pools and reasons have none.
    pub fn remaining(&self, node_pool: &str, reason: DisruptionReason) -> usize {
        self.inner
            .get(node_pool)
            .and_then(|r| r.get(&reason))
            .copied()
            .unwrap_or(0)
    }

    pub fn set(&mut self, node_pool: &str, reason: DisruptionReason, remaining: usize) {
        self.inner
            .entry(node_pool.to_string())
            .or_default()
            .insert(reason, remaining);
    }

    /// Consume one disruption. Returns false if none were left.
    pub fn decrement(&mut self, node_pool: &str, reason: DisruptionReason) -> bool {
        match self
            .inner
            .get_mut(node_pool)
            .and_then(|r| r.get_mut(&reason))
        {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        }
    }

    /// Compute the budgets for every pool and reason from live state.
    ///
    /// Only managed, initialized nodes count. Of those, nodes that are
    /// not ready or already marked for deletion are treated as being
    /// disrupted and consume budget up front.
    pub fn build(nodes: &[StateNode], node_pools: &[NodePool]) -> Self {
        let mut total: HashMap<&str, usize> = HashMap::new();
        let mut disrupting: HashMap<&str, usize> = HashMap::new();
        for node in nodes {
            if !node.managed() || !node.initialized() {
                continue;
            }
            let Some(pool) = node.node_pool_name() else {
                continue;
            };
            *total.entry(pool).or_default() += 1;
            if node.marked_for_deletion || !node.ready() {
                *disrupting.entry(pool).or_default() += 1;
            }
        }

        let mut budgets = Self::new();
        for pool in node_pools {
            let count = total.get(pool.name.as_str()).copied().unwrap_or(0);
            let busy = disrupting.get(pool.name.as_str()).copied().unwrap_or(0);
            for reason in ALL_REASONS {
                let allowed = allowed_disruptions(pool, count, reason);
                let remaining = allowed.saturating_sub(busy);
                debug!(
                    node_pool = %pool.name,
                    %reason,
                    nodes = count,
                    disrupting = busy,
                    remaining,
                    "disruption budget"
                );
                budgets.set(&pool.name, reason, remaining);
            }
        }
        budgets
    }
}

/// The tightest budget that applies to `reason`.
///
/// A pool without budgets gets the default; a pool whose budgets all
/// target other reasons is unconstrained for this one.
fn allowed_disruptions(pool: &NodePool, node_count: usize, reason: DisruptionReason) -> usize {
    let budgets = &pool.disruption.budgets;
    if budgets.is_empty() {
        return scaled(DEFAULT_BUDGET, node_count).unwrap_or(0);
    }
    budgets
        .iter()
        .filter(|b| b.applies_to(reason))
        .map(|b| budget_value(pool, b, node_count))
        .min()
        .unwrap_or(node_count)
}

fn budget_value(pool: &NodePool, budget: &Budget, node_count: usize) -> usize {
    match scaled(&budget.nodes, node_count) {
        Some(n) => n,
        None => {
            warn!(node_pool = %pool.name, value = %budget.nodes, "invalid budget, blocking disruption");
            0
        }
    }
}

/// Resolve "5" or "20%" against `node_count`. Percentages round up.
fn scaled(value: &str, node_count: usize) -> Option<usize> {
    let value = value.trim();
    match value.strip_suffix('%') {
        Some(pct) => {
            let pct: usize = pct.trim().parse().ok()?;
            Some((pct * node_count).div_ceil(100))
        }
        None => value.parse().ok(),
    }
}
