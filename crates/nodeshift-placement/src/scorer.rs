//! Node scoring for pod placement during scheduling simulation.
//!
//! Evaluates existing nodes using a weighted combination of:
//! - **Bin-packing** (best-fit): prefer nodes that will be most full after placement
//! - **Affinity**: prefer nodes whose labels match the pod's preferences
//! - **Balance**: avoid nodes far above the cluster's average utilization
//!
//! Nodes that are draining, lack a required label, or cannot fit the pod
//! are rejected outright.

use std::collections::HashMap;

use nodeshift_state::Resources;

/// Resource capacity and usage for a single existing node.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NodeResources {
    pub node_name: String,
    pub labels: HashMap<String, String>,
    pub allocatable: Resources,
    pub used: Resources,
    pub is_draining: bool,
}

impl NodeResources {
    pub fn free(&self) -> Resources {
        self.allocatable.saturating_sub(&self.used)
    }

    /// Larger of cpu and memory utilization.
    pub fn utilization(&self) -> f64 {
        utilization(&self.used, &self.allocatable)
    }
}

fn utilization(used: &Resources, total: &Resources) -> f64 {
    let ratio = |u: u64, t: u64| if t == 0 { 0.5 } else { u as f64 / t as f64 };
    ratio(used.cpu_millis, total.cpu_millis).max(ratio(used.memory_bytes, total.memory_bytes))
}

/// What a single pod needs from a node.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PlacementRequirements {
    pub requests: Resources,
    /// Required label matches (all must match).
    pub required_labels: HashMap<String, String>,
    /// Preferred label matches (soft affinity, adds score).
    pub preferred_labels: HashMap<String, String>,
}

/// Scored placement result for a single node.
#[derive(Debug, Clone)]
pub struct NodeScore {
    pub node_name: String,
    /// Total composite score (higher = better). Range: 0.0..=100.0.
    pub score: f64,
    /// How many pods of this shape the node can still accept.
    pub capacity: u32,
    pub breakdown: ScoreBreakdown,
}

/// Individual score components for debugging.
#[derive(Debug, Clone)]
pub struct ScoreBreakdown {
    pub bin_packing: f64,
    pub affinity: f64,
    pub balance: f64,
}

/// Weights for the scoring components.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub bin_packing: f64,
    pub affinity: f64,
    pub balance: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            bin_packing: 0.5,
            affinity: 0.3,
            balance: 0.2,
        }
    }
}

/// Score a single node for the given pod requirements.
pub fn score_node(
    node: &NodeResources,
    req: &PlacementRequirements,
    weights: &ScoringWeights,
    cluster_avg_utilization: f64,
) -> Option<NodeScore> {
    if node.is_draining {
        return None;
    }

    for (key, value) in &req.required_labels {
        match node.labels.get(key) {
            Some(v) if v == value => {}
            _ => return None,
        }
    }

    let free = node.free();
    let fit = |have: u64, need: u64| if need > 0 { have / need } else { u64::MAX };
    let capacity = fit(free.cpu_millis, req.requests.cpu_millis)
        .min(fit(free.memory_bytes, req.requests.memory_bytes))
        .min(u64::from(u32::MAX)) as u32;

    if capacity == 0 {
        return None;
    }

    // Bin-packing score: how full will the node be after placement?
    let projected = node.used + req.requests;
    let bin_packing = utilization(&projected, &node.allocatable).min(1.0) * 100.0;

    let total_preferred = req.preferred_labels.len();
    let matched = req
        .preferred_labels
        .iter()
        .filter(|(k, v)| node.labels.get(*k).is_some_and(|nv| nv == *v))
        .count();
    let affinity = if total_preferred > 0 {
        (matched as f64 / total_preferred as f64) * 100.0
    } else {
        50.0 // Neutral when no preferences.
    };

    let balance =
        (1.0 - (node.utilization() - cluster_avg_utilization).abs()).max(0.0) * 100.0;

    let score = weights.bin_packing * bin_packing
        + weights.affinity * affinity
        + weights.balance * balance;

    Some(NodeScore {
        node_name: node.node_name.clone(),
        score,
        capacity,
        breakdown: ScoreBreakdown {
            bin_packing,
            affinity,
            balance,
        },
    })
}

/// Score all nodes and return the feasible ones, best first.
pub fn rank_nodes(
    nodes: &[NodeResources],
    req: &PlacementRequirements,
    weights: &ScoringWeights,
) -> Vec<NodeScore> {
    let cluster_avg = if nodes.is_empty() {
        0.5
    } else {
        nodes.iter().map(NodeResources::utilization).sum::<f64>() / nodes.len() as f64
    };

    let mut scores: Vec<NodeScore> = nodes
        .iter()
        .filter_map(|n| score_node(n, req, weights, cluster_avg))
        .collect();

    scores.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scores
}
