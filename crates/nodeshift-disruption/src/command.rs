//! Disruption commands and their decisions.

use std::fmt;

use serde::Serialize;

use nodeshift_placement::NodeClaimTemplate;

use crate::candidate::Candidate;

/// What a command will do, derived from its contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Decision {
    NoOp,
    Replace,
    Delete,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoOp => write!(f, "no-op"),
            Self::Replace => write!(f, "replace"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Nodes to remove and the nodes to launch in their place.
///
/// Built once by a method and handed off; replacements are only ever
/// produced together with candidates.
#[derive(Debug, Clone, Default)]
pub struct Command {
    candidates: Vec<Candidate>,
    replacements: Vec<NodeClaimTemplate>,
}

impl Command {
    pub fn new(candidates: Vec<Candidate>, replacements: Vec<NodeClaimTemplate>) -> Self {
        Self {
            candidates,
            replacements,
        }
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn replacements(&self) -> &[NodeClaimTemplate] {
        &self.replacements
    }

    pub fn decision(&self) -> Decision {
        match (self.candidates.is_empty(), self.replacements.is_empty()) {
            (false, false) => Decision::Replace,
            (false, true) => Decision::Delete,
            (true, _) => Decision::NoOp,
        }
    }

    /// Structured summary for logs and CLI output.
    pub fn log_values(&self) -> CommandSummary {
        let disrupted_nodes: Vec<DisruptedNode> = self
            .candidates
            .iter()
            .map(|c| DisruptedNode {
                node: c.name().to_string(),
                node_claim: c.node_claim.name.clone(),
                instance_type: c.instance_type_label().to_string(),
                capacity_type: c.capacity_type.clone(),
            })
            .collect();
        let single = self.replacements.len() == 1;
        let replacement_nodes: Vec<ReplacementNode> = self
            .replacements
            .iter()
            .map(|r| ReplacementNode {
                capacity_type: r.preferred_capacity_type().to_string(),
                instance_types: single.then(|| r.instance_type_names()),
            })
            .collect();

        CommandSummary {
            decision: self.decision(),
            disrupted_node_count: disrupted_nodes.len(),
            replacement_node_count: replacement_nodes.len(),
            pod_count: self
                .candidates
                .iter()
                .map(|c| c.reschedulable_pods.len())
                .sum(),
            disrupted_nodes,
            replacement_nodes,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CommandSummary {
    pub decision: Decision,
    pub disrupted_node_count: usize,
    pub replacement_node_count: usize,
    pub pod_count: usize,
    pub disrupted_nodes: Vec<DisruptedNode>,
    pub replacement_nodes: Vec<ReplacementNode>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct DisruptedNode {
    pub node: String,
    pub node_claim: String,
    pub instance_type: String,
    pub capacity_type: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReplacementNode {
    pub capacity_type: String,
    /// Only listed when the command has a single replacement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_types: Option<Vec<String>>,
}
