//! `StateNode` — the combined view of a node and its backing claim.
//!
//! A managed node is represented by both a `Node` (what the cluster
//! sees) and a `NodeClaim` (what was launched). Either half may be
//! missing while the node is launching or going away.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pdb::PdbLimits;
use crate::pod;
use crate::types::*;

/// Pods on the node cannot be evicted under the current rules.
///
/// Carries the pods that were inspected so callers that choose to
/// tolerate the block still see the node's full workload.
#[derive(Debug, Error)]
#[error("{reason}")]
pub struct PodBlockEviction {
    pub reason: String,
    pub pods: Vec<Pod>,
}

/// Cluster view of a single node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateNode {
    #[serde(default)]
    pub node: Option<Node>,
    #[serde(default)]
    pub node_claim: Option<NodeClaim>,
    /// Some controller has committed to deleting this node.
    #[serde(default)]
    pub marked_for_deletion: bool,
    /// A pending pod has been nominated to this node.
    #[serde(default)]
    pub nominated: bool,
}

static EMPTY: std::sync::LazyLock<HashMap<String, String>> =
    std::sync::LazyLock::new(HashMap::new);

impl StateNode {
    pub fn name(&self) -> &str {
        match (&self.node, &self.node_claim) {
            (Some(n), _) => &n.name,
            (None, Some(c)) => &c.name,
            (None, None) => "",
        }
    }

    pub fn provider_id(&self) -> &str {
        match (&self.node, &self.node_claim) {
            (Some(n), _) if !n.provider_id.is_empty() => &n.provider_id,
            (_, Some(c)) => &c.provider_id,
            _ => "",
        }
    }

    /// Node labels, falling back to the claim's while the node registers.
    pub fn labels(&self) -> &HashMap<String, String> {
        match (&self.node, &self.node_claim) {
            (Some(n), _) => &n.labels,
            (None, Some(c)) => &c.labels,
            (None, None) => &EMPTY,
        }
    }

    pub fn annotations(&self) -> &HashMap<String, String> {
        match (&self.node, &self.node_claim) {
            (Some(n), _) => &n.annotations,
            (None, Some(c)) => &c.annotations,
            (None, None) => &EMPTY,
        }
    }

    pub fn node_pool_name(&self) -> Option<&str> {
        self.labels().get(keys::NODE_POOL).map(String::as_str)
    }

    /// The node was launched by nodeshift.
    pub fn managed(&self) -> bool {
        self.node_claim.is_some()
    }

    pub fn initialized(&self) -> bool {
        self.node.is_some()
            && self
                .node_claim
                .as_ref()
                .is_some_and(|c| c.is_true(ConditionType::Initialized))
    }

    pub fn ready(&self) -> bool {
        self.node.as_ref().is_some_and(|n| n.ready)
    }

    /// Check that nothing about the node itself forbids disruption.
    pub fn validate_node_disruptable(&self) -> Result<(), String> {
        if self.node.is_none() || self.node_claim.is_none() {
            return Err("node isn't managed by nodeshift".to_string());
        }
        if self.marked_for_deletion {
            return Err("node is deleting or marked for deletion".to_string());
        }
        if self.nominated {
            return Err("node is nominated for a pending pod".to_string());
        }
        if self
            .annotations()
            .get(keys::DO_NOT_DISRUPT)
            .is_some_and(|v| v == "true")
        {
            return Err(format!(
                "disruption is blocked through the {:?} annotation",
                keys::DO_NOT_DISRUPT
            ));
        }
        if !self.initialized() {
            return Err("node isn't initialized".to_string());
        }
        for key in [
            keys::NODE_POOL,
            keys::INSTANCE_TYPE,
            keys::CAPACITY_TYPE,
            keys::ZONE,
        ] {
            if !self.labels().contains_key(key) {
                return Err(format!("node doesn't have required label {key:?}"));
            }
        }
        Ok(())
    }

    /// Check the node's pods against do-not-disrupt and PDB limits.
    ///
    /// Returns the pods unchanged on success.
    pub fn validate_pods_disruptable(
        &self,
        pods: Vec<Pod>,
        pdbs: &dyn PdbLimits,
    ) -> Result<Vec<Pod>, PodBlockEviction> {
        if let Some(blocking) = pods.iter().find(|p| !pod::is_disruptable(p)) {
            return Err(PodBlockEviction {
                reason: format!(
                    "pod {} has {:?} annotation",
                    blocking.key(),
                    keys::DO_NOT_DISRUPT
                ),
                pods,
            });
        }
        if let Err(pdb) = pdbs.can_evict_pods(&pods) {
            return Err(PodBlockEviction {
                reason: format!("pdb {pdb} prevents pod evictions"),
                pods,
            });
        }
        Ok(pods)
    }

    /// Fraction of allocatable capacity requested by `pods`, in [0, 1].
    ///
    /// The larger of the cpu and memory ratios.
    pub fn utilization(&self, pods: &[Pod]) -> f64 {
        let Some(node) = &self.node else {
            return 0.0;
        };
        let requested: Resources = pods
            .iter()
            .filter(|p| pod::is_active(p))
            .map(|p| p.requests)
            .sum();
        let ratio = |used: u64, total: u64| {
            if total == 0 {
                0.0
            } else {
                used as f64 / total as f64
            }
        };
        let cpu = ratio(requested.cpu_millis, node.allocatable.cpu_millis);
        let mem = ratio(requested.memory_bytes, node.allocatable.memory_bytes);
        cpu.max(mem).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdb::{Limits, PdbSpec};

    fn state_node() -> StateNode {
        let labels = HashMap::from([
            (keys::NODE_POOL.to_string(), "default".to_string()),
            (keys::INSTANCE_TYPE.to_string(), "m5.large".to_string()),
            (keys::CAPACITY_TYPE.to_string(), CAPACITY_TYPE_ON_DEMAND.to_string()),
            (keys::ZONE.to_string(), "zone-a".to_string()),
        ]);
        StateNode {
            node: Some(Node {
                name: "node-a".to_string(),
                uid: "node-uid".to_string(),
                provider_id: "fake://a".to_string(),
                labels: labels.clone(),
                annotations: HashMap::new(),
                allocatable: Resources::new(2000, 4096),
                ready: true,
            }),
            node_claim: Some(NodeClaim {
                name: "claim-a".to_string(),
                uid: "claim-uid".to_string(),
                provider_id: "fake://a".to_string(),
                labels,
                annotations: HashMap::new(),
                requirements: vec![],
                conditions: vec![Condition {
                    kind: ConditionType::Initialized,
                    status: true,
                    last_transition_time: 0,
                    reason: String::new(),
                }],
                termination_grace_period_secs: None,
                created_at: 0,
            }),
            marked_for_deletion: false,
            nominated: false,
        }
    }

    fn pod(name: &str, cpu: u64, mem: u64) -> Pod {
        Pod {
            namespace: "default".to_string(),
            name: name.to_string(),
            uid: format!("uid-{name}"),
            node_name: Some("node-a".to_string()),
            labels: HashMap::new(),
            annotations: HashMap::new(),
            owner: None,
            priority: None,
            phase: PodPhase::Running,
            deletion_timestamp: None,
            requests: Resources::new(cpu, mem),
            node_selector: HashMap::new(),
            preferred_node_labels: HashMap::new(),
        }
    }

    #[test]
    fn healthy_managed_node_is_disruptable() {
        assert!(state_node().validate_node_disruptable().is_ok());
    }

    #[test]
    fn unmanaged_node_is_rejected() {
        let mut sn = state_node();
        sn.node_claim = None;
        let err = sn.validate_node_disruptable().unwrap_err();
        assert!(err.contains("isn't managed"));
    }

    #[test]
    fn deleting_or_nominated_node_is_rejected() {
        let mut sn = state_node();
        sn.marked_for_deletion = true;
        assert!(sn.validate_node_disruptable().is_err());

        let mut sn = state_node();
        sn.nominated = true;
        assert!(sn.validate_node_disruptable().is_err());
    }

    #[test]
    fn node_annotation_blocks_disruption() {
        let mut sn = state_node();
        sn.node
            .as_mut()
            .unwrap()
            .annotations
            .insert(keys::DO_NOT_DISRUPT.to_string(), "true".to_string());
        let err = sn.validate_node_disruptable().unwrap_err();
        assert!(err.contains("do-not-disrupt"));
    }

    #[test]
    fn missing_zone_label_is_rejected() {
        let mut sn = state_node();
        sn.node.as_mut().unwrap().labels.remove(keys::ZONE);
        let err = sn.validate_node_disruptable().unwrap_err();
        assert!(err.contains("topology.kubernetes.io/zone"));
    }

    #[test]
    fn do_not_disrupt_pod_blocks_and_keeps_pods() {
        let sn = state_node();
        let mut pinned = pod("pinned", 100, 100);
        pinned
            .annotations
            .insert(keys::DO_NOT_DISRUPT.to_string(), "true".to_string());
        let err = sn
            .validate_pods_disruptable(vec![pod("web", 100, 100), pinned], &Limits::default())
            .unwrap_err();
        assert_eq!(err.pods.len(), 2);
        assert!(err.reason.contains("default/pinned"));
    }

    #[test]
    fn pdb_blocks_eviction() {
        let sn = state_node();
        let limits = Limits::new(vec![PdbSpec {
            namespace: "default".to_string(),
            name: "strict".to_string(),
            selector: HashMap::new(),
            disruptions_allowed: 0,
        }]);
        let err = sn
            .validate_pods_disruptable(vec![pod("web", 100, 100)], &limits)
            .unwrap_err();
        assert!(err.reason.contains("default/strict"));
    }

    #[test]
    fn utilization_takes_the_larger_ratio() {
        let sn = state_node();
        let pods = vec![pod("a", 500, 3072), pod("b", 500, 0)];
        // cpu 1000/2000 = 0.5, memory 3072/4096 = 0.75
        assert!((sn.utilization(&pods) - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn utilization_is_clamped() {
        let sn = state_node();
        let pods = vec![pod("huge", 10_000, 0)];
        assert_eq!(sn.utilization(&pods), 1.0);
    }
}
