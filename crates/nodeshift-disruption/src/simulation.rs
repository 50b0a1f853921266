//! Scheduling simulation — could the candidates' pods run elsewhere?
//!
//! Methods only see the [`SchedulingSimulator`] trait. [`ClusterSimulator`]
//! implements it over a [`ClusterReader`] and the placement crate's
//! packer:
//!
//! ```text
//! pods to place = candidates' reschedulable pods
//!               + reschedulable pods of other deleting nodes
//!               + pending pods
//! targets       = every other node that is ready and not deleting
//! overflow      → replacement templates from the node pools
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use nodeshift_placement::{
    PackingOptions, PoolCapacity, SchedulingResults, SimPod, pack, state_node_to_resources,
};
use nodeshift_state::{ClusterReader, InstanceType, NodePool, pod};

use crate::candidate::Candidate;

#[derive(Debug, Error)]
pub enum SimulationError {
    /// A candidate started deleting since it was built. Transient.
    #[error("candidate is deleting")]
    CandidateDeleting,

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

#[async_trait]
pub trait SchedulingSimulator: Send + Sync {
    /// Simulate removing `candidates` and placing their pods.
    async fn simulate(&self, candidates: &[Candidate]) -> Result<SchedulingResults, SimulationError>;
}

/// Simulator backed by live cluster state and the bin-packing engine.
pub struct ClusterSimulator {
    cluster: Arc<dyn ClusterReader>,
    node_pools: Vec<NodePool>,
    /// Pool name → instance types the pool may launch.
    instance_types: HashMap<String, Vec<InstanceType>>,
    options: PackingOptions,
}

impl ClusterSimulator {
    pub fn new(
        cluster: Arc<dyn ClusterReader>,
        node_pools: Vec<NodePool>,
        instance_types: HashMap<String, Vec<InstanceType>>,
    ) -> Self {
        Self {
            cluster,
            node_pools,
            instance_types,
            options: PackingOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PackingOptions) -> Self {
        self.options = options;
        self
    }
}

#[async_trait]
impl SchedulingSimulator for ClusterSimulator {
    async fn simulate(&self, candidates: &[Candidate]) -> Result<SchedulingResults, SimulationError> {
        let nodes = self.cluster.state_nodes().await.context("listing nodes")?;
        let names: HashSet<&str> = candidates.iter().map(Candidate::name).collect();

        if nodes
            .iter()
            .any(|n| names.contains(n.name()) && n.marked_for_deletion)
        {
            return Err(SimulationError::CandidateDeleting);
        }

        let mut pods: Vec<SimPod> = candidates
            .iter()
            .flat_map(|c| c.reschedulable_pods.iter().cloned())
            .map(|pod| SimPod { pod, pending: false })
            .collect();

        // Pods already leaving other deleting nodes compete for the same
        // space, but failing to place them does not block the candidates.
        let mut displaced = HashSet::new();
        let mut targets = Vec::new();
        for node in &nodes {
            if names.contains(node.name()) {
                continue;
            }
            let node_pods = self
                .cluster
                .node_pods(node.name())
                .await
                .with_context(|| format!("listing pods on node {}", node.name()))?;
            if node.marked_for_deletion {
                for p in node_pods.into_iter().filter(pod::is_reschedulable) {
                    displaced.insert(p.key());
                    pods.push(SimPod { pod: p, pending: false });
                }
                continue;
            }
            if let Some(res) = state_node_to_resources(node, &node_pods, !node.ready()) {
                targets.push(res);
            }
        }

        let pending = self.cluster.pending_pods().await.context("listing pending pods")?;
        pods.extend(pending.into_iter().map(|pod| SimPod { pod, pending: true }));

        let pools: Vec<PoolCapacity> = self
            .node_pools
            .iter()
            .map(|np| PoolCapacity {
                node_pool: np.clone(),
                instance_types: self.instance_types.get(&np.name).cloned().unwrap_or_default(),
            })
            .collect();

        let mut results = pack(&pods, &targets, &pools, &self.options);
        results.pod_errors.retain(|e| !displaced.contains(&e.pod));

        debug!(
            candidates = candidates.len(),
            pods = pods.len(),
            targets = targets.len(),
            new_node_claims = results.new_node_claims.len(),
            pod_errors = results.pod_errors.len(),
            "scheduling simulation"
        );
        Ok(results)
    }
}
