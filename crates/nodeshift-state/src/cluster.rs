//! Cluster state reader and an in-memory implementation.
//!
//! `ClusterReader` is the seam through which the disruption engine sees
//! live cluster state. Production deployments back it with an API
//! client; `InMemoryCluster` backs it with a loaded `ClusterSnapshot`
//! and is used by the CLI and by tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::node::StateNode;
use crate::pdb::PdbSpec;
use crate::types::*;

/// Read access to live cluster objects.
#[async_trait]
pub trait ClusterReader: Send + Sync {
    /// All nodes currently tracked, each as a consistent snapshot.
    async fn state_nodes(&self) -> StateResult<Vec<StateNode>>;

    /// Pods currently bound to the named node.
    async fn node_pods(&self, node_name: &str) -> StateResult<Vec<Pod>>;

    /// Pods not yet bound to any node.
    async fn pending_pods(&self) -> StateResult<Vec<Pod>>;

    /// Fetch a single pod. `Ok(None)` if it no longer exists.
    async fn get_pod(&self, namespace: &str, name: &str) -> StateResult<Option<Pod>>;
}

/// A point-in-time dump of everything the disruption engine reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClusterSnapshot {
    #[serde(default)]
    pub nodes: Vec<StateNode>,
    #[serde(default)]
    pub pods: Vec<Pod>,
    #[serde(default)]
    pub node_pools: Vec<NodePool>,
    /// Node pool name → instance types that pool may launch.
    #[serde(default)]
    pub instance_types: HashMap<String, Vec<InstanceType>>,
    #[serde(default)]
    pub pdbs: Vec<PdbSpec>,
    /// Provider ids already queued for disruption.
    #[serde(default)]
    pub in_flight: Vec<ProviderId>,
}

impl ClusterSnapshot {
    pub fn from_file(path: &Path) -> StateResult<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| StateError::Read(e.to_string()))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> StateResult<Self> {
        serde_json::from_str(content).map_err(|e| StateError::Deserialize(e.to_string()))
    }

    /// Node pools keyed by name.
    pub fn node_pool_map(&self) -> HashMap<String, NodePool> {
        self.node_pools
            .iter()
            .map(|np| (np.name.clone(), np.clone()))
            .collect()
    }

    /// Node pool name → instance type name → instance type.
    pub fn instance_type_map(&self) -> HashMap<String, HashMap<String, InstanceType>> {
        self.instance_types
            .iter()
            .map(|(pool, its)| {
                let by_name = its.iter().map(|it| (it.name.clone(), it.clone())).collect();
                (pool.clone(), by_name)
            })
            .collect()
    }
}

/// Thread-safe, mutable in-memory cluster.
///
/// Cheap to clone; all clones share the same underlying snapshot.
#[derive(Clone, Default)]
pub struct InMemoryCluster {
    inner: Arc<RwLock<ClusterSnapshot>>,
}

impl InMemoryCluster {
    pub fn new(snapshot: ClusterSnapshot) -> Self {
        Self {
            inner: Arc::new(RwLock::new(snapshot)),
        }
    }

    /// A copy of the current snapshot.
    pub async fn snapshot(&self) -> ClusterSnapshot {
        self.inner.read().await.clone()
    }

    /// Insert or replace a pod (matched by namespace/name).
    pub async fn put_pod(&self, pod: Pod) {
        let mut inner = self.inner.write().await;
        inner
            .pods
            .retain(|p| !(p.namespace == pod.namespace && p.name == pod.name));
        debug!(pod = %pod.key(), "pod stored");
        inner.pods.push(pod);
    }

    /// Remove a pod. Returns true if it existed.
    pub async fn delete_pod(&self, namespace: &str, name: &str) -> bool {
        let mut inner = self.inner.write().await;
        let before = inner.pods.len();
        inner
            .pods
            .retain(|p| !(p.namespace == namespace && p.name == name));
        inner.pods.len() != before
    }

    /// Flag a node as marked for deletion. Returns true if the node exists.
    pub async fn mark_for_deletion(&self, node_name: &str) -> bool {
        let mut inner = self.inner.write().await;
        match inner.nodes.iter_mut().find(|n| n.name() == node_name) {
            Some(n) => {
                n.marked_for_deletion = true;
                debug!(node = node_name, "node marked for deletion");
                true
            }
            None => false,
        }
    }

    /// Apply an arbitrary mutation to the named node.
    pub async fn update_node<F: FnOnce(&mut StateNode)>(&self, node_name: &str, f: F) -> bool {
        let mut inner = self.inner.write().await;
        match inner.nodes.iter_mut().find(|n| n.name() == node_name) {
            Some(n) => {
                f(n);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl ClusterReader for InMemoryCluster {
    async fn state_nodes(&self) -> StateResult<Vec<StateNode>> {
        Ok(self.inner.read().await.nodes.clone())
    }

    async fn node_pods(&self, node_name: &str) -> StateResult<Vec<Pod>> {
        let inner = self.inner.read().await;
        if !inner.nodes.iter().any(|n| n.name() == node_name) {
            return Err(StateError::NotFound(format!("node {node_name}")));
        }
        Ok(inner
            .pods
            .iter()
            .filter(|p| p.node_name.as_deref() == Some(node_name))
            .cloned()
            .collect())
    }

    async fn pending_pods(&self) -> StateResult<Vec<Pod>> {
        Ok(self
            .inner
            .read()
            .await
            .pods
            .iter()
            .filter(|p| p.node_name.is_none() && p.phase == PodPhase::Pending)
            .cloned()
            .collect())
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> StateResult<Option<Pod>> {
        Ok(self
            .inner
            .read()
            .await
            .pods
            .iter()
            .find(|p| p.namespace == namespace && p.name == name)
            .cloned())
    }
}
