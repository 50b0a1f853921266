//! Domain types for the nodeshift cluster model.
//!
//! These types mirror the subset of cluster objects the disruption engine
//! reads: nodes, the node claims backing them, pods, node pools, and the
//! instance types a pool can launch. All types are serializable to/from
//! JSON so that cluster snapshots can be loaded from disk.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique name of a node in the cluster.
pub type NodeName = String;

/// Cloud-provider identifier of the compute resource behind a node.
pub type ProviderId = String;

/// Well-known label and annotation keys.
pub mod keys {
    /// Label naming the node pool that owns a node.
    pub const NODE_POOL: &str = "nodeshift.dev/nodepool";
    /// Label carrying the purchase model (`spot` / `on-demand`).
    pub const CAPACITY_TYPE: &str = "nodeshift.dev/capacity-type";
    /// Label carrying the instance type name.
    pub const INSTANCE_TYPE: &str = "node.kubernetes.io/instance-type";
    /// Label carrying the topology zone.
    pub const ZONE: &str = "topology.kubernetes.io/zone";
    /// Annotation that blocks graceful disruption of a node or pod.
    pub const DO_NOT_DISRUPT: &str = "nodeshift.dev/do-not-disrupt";
    /// Annotation carrying a pod's relative deletion cost.
    pub const POD_DELETION_COST: &str = "controller.kubernetes.io/pod-deletion-cost";
    /// Annotation listing the pods a node claim was launched for.
    pub const NOMINATED_PODS: &str = "nodeshift.dev/nominated-pods";
}

pub const CAPACITY_TYPE_SPOT: &str = "spot";
pub const CAPACITY_TYPE_ON_DEMAND: &str = "on-demand";

// ── Resources ─────────────────────────────────────────────────────

/// CPU and memory quantities.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resources {
    /// CPU in millicores.
    pub cpu_millis: u64,
    /// Memory in bytes.
    pub memory_bytes: u64,
}

impl Resources {
    pub fn new(cpu_millis: u64, memory_bytes: u64) -> Self {
        Self {
            cpu_millis,
            memory_bytes,
        }
    }

    /// True if `other` fits inside `self`.
    pub fn fits(&self, other: &Resources) -> bool {
        other.cpu_millis <= self.cpu_millis && other.memory_bytes <= self.memory_bytes
    }

    pub fn saturating_sub(&self, other: &Resources) -> Resources {
        Resources {
            cpu_millis: self.cpu_millis.saturating_sub(other.cpu_millis),
            memory_bytes: self.memory_bytes.saturating_sub(other.memory_bytes),
        }
    }
}

impl std::ops::Add for Resources {
    type Output = Resources;

    fn add(self, rhs: Resources) -> Resources {
        Resources {
            cpu_millis: self.cpu_millis + rhs.cpu_millis,
            memory_bytes: self.memory_bytes + rhs.memory_bytes,
        }
    }
}

impl std::ops::AddAssign for Resources {
    fn add_assign(&mut self, rhs: Resources) {
        *self = *self + rhs;
    }
}

impl std::iter::Sum for Resources {
    fn sum<I: Iterator<Item = Resources>>(iter: I) -> Self {
        iter.fold(Resources::default(), |acc, r| acc + r)
    }
}

// ── Node ──────────────────────────────────────────────────────────

/// A node registered in the cluster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub name: NodeName,
    pub uid: String,
    pub provider_id: ProviderId,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    pub allocatable: Resources,
    /// Whether the node reports a true `Ready` condition.
    #[serde(default = "default_true")]
    pub ready: bool,
}

fn default_true() -> bool {
    true
}

// ── NodeClaim ─────────────────────────────────────────────────────

/// Status condition types tracked on node claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionType {
    Launched,
    Registered,
    Initialized,
    Drifted,
    Consolidatable,
}

/// A single status condition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Condition {
    #[serde(rename = "type")]
    pub kind: ConditionType,
    pub status: bool,
    /// Unix timestamp (seconds) of the last status flip.
    pub last_transition_time: u64,
    #[serde(default)]
    pub reason: String,
}

/// A scheduling requirement on a node claim (`key In values`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Requirement {
    pub key: String,
    pub values: Vec<String>,
}

/// The compute claim that launched (and backs) a managed node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeClaim {
    pub name: String,
    pub uid: String,
    pub provider_id: ProviderId,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Grace period after which pods are forcibly removed during termination.
    #[serde(default)]
    pub termination_grace_period_secs: Option<u64>,
    /// Unix timestamp (seconds) when this claim was created.
    pub created_at: u64,
}

impl NodeClaim {
    /// Look up a condition by type.
    pub fn condition(&self, kind: ConditionType) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.kind == kind)
    }

    /// True if the condition exists and is currently true.
    pub fn is_true(&self, kind: ConditionType) -> bool {
        self.condition(kind).is_some_and(|c| c.status)
    }

    /// First value of the requirement with the given key, if any.
    pub fn requirement_values(&self, key: &str) -> Option<&[String]> {
        self.requirements
            .iter()
            .find(|r| r.key == key && !r.values.is_empty())
            .map(|r| r.values.as_slice())
    }
}

// ── Pod ───────────────────────────────────────────────────────────

/// Lifecycle phase of a pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

/// Reference to the controller that owns a pod.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OwnerRef {
    pub kind: String,
    pub name: String,
}

/// A pod, bound to a node or pending.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pod {
    pub namespace: String,
    pub name: String,
    pub uid: String,
    #[serde(default)]
    pub node_name: Option<NodeName>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    #[serde(default)]
    pub owner: Option<OwnerRef>,
    #[serde(default)]
    pub priority: Option<i32>,
    pub phase: PodPhase,
    /// Unix timestamp (seconds) when deletion was requested.
    #[serde(default)]
    pub deletion_timestamp: Option<u64>,
    #[serde(default)]
    pub requests: Resources,
    /// Required node labels.
    #[serde(default)]
    pub node_selector: HashMap<String, String>,
    /// Node labels the pod prefers but does not require.
    #[serde(default)]
    pub preferred_node_labels: HashMap<String, String>,
}

impl Pod {
    /// `namespace/name` key.
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

// ── NodePool ──────────────────────────────────────────────────────

/// Why a node is being disrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisruptionReason {
    Underutilized,
    Empty,
    Drifted,
}

impl fmt::Display for DisruptionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Underutilized => write!(f, "Underutilized"),
            Self::Empty => write!(f, "Empty"),
            Self::Drifted => write!(f, "Drifted"),
        }
    }
}

/// A disruption budget: how many nodes of a pool may be disrupted at once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Budget {
    /// Absolute count ("5") or percentage of pool nodes ("10%").
    pub nodes: String,
    /// Reasons this budget applies to. Empty or absent means all reasons.
    #[serde(default)]
    pub reasons: Option<Vec<DisruptionReason>>,
}

impl Budget {
    pub fn applies_to(&self, reason: DisruptionReason) -> bool {
        match &self.reasons {
            Some(reasons) if !reasons.is_empty() => reasons.contains(&reason),
            _ => true,
        }
    }
}

/// Disruption settings for a node pool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DisruptionSpec {
    #[serde(default)]
    pub budgets: Vec<Budget>,
    /// Configured node lifetime.
    #[serde(default)]
    pub expire_after_secs: Option<u64>,
}

/// A group of nodes sharing launch configuration and disruption policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodePool {
    pub name: String,
    /// Higher weights are preferred when launching replacements.
    #[serde(default)]
    pub weight: u32,
    /// Labels applied to every node launched from this pool.
    #[serde(default)]
    pub template_labels: HashMap<String, String>,
    #[serde(default)]
    pub disruption: DisruptionSpec,
}

// ── Instance types ────────────────────────────────────────────────

/// A purchasable (capacity type, zone, price) combination.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Offering {
    pub capacity_type: String,
    pub zone: String,
    pub price: f64,
    #[serde(default = "default_true")]
    pub available: bool,
}

/// Compute instance type metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstanceType {
    pub name: String,
    /// Resources available to pods.
    pub allocatable: Resources,
    pub offerings: Vec<Offering>,
}

impl InstanceType {
    /// Available offerings, optionally restricted by zone and capacity type.
    pub fn available_offerings<'a>(
        &'a self,
        zone: Option<&'a str>,
        capacity_type: Option<&'a str>,
    ) -> impl Iterator<Item = &'a Offering> + 'a {
        self.offerings.iter().filter(move |o| {
            o.available
                && zone.is_none_or(|z| o.zone == z)
                && capacity_type.is_none_or(|ct| o.capacity_type == ct)
        })
    }

    /// Cheapest available offering price.
    pub fn cheapest_price(&self) -> Option<f64> {
        self.available_offerings(None, None)
            .map(|o| o.price)
            .min_by(|a, b| a.total_cmp(b))
    }
}
