//! Scheduling simulation results.
//!
//! A simulation packs evicted pods onto the remaining nodes and, where
//! they do not fit, opens replacement node-claim templates. The result
//! records where every pod went, or why it could not be placed.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use nodeshift_state::{
    CAPACITY_TYPE_ON_DEMAND, CAPACITY_TYPE_SPOT, InstanceType, NodeClaim, Requirement, Resources,
    keys,
};

/// Default cap on the instance type options carried by a replacement.
pub const MAX_INSTANCE_TYPES: usize = 60;

/// Upper bound on the nominated-pods annotation value, in bytes.
const MAX_NOMINATED_PODS_LEN: usize = 4096;

/// Maximum number of pod errors spelled out in a summary.
const MAX_REPORTED_ERRORS: usize = 5;

/// A node that would have to be launched to fit evicted pods.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeClaimTemplate {
    pub node_pool: String,
    /// Acceptable instance types, cheapest first.
    pub instance_type_options: Vec<InstanceType>,
    /// Zone restriction inherited from the pods, if any.
    pub zone: Option<String>,
    /// Capacity type restriction inherited from the pods, if any.
    pub capacity_type: Option<String>,
    /// Labels the launched node will carry.
    pub labels: HashMap<String, String>,
    /// Total requests of the pods packed onto this template.
    pub requests: Resources,
    /// `namespace/name` of every pod packed onto this template.
    pub pods: Vec<String>,
}

impl NodeClaimTemplate {
    /// Capacity types offered by at least one option, honoring restrictions.
    pub fn capacity_types(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .instance_type_options
            .iter()
            .flat_map(|it| {
                it.available_offerings(self.zone.as_deref(), self.capacity_type.as_deref())
            })
            .map(|o| o.capacity_type.clone())
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// The purchase model a launch would most likely use.
    ///
    /// Spot wins whenever any option offers it.
    pub fn preferred_capacity_type(&self) -> &'static str {
        if self.capacity_types().iter().any(|ct| ct == CAPACITY_TYPE_SPOT) {
            CAPACITY_TYPE_SPOT
        } else {
            CAPACITY_TYPE_ON_DEMAND
        }
    }

    /// Cheapest available offering across all options.
    pub fn cheapest_price(&self) -> Option<f64> {
        self.instance_type_options
            .iter()
            .flat_map(|it| {
                it.available_offerings(self.zone.as_deref(), self.capacity_type.as_deref())
            })
            .map(|o| o.price)
            .min_by(|a, b| a.total_cmp(b))
    }

    pub fn instance_type_names(&self) -> Vec<String> {
        self.instance_type_options
            .iter()
            .map(|it| it.name.clone())
            .collect()
    }

    /// Keep at most `max` options (they are already cheapest-first).
    pub fn truncate_instance_types(&mut self, max: usize) {
        self.instance_type_options.truncate(max);
    }

    /// Comma-terminated `namespace/name,` list, capped at 4096 bytes.
    pub fn nominated_pods(&self) -> String {
        let mut out = String::new();
        for pod in &self.pods {
            out.push_str(pod);
            out.push(',');
        }
        if out.len() > MAX_NOMINATED_PODS_LEN {
            let mut end = MAX_NOMINATED_PODS_LEN;
            while !out.is_char_boundary(end) {
                end -= 1;
            }
            out.truncate(end);
        }
        out
    }

    /// Materialize the template as a node claim ready to be created.
    pub fn to_node_claim(&self, name: &str, now: u64) -> NodeClaim {
        let mut labels = self.labels.clone();
        labels.insert(keys::NODE_POOL.to_string(), self.node_pool.clone());

        let mut requirements = vec![Requirement {
            key: keys::INSTANCE_TYPE.to_string(),
            values: self.instance_type_names(),
        }];
        if let Some(zone) = &self.zone {
            requirements.push(Requirement {
                key: keys::ZONE.to_string(),
                values: vec![zone.clone()],
            });
        }
        requirements.push(Requirement {
            key: keys::CAPACITY_TYPE.to_string(),
            values: self.capacity_types(),
        });

        NodeClaim {
            name: name.to_string(),
            uid: String::new(),
            provider_id: String::new(),
            labels,
            annotations: HashMap::from([(
                keys::NOMINATED_PODS.to_string(),
                self.nominated_pods(),
            )]),
            requirements,
            conditions: Vec::new(),
            termination_grace_period_secs: None,
            created_at: now,
        }
    }
}

/// Why a pod could not be placed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PodError {
    /// `namespace/name`.
    pub pod: String,
    /// The pod was already pending before the simulation.
    pub pending: bool,
    pub message: String,
}

/// Outcome of a scheduling simulation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SchedulingResults {
    pub new_node_claims: Vec<NodeClaimTemplate>,
    /// Existing node name → pods placed on it.
    pub existing_nodes: BTreeMap<String, Vec<String>>,
    pub pod_errors: Vec<PodError>,
}

impl SchedulingResults {
    fn non_pending_errors(&self) -> impl Iterator<Item = &PodError> {
        self.pod_errors.iter().filter(|e| !e.pending)
    }

    /// Every pod that was bound before the simulation found a home.
    pub fn all_non_pending_pods_scheduled(&self) -> bool {
        self.non_pending_errors().next().is_none()
    }

    /// Human-readable summary of the errors for previously bound pods.
    pub fn non_pending_pod_scheduling_errors(&self) -> String {
        let errs: Vec<&PodError> = self.non_pending_errors().collect();
        if errs.is_empty() {
            return "No Pod Scheduling Errors".to_string();
        }
        let mut msg = "not all pods would schedule, ".to_string();
        for (i, err) in errs.iter().enumerate() {
            if i >= MAX_REPORTED_ERRORS {
                msg.push_str(&format!(" and {} other(s)", errs.len() - MAX_REPORTED_ERRORS));
                break;
            }
            msg.push_str(&format!("{} => {} ", err.pod, err.message));
        }
        msg
    }

    pub fn truncate_instance_types(mut self, max: usize) -> Self {
        for nc in &mut self.new_node_claims {
            nc.truncate_instance_types(max);
        }
        self
    }
}
