//! Builders for cluster objects used across the unit tests.

use std::collections::HashMap;

use nodeshift_state::{
    CAPACITY_TYPE_ON_DEMAND, Condition, ConditionType, DisruptionSpec, InstanceType, Node,
    NodeClaim, NodePool, Offering, Pod, PodPhase, Resources, StateNode, keys,
};

use crate::candidate::Candidate;

pub(crate) fn labels(pool: &str) -> HashMap<String, String> {
    HashMap::from([
        (keys::NODE_POOL.to_string(), pool.to_string()),
        (keys::INSTANCE_TYPE.to_string(), "m5.large".to_string()),
        (keys::CAPACITY_TYPE.to_string(), CAPACITY_TYPE_ON_DEMAND.to_string()),
        (keys::ZONE.to_string(), "zone-a".to_string()),
    ])
}

fn condition(kind: ConditionType, at: u64) -> Condition {
    Condition {
        kind,
        status: true,
        last_transition_time: at,
        reason: String::new(),
    }
}

/// A managed, initialized, ready node in `pool`.
pub(crate) fn state_node(name: &str, pool: &str) -> StateNode {
    StateNode {
        node: Some(Node {
            name: name.to_string(),
            uid: format!("node-uid-{name}"),
            provider_id: format!("fake://{name}"),
            labels: labels(pool),
            annotations: HashMap::new(),
            allocatable: Resources::new(2000, 4 << 30),
            ready: true,
        }),
        node_claim: Some(NodeClaim {
            name: format!("{name}-claim"),
            uid: format!("claim-uid-{name}"),
            provider_id: format!("fake://{name}"),
            labels: labels(pool),
            annotations: HashMap::new(),
            requirements: vec![],
            conditions: vec![condition(ConditionType::Initialized, 0)],
            termination_grace_period_secs: None,
            created_at: 0,
        }),
        marked_for_deletion: false,
        nominated: false,
    }
}

/// Mark the node's claim as drifted since `at`.
pub(crate) fn drifted(mut node: StateNode, at: u64) -> StateNode {
    if let Some(claim) = node.node_claim.as_mut() {
        claim.conditions.push(condition(ConditionType::Drifted, at));
    }
    node
}

pub(crate) fn pod(name: &str, node: &str) -> Pod {
    Pod {
        namespace: "default".to_string(),
        name: name.to_string(),
        uid: format!("uid-{name}"),
        node_name: Some(node.to_string()),
        labels: HashMap::new(),
        annotations: HashMap::new(),
        owner: None,
        priority: None,
        phase: PodPhase::Running,
        deletion_timestamp: None,
        requests: Resources::new(500, 1 << 30),
        node_selector: HashMap::new(),
        preferred_node_labels: HashMap::new(),
    }
}

pub(crate) fn node_pool(name: &str) -> NodePool {
    NodePool {
        name: name.to_string(),
        weight: 0,
        template_labels: HashMap::new(),
        disruption: DisruptionSpec::default(),
    }
}

pub(crate) fn instance_type(name: &str, price: f64) -> InstanceType {
    InstanceType {
        name: name.to_string(),
        allocatable: Resources::new(2000, 4 << 30),
        offerings: vec![Offering {
            capacity_type: CAPACITY_TYPE_ON_DEMAND.to_string(),
            zone: "zone-a".to_string(),
            price,
            available: true,
        }],
    }
}

/// A candidate for `node` carrying `pods`, skipping validation.
pub(crate) fn candidate(node: StateNode, pods: Vec<Pod>) -> Candidate {
    let pool = node.node_pool_name().unwrap_or_default().to_string();
    let (Some(live), Some(claim)) = (node.node, node.node_claim) else {
        panic!("fixture node must be managed");
    };
    Candidate {
        zone: "zone-a".to_string(),
        capacity_type: CAPACITY_TYPE_ON_DEMAND.to_string(),
        instance_type: Some(instance_type("m5.large", 0.096)),
        node_pool: node_pool(&pool),
        disruption_cost: pods.len() as f64,
        reschedulable_pods: pods,
        node: live,
        node_claim: claim,
    }
}
