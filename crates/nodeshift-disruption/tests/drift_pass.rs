//! End-to-end drift passes over an in-memory cluster.

use std::collections::HashMap;
use std::sync::Arc;

use nodeshift_disruption::{
    CandidateBuilder, ClusterSimulator, Decision, DisruptionBudgets, Drift, InFlightQueue,
    MemoryRecorder, PassContext, pass,
};
use nodeshift_state::{
    Budget, CAPACITY_TYPE_ON_DEMAND, ClusterSnapshot, Condition, ConditionType, DisruptionReason,
    DisruptionSpec, FakeClock, InMemoryCluster, InstanceType, Limits, Node, NodeClaim, NodePool,
    Offering, Pod, PodPhase, Resources, StateNode, keys,
};

fn labels() -> HashMap<String, String> {
    HashMap::from([
        (keys::NODE_POOL.to_string(), "default".to_string()),
        (keys::INSTANCE_TYPE.to_string(), "m5.large".to_string()),
        (keys::CAPACITY_TYPE.to_string(), CAPACITY_TYPE_ON_DEMAND.to_string()),
        (keys::ZONE.to_string(), "zone-a".to_string()),
    ])
}

fn node(name: &str, drifted_at: Option<u64>) -> StateNode {
    let mut conditions = vec![Condition {
        kind: ConditionType::Initialized,
        status: true,
        last_transition_time: 0,
        reason: String::new(),
    }];
    if let Some(at) = drifted_at {
        conditions.push(Condition {
            kind: ConditionType::Drifted,
            status: true,
            last_transition_time: at,
            reason: "NodePoolDrifted".to_string(),
        });
    }
    StateNode {
        node: Some(Node {
            name: name.to_string(),
            uid: format!("node-uid-{name}"),
            provider_id: format!("fake://{name}"),
            labels: labels(),
            annotations: HashMap::new(),
            allocatable: Resources::new(2000, 4 << 30),
            ready: true,
        }),
        node_claim: Some(NodeClaim {
            name: format!("{name}-claim"),
            uid: format!("claim-uid-{name}"),
            provider_id: format!("fake://{name}"),
            labels: labels(),
            annotations: HashMap::new(),
            requirements: vec![],
            conditions,
            termination_grace_period_secs: None,
            created_at: 0,
        }),
        marked_for_deletion: false,
        nominated: false,
    }
}

fn pod(name: &str, node: &str, cpu_millis: u64) -> Pod {
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
        requests: Resources::new(cpu_millis, 1 << 30),
        node_selector: HashMap::new(),
        preferred_node_labels: HashMap::new(),
    }
}

fn snapshot(nodes: Vec<StateNode>, pods: Vec<Pod>, budget: &str) -> ClusterSnapshot {
    ClusterSnapshot {
        nodes,
        pods,
        node_pools: vec![NodePool {
            name: "default".to_string(),
            weight: 0,
            template_labels: HashMap::new(),
            disruption: DisruptionSpec {
                budgets: vec![Budget {
                    nodes: budget.to_string(),
                    reasons: None,
                }],
                expire_after_secs: None,
            },
        }],
        instance_types: HashMap::from([(
            "default".to_string(),
            vec![InstanceType {
                name: "m5.large".to_string(),
                allocatable: Resources::new(2000, 4 << 30),
                offerings: vec![Offering {
                    capacity_type: CAPACITY_TYPE_ON_DEMAND.to_string(),
                    zone: "zone-a".to_string(),
                    price: 0.096,
                    available: true,
                }],
            }],
        )]),
        ..Default::default()
    }
}

struct Outcome {
    decision: Decision,
    candidates: Vec<String>,
    replacements: usize,
    message: Option<String>,
    remaining: usize,
    recorder: MemoryRecorder,
}

async fn run(snap: ClusterSnapshot) -> Outcome {
    let cluster = InMemoryCluster::new(snap.clone());
    let recorder = MemoryRecorder::new();
    let clock = FakeClock::new(1_000);
    let pdbs = Limits::new(snap.pdbs.clone());
    let queue = InFlightQueue::from_ids(snap.in_flight.iter().cloned());
    let node_pools = snap.node_pool_map();
    let instance_types = snap.instance_type_map();

    let builder = CandidateBuilder {
        cluster: &cluster,
        recorder: &recorder,
        clock: &clock,
        pdbs: &pdbs,
        queue: &queue,
        node_pools: &node_pools,
        instance_types: &instance_types,
    };
    let simulator = ClusterSimulator::new(
        Arc::new(cluster.clone()),
        snap.node_pools.clone(),
        snap.instance_types.clone(),
    );
    let drift = Drift::new(
        Arc::new(cluster.clone()),
        Arc::new(simulator),
        Arc::new(recorder.clone()),
    );
    let mut budgets = DisruptionBudgets::build(&snap.nodes, &snap.node_pools);

    let evaluation = pass::evaluate(
        &PassContext::background(),
        &builder,
        &drift,
        &snap.nodes,
        &mut budgets,
    )
    .await
    .unwrap();

    Outcome {
        decision: evaluation.command.decision(),
        candidates: evaluation
            .command
            .candidates()
            .iter()
            .map(|c| c.name().to_string())
            .collect(),
        replacements: evaluation.command.replacements().len(),
        message: evaluation.message(),
        remaining: budgets.remaining("default", DisruptionReason::Drifted),
        recorder,
    }
}

#[tokio::test]
async fn empty_drifted_node_is_deleted() {
    let snap = snapshot(
        vec![node("node-a", Some(10)), node("node-b", None)],
        vec![pod("web", "node-b", 500)],
        "1",
    );

    let out = run(snap).await;

    assert_eq!(out.decision, Decision::Delete);
    assert_eq!(out.candidates, vec!["node-a".to_string()]);
    assert_eq!(out.replacements, 0);
    assert_eq!(out.remaining, 0);
    assert_eq!(
        out.message.as_deref(),
        Some(
            "Node default/m5.large/on-demand/node-a is underutilized and will be removed \
             without replacement"
        )
    );
}

#[tokio::test]
async fn empty_nodes_are_batched_up_to_the_budget() {
    let snap = snapshot(
        vec![
            node("node-a", Some(30)),
            node("node-b", Some(10)),
            node("node-c", Some(20)),
        ],
        vec![],
        "2",
    );

    let out = run(snap).await;

    assert_eq!(out.decision, Decision::Delete);
    assert_eq!(out.candidates, vec!["node-b".to_string(), "node-c".to_string()]);
    assert_eq!(out.remaining, 0);
}

#[tokio::test]
async fn busy_drifted_node_is_replaced() {
    let snap = snapshot(
        vec![node("node-a", Some(10)), node("node-b", None)],
        vec![
            pod("web-1", "node-a", 500),
            pod("web-2", "node-a", 500),
            pod("hog", "node-b", 2000),
        ],
        "1",
    );

    let out = run(snap).await;

    assert_eq!(out.decision, Decision::Replace);
    assert_eq!(out.candidates, vec!["node-a".to_string()]);
    assert_eq!(out.replacements, 1);
    let message = out.message.unwrap();
    assert!(message.contains("total price of 0.096"), "{message}");
    assert!(message.contains("m5.large/on-demand/zone-a:0.096"), "{message}");
}

#[tokio::test]
async fn pods_fitting_elsewhere_mean_plain_delete() {
    let snap = snapshot(
        vec![node("node-a", Some(10)), node("node-b", None)],
        vec![pod("web", "node-a", 500)],
        "1",
    );

    let out = run(snap).await;

    assert_eq!(out.decision, Decision::Delete);
    assert_eq!(out.candidates, vec!["node-a".to_string()]);
    assert_eq!(out.replacements, 0);
}

#[tokio::test]
async fn in_flight_node_is_left_alone() {
    let mut snap = snapshot(vec![node("node-a", Some(10)), node("node-b", None)], vec![], "1");
    snap.in_flight = vec!["fake://node-a".to_string()];

    let out = run(snap).await;

    assert_eq!(out.decision, Decision::NoOp);
    assert!(out.candidates.is_empty());
    assert_eq!(out.message, None);
}

#[tokio::test]
async fn exhausted_budget_yields_no_op() {
    let snap = snapshot(
        vec![node("node-a", Some(10)), node("node-b", None)],
        vec![pod("web", "node-a", 500)],
        "0",
    );

    let out = run(snap).await;

    assert_eq!(out.decision, Decision::NoOp);
    assert!(out.recorder.events().is_empty());
}

#[tokio::test]
async fn unplaceable_pods_block_the_node() {
    let mut snap = snapshot(
        vec![node("node-a", Some(10)), node("node-b", None)],
        vec![pod("huge", "node-a", 1500), pod("hog", "node-b", 2000)],
        "1",
    );
    // Nothing the pool can launch holds the pod.
    snap.instance_types.get_mut("default").unwrap()[0].allocatable = Resources::new(1000, 4 << 30);

    let out = run(snap).await;

    assert_eq!(out.decision, Decision::NoOp);
    let events = out.recorder.events();
    assert_eq!(events.len(), 2);
    assert!(events[0].message.starts_with("Cannot disrupt Node:"));
    assert!(events[0].message.contains("default/huge"), "{}", events[0].message);
}
