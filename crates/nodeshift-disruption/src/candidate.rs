//! Disruption candidates.
//!
//! A [`Candidate`] is an owned snapshot of a node that passed every
//! disruptability check, together with what the methods need to rank
//! it: its pool, instance type, topology, cost and the pods that would
//! have to move. Candidates are rebuilt on every pass and never mutated.
//!
//! ```text
//! StateNode ──▶ validate node ──▶ in-flight? ──▶ resolve pool
//!                                                   │
//!          Candidate ◀── cost ◀── validate pods ◀───┘
//! ```

use std::collections::HashMap;

use tracing::debug;

use nodeshift_state::{
    ClusterReader, Clock, ConditionType, InstanceType, Node, NodeClaim, NodePool, PdbLimits,
    Pod, StateNode, keys, pod,
};

use crate::context::PassContext;
use crate::cost;
use crate::error::{DisruptionError, DisruptionResult};
use crate::events::{self, Recorder};
use crate::method::DisruptionClass;
use crate::queue::DisruptionQueue;

/// A node under consideration for disruption.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub node: Node,
    pub node_claim: NodeClaim,
    /// `None` when the node's instance type is not offered by its pool.
    pub instance_type: Option<InstanceType>,
    pub node_pool: NodePool,
    pub zone: String,
    pub capacity_type: String,
    /// Non-negative; lower is cheaper to disrupt.
    pub disruption_cost: f64,
    /// Pods that must be placed elsewhere if the node goes away.
    pub reschedulable_pods: Vec<Pod>,
}

impl Candidate {
    pub fn name(&self) -> &str {
        &self.node.name
    }

    pub fn provider_id(&self) -> &str {
        &self.node.provider_id
    }

    /// The instance type label, which may name a type no longer offered.
    pub fn instance_type_label(&self) -> &str {
        self.node
            .labels
            .get(keys::INSTANCE_TYPE)
            .map_or("", String::as_str)
    }

    /// When the claim's drift condition last turned true.
    pub fn drifted_since(&self) -> Option<u64> {
        self.node_claim
            .condition(ConditionType::Drifted)
            .filter(|c| c.status)
            .map(|c| c.last_transition_time)
    }
}

/// Everything candidate construction reads, borrowed for one pass.
pub struct CandidateBuilder<'a> {
    pub cluster: &'a dyn ClusterReader,
    pub recorder: &'a dyn Recorder,
    pub clock: &'a dyn Clock,
    pub pdbs: &'a dyn PdbLimits,
    pub queue: &'a dyn DisruptionQueue,
    /// Pool name → pool.
    pub node_pools: &'a HashMap<String, NodePool>,
    /// Pool name → instance type name → instance type.
    pub instance_types: &'a HashMap<String, HashMap<String, InstanceType>>,
}

impl CandidateBuilder<'_> {
    /// Turn `node` into a candidate, or explain why it cannot be one.
    ///
    /// Rejections a human would care about are also published as
    /// "blocked" events on the node and its claim.
    pub async fn build(
        &self,
        ctx: &PassContext,
        node: &StateNode,
        class: DisruptionClass,
    ) -> DisruptionResult<Candidate> {
        if let Err(reason) = node.validate_node_disruptable() {
            // Unmanaged nodes are not ours to report on.
            if node.node_claim.is_some() {
                self.recorder.publish(events::blocked(
                    node.node.as_ref(),
                    node.node_claim.as_ref(),
                    &events::sentence(&reason),
                ));
            }
            return Err(DisruptionError::NotDisruptable(reason));
        }
        let (Some(live_node), Some(claim)) = (&node.node, &node.node_claim) else {
            return Err(DisruptionError::NotDisruptable(
                "node isn't managed by nodeshift".to_string(),
            ));
        };

        if self.queue.has_any(&[node.provider_id()]) {
            return Err(DisruptionError::AlreadyDisrupting(node.provider_id().to_string()));
        }

        let pool_name = node.node_pool_name().unwrap_or_default();
        let (Some(node_pool), Some(instance_types)) = (
            self.node_pools.get(pool_name),
            self.instance_types.get(pool_name),
        ) else {
            self.recorder.publish(events::blocked(
                Some(live_node),
                Some(claim),
                &format!("NodePool {pool_name:?} not found"),
            ));
            return Err(DisruptionError::GroupNotFound(pool_name.to_string()));
        };
        let labels = node.labels();
        let instance_type = labels
            .get(keys::INSTANCE_TYPE)
            .and_then(|name| instance_types.get(name))
            .cloned();

        let listed = ctx.guard(self.cluster.node_pods(node.name())).await??;
        let pods = match node.validate_pods_disruptable(listed, self.pdbs) {
            Ok(pods) => pods,
            // The grace period bounds how long blocking pods can hold
            // an eventual disruption, so they do not disqualify the node.
            Err(block)
                if class == DisruptionClass::Eventual
                    && claim.termination_grace_period_secs.is_some() =>
            {
                debug!(node = %node.name(), reason = %block.reason, "ignoring pod block for eventual disruption");
                block.pods
            }
            Err(block) => {
                self.recorder.publish(events::blocked(
                    Some(live_node),
                    Some(claim),
                    &events::sentence(&block.reason),
                ));
                return Err(DisruptionError::PodsNotDisruptable(block.reason));
            }
        };

        let disruption_cost = cost::disruption_cost(
            cost::rescheduling_cost(&pods),
            cost::lifetime_remaining(self.clock, node_pool, claim),
            node.utilization(&pods),
        );
        let reschedulable_pods: Vec<Pod> =
            pods.into_iter().filter(pod::is_reschedulable).collect();

        debug!(
            node = %node.name(),
            node_pool = %node_pool.name,
            cost = disruption_cost,
            reschedulable = reschedulable_pods.len(),
            "built disruption candidate"
        );

        Ok(Candidate {
            node: live_node.clone(),
            node_claim: claim.clone(),
            instance_type,
            node_pool: node_pool.clone(),
            zone: labels.get(keys::ZONE).cloned().unwrap_or_default(),
            capacity_type: labels.get(keys::CAPACITY_TYPE).cloned().unwrap_or_default(),
            disruption_cost,
            reschedulable_pods,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodeshift_state::{ClusterSnapshot, FakeClock, InMemoryCluster, Limits, OwnerRef, PdbSpec};

    use crate::events::MemoryRecorder;
    use crate::fixtures;
    use crate::queue::InFlightQueue;

    struct Harness {
        cluster: InMemoryCluster,
        recorder: MemoryRecorder,
        clock: FakeClock,
        pdbs: Limits,
        queue: InFlightQueue,
        node_pools: HashMap<String, NodePool>,
        instance_types: HashMap<String, HashMap<String, InstanceType>>,
    }

    impl Harness {
        fn new(pods: Vec<Pod>) -> Self {
            let snapshot = ClusterSnapshot {
                nodes: vec![fixtures::state_node("node-a", "default")],
                pods,
                node_pools: vec![fixtures::node_pool("default")],
                instance_types: HashMap::from([(
                    "default".to_string(),
                    vec![fixtures::instance_type("m5.large", 0.096)],
                )]),
                ..Default::default()
            };
            Self {
                cluster: InMemoryCluster::new(snapshot.clone()),
                recorder: MemoryRecorder::new(),
                clock: FakeClock::new(0),
                pdbs: Limits::default(),
                queue: InFlightQueue::new(),
                node_pools: snapshot.node_pool_map(),
                instance_types: snapshot.instance_type_map(),
            }
        }

        fn builder(&self) -> CandidateBuilder<'_> {
            CandidateBuilder {
                cluster: &self.cluster,
                recorder: &self.recorder,
                clock: &self.clock,
                pdbs: &self.pdbs,
                queue: &self.queue,
                node_pools: &self.node_pools,
                instance_types: &self.instance_types,
            }
        }

        async fn build(&self, node: &StateNode, class: DisruptionClass) -> DisruptionResult<Candidate> {
            self.builder().build(&PassContext::background(), node, class).await
        }
    }

    fn daemonset_pod(name: &str) -> Pod {
        let mut p = fixtures::pod(name, "node-a");
        p.owner = Some(OwnerRef {
            kind: "DaemonSet".to_string(),
            name: "agent".to_string(),
        });
        p
    }

    fn pinned_pod(name: &str) -> Pod {
        let mut p = fixtures::pod(name, "node-a");
        p.annotations
            .insert(keys::DO_NOT_DISRUPT.to_string(), "true".to_string());
        p
    }

    #[tokio::test]
    async fn builds_candidate_with_reschedulable_pods_and_cost() {
        let h = Harness::new(vec![
            fixtures::pod("web-1", "node-a"),
            fixtures::pod("web-2", "node-a"),
            daemonset_pod("agent-x"),
        ]);
        let node = fixtures::state_node("node-a", "default");

        let c = h.build(&node, DisruptionClass::Graceful).await.unwrap();

        assert_eq!(c.name(), "node-a");
        assert_eq!(c.node_pool.name, "default");
        assert_eq!(c.zone, "zone-a");
        assert_eq!(c.capacity_type, "on-demand");
        assert_eq!(c.instance_type.as_ref().map(|it| it.name.as_str()), Some("m5.large"));
        assert_eq!(c.reschedulable_pods.len(), 2);
        // 3 pods × cost 1 × lifetime 1 × utilization 0.75 (1500m of 2000m).
        assert!((c.disruption_cost - 2.25).abs() < 1e-9);
        assert!(h.recorder.events().is_empty());
    }

    #[tokio::test]
    async fn unknown_instance_type_is_tolerated() {
        let h = Harness::new(vec![]);
        let mut node = fixtures::state_node("node-a", "default");
        node.node
            .as_mut()
            .unwrap()
            .labels
            .insert(keys::INSTANCE_TYPE.to_string(), "retired".to_string());

        let c = h.build(&node, DisruptionClass::Graceful).await.unwrap();
        assert!(c.instance_type.is_none());
        assert_eq!(c.instance_type_label(), "retired");
    }

    #[tokio::test]
    async fn invalid_node_is_reported_only_when_managed() {
        let h = Harness::new(vec![]);
        let mut node = fixtures::state_node("node-a", "default");
        node.nominated = true;
        assert!(matches!(
            h.build(&node, DisruptionClass::Graceful).await,
            Err(DisruptionError::NotDisruptable(_))
        ));
        let events = h.recorder.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].message, "Cannot disrupt Node: Node is nominated for a pending pod.");

        let h = Harness::new(vec![]);
        let mut unmanaged = fixtures::state_node("node-a", "default");
        unmanaged.node_claim = None;
        assert!(h.build(&unmanaged, DisruptionClass::Graceful).await.is_err());
        assert!(h.recorder.events().is_empty());
    }

    #[tokio::test]
    async fn in_flight_node_is_never_a_candidate() {
        let h = Harness::new(vec![]);
        h.queue.add("fake://node-a");
        let node = fixtures::state_node("node-a", "default");
        assert!(matches!(
            h.build(&node, DisruptionClass::Eventual).await,
            Err(DisruptionError::AlreadyDisrupting(id)) if id == "fake://node-a"
        ));
    }

    #[tokio::test]
    async fn unknown_pool_is_blocked() {
        let h = Harness::new(vec![]);
        let mut node = fixtures::state_node("node-a", "default");
        node.node.as_mut().unwrap().labels = fixtures::labels("gone");

        assert!(matches!(
            h.build(&node, DisruptionClass::Graceful).await,
            Err(DisruptionError::GroupNotFound(name)) if name == "gone"
        ));
        assert_eq!(
            h.recorder.events()[1].message,
            "Cannot disrupt NodeClaim: NodePool \"gone\" not found"
        );
    }

    #[tokio::test]
    async fn blocking_pod_fails_graceful_class() {
        let h = Harness::new(vec![pinned_pod("pinned")]);
        let node = fixtures::state_node("node-a", "default");
        assert!(matches!(
            h.build(&node, DisruptionClass::Graceful).await,
            Err(DisruptionError::PodsNotDisruptable(_))
        ));
        assert_eq!(h.recorder.events().len(), 2);
    }

    #[tokio::test]
    async fn finished_pinned_pod_does_not_block() {
        let mut job = pinned_pod("job-1");
        job.phase = nodeshift_state::PodPhase::Succeeded;
        let h = Harness::new(vec![job, fixtures::pod("web", "node-a")]);
        let node = fixtures::state_node("node-a", "default");

        let c = h.build(&node, DisruptionClass::Graceful).await.unwrap();

        assert_eq!(c.reschedulable_pods.len(), 1);
        assert!(h.recorder.events().is_empty());
    }

    #[tokio::test]
    async fn blocking_pod_needs_grace_period_for_eventual_class() {
        let h = Harness::new(vec![pinned_pod("pinned"), fixtures::pod("web", "node-a")]);

        let node = fixtures::state_node("node-a", "default");
        assert!(h.build(&node, DisruptionClass::Eventual).await.is_err());

        let mut node = fixtures::state_node("node-a", "default");
        node.node_claim.as_mut().unwrap().termination_grace_period_secs = Some(600);
        let c = h.build(&node, DisruptionClass::Eventual).await.unwrap();
        assert_eq!(c.reschedulable_pods.len(), 2);
    }

    #[tokio::test]
    async fn pdb_block_is_downgraded_for_eventual_class_with_grace_period() {
        let mut h = Harness::new(vec![fixtures::pod("web", "node-a")]);
        h.pdbs = Limits::new(vec![PdbSpec {
            namespace: "default".to_string(),
            name: "strict".to_string(),
            selector: HashMap::new(),
            disruptions_allowed: 0,
        }]);
        let mut node = fixtures::state_node("node-a", "default");
        node.node_claim.as_mut().unwrap().termination_grace_period_secs = Some(60);

        assert!(h.build(&node, DisruptionClass::Graceful).await.is_err());
        assert!(h.build(&node, DisruptionClass::Eventual).await.is_ok());
    }

    #[tokio::test]
    async fn candidate_is_independent_of_live_state() {
        let h = Harness::new(vec![]);
        let mut node = fixtures::state_node("node-a", "default");
        let c = h.build(&node, DisruptionClass::Graceful).await.unwrap();

        node.node.as_mut().unwrap().labels.clear();
        assert_eq!(c.node.labels.get(keys::ZONE).map(String::as_str), Some("zone-a"));
    }

    #[tokio::test]
    async fn cancelled_pass_stops_construction() {
        let h = Harness::new(vec![]);
        let (tx, rx) = tokio::sync::watch::channel(false);
        tx.send(true).unwrap();
        let ctx = PassContext::new(rx);
        let node = fixtures::state_node("node-a", "default");
        assert!(matches!(
            h.builder().build(&ctx, &node, DisruptionClass::Graceful).await,
            Err(DisruptionError::Cancelled)
        ));
    }
}
