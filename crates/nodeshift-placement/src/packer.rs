//! Packing engine — simulates placing displaced pods.
//!
//! Given the pods that would be evicted and the nodes that remain, the
//! packer decides:
//! 1. Which existing node each pod lands on (using the scorer)
//! 2. Whether a pod can share a replacement node opened earlier in the pass
//! 3. Which node pool and instance types a new replacement needs
//!
//! Pods are packed largest-first so big pods claim space before the
//! small ones fragment it.

use tracing::{debug, warn};

use nodeshift_state::{InstanceType, NodePool, Pod, Resources, keys};

use crate::convert::pod_to_requirements;
use crate::results::{NodeClaimTemplate, PodError, SchedulingResults};
use crate::scorer::{NodeResources, ScoringWeights, rank_nodes};

/// A pod to place, and whether it was already pending.
#[derive(Debug, Clone)]
pub struct SimPod {
    pub pod: Pod,
    pub pending: bool,
}

/// A node pool together with the instance types it may launch.
#[derive(Debug, Clone)]
pub struct PoolCapacity {
    pub node_pool: NodePool,
    pub instance_types: Vec<InstanceType>,
}

/// Tunables for a packing run.
#[derive(Debug, Clone)]
pub struct PackingOptions {
    pub weights: ScoringWeights,
    pub max_instance_types: usize,
}

impl Default for PackingOptions {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            max_instance_types: crate::results::MAX_INSTANCE_TYPES,
        }
    }
}

/// Selector constraints split into the keys the packer understands.
struct Selector<'a> {
    zone: Option<&'a str>,
    capacity_type: Option<&'a str>,
    instance_type: Option<&'a str>,
    other: Vec<(&'a str, &'a str)>,
}

impl<'a> Selector<'a> {
    fn of(pod: &'a Pod) -> Self {
        let mut sel = Selector {
            zone: None,
            capacity_type: None,
            instance_type: None,
            other: Vec::new(),
        };
        for (k, v) in &pod.node_selector {
            match k.as_str() {
                keys::ZONE => sel.zone = Some(v.as_str()),
                keys::CAPACITY_TYPE => sel.capacity_type = Some(v.as_str()),
                keys::INSTANCE_TYPE => sel.instance_type = Some(v.as_str()),
                _ => sel.other.push((k.as_str(), v.as_str())),
            }
        }
        sel
    }

    /// Whether an instance type could host `total` under this selector.
    fn admits(&self, it: &InstanceType, zone: Option<&str>, ct: Option<&str>, total: &Resources) -> bool {
        it.allocatable.fits(total)
            && self.instance_type.is_none_or(|name| it.name == name)
            && it.available_offerings(zone, ct).next().is_some()
    }
}

/// Pack `pods` onto `nodes`, opening replacements from `pools` as needed.
///
/// `nodes` should already exclude the nodes being disrupted; draining
/// nodes are skipped by the scorer.
pub fn pack(
    pods: &[SimPod],
    nodes: &[NodeResources],
    pools: &[PoolCapacity],
    opts: &PackingOptions,
) -> SchedulingResults {
    let mut nodes = nodes.to_vec();
    let mut results = SchedulingResults::default();

    let mut ordered: Vec<&SimPod> = pods.iter().collect();
    ordered.sort_by(|a, b| {
        let (ra, rb) = (a.pod.requests, b.pod.requests);
        rb.cpu_millis
            .cmp(&ra.cpu_millis)
            .then(rb.memory_bytes.cmp(&ra.memory_bytes))
    });

    let mut pools: Vec<&PoolCapacity> = pools.iter().collect();
    pools.sort_by(|a, b| b.node_pool.weight.cmp(&a.node_pool.weight));

    for sim in ordered {
        let pod = &sim.pod;
        let key = pod.key();
        let req = pod_to_requirements(pod);

        if let Some(best) = rank_nodes(&nodes, &req, &opts.weights).first() {
            if let Some(node) = nodes.iter_mut().find(|n| n.node_name == best.node_name) {
                node.used += pod.requests;
            }
            debug!(pod = %key, node = %best.node_name, score = best.score, "placed on existing node");
            results
                .existing_nodes
                .entry(best.node_name.clone())
                .or_default()
                .push(key);
            continue;
        }

        let sel = Selector::of(pod);
        if results
            .new_node_claims
            .iter_mut()
            .any(|t| try_add(t, pod, &sel))
        {
            debug!(pod = %key, "packed onto replacement");
            continue;
        }

        match open_template(pod, &sel, &pools) {
            Some(template) => {
                debug!(
                    pod = %key,
                    node_pool = %template.node_pool,
                    options = template.instance_type_options.len(),
                    "opened replacement"
                );
                results.new_node_claims.push(template);
            }
            None => {
                warn!(pod = %key, "pod fits no existing node and no node pool");
                results.pod_errors.push(PodError {
                    pod: key,
                    pending: sim.pending,
                    message: format!(
                        "incompatible with all node pools or no instance type satisfied requests cpu={}m memory={}",
                        pod.requests.cpu_millis, pod.requests.memory_bytes
                    ),
                });
            }
        }
    }

    results.truncate_instance_types(opts.max_instance_types)
}

/// Add `pod` to an open template if it is compatible and some option still fits.
fn try_add(template: &mut NodeClaimTemplate, pod: &Pod, sel: &Selector<'_>) -> bool {
    if sel
        .zone
        .is_some_and(|z| template.zone.as_deref().is_some_and(|tz| tz != z))
        || sel
            .capacity_type
            .is_some_and(|ct| template.capacity_type.as_deref().is_some_and(|tct| tct != ct))
        || sel
            .other
            .iter()
            .any(|(k, v)| template.labels.get(*k).is_none_or(|tv| tv != v))
    {
        return false;
    }

    let zone = sel.zone.map(str::to_string).or_else(|| template.zone.clone());
    let ct = sel
        .capacity_type
        .map(str::to_string)
        .or_else(|| template.capacity_type.clone());
    let total = template.requests + pod.requests;
    let remaining: Vec<InstanceType> = template
        .instance_type_options
        .iter()
        .filter(|it| sel.admits(it, zone.as_deref(), ct.as_deref(), &total))
        .cloned()
        .collect();
    if remaining.is_empty() {
        return false;
    }

    template.zone = zone;
    template.capacity_type = ct;
    template.instance_type_options = remaining;
    template.requests = total;
    template.pods.push(pod.key());
    true
}

/// Open a replacement in the highest-weight pool that can host `pod`.
fn open_template(pod: &Pod, sel: &Selector<'_>, pools: &[&PoolCapacity]) -> Option<NodeClaimTemplate> {
    for pool in pools {
        let labels = &pool.node_pool.template_labels;
        if sel
            .other
            .iter()
            .any(|(k, v)| labels.get(*k).is_none_or(|lv| lv != v))
        {
            continue;
        }

        let mut options: Vec<InstanceType> = pool
            .instance_types
            .iter()
            .filter(|it| sel.admits(it, sel.zone, sel.capacity_type, &pod.requests))
            .cloned()
            .collect();
        if options.is_empty() {
            continue;
        }
        let price = |it: &InstanceType| {
            it.available_offerings(sel.zone, sel.capacity_type)
                .map(|o| o.price)
                .fold(f64::INFINITY, f64::min)
        };
        options.sort_by(|a, b| price(a).total_cmp(&price(b)));

        return Some(NodeClaimTemplate {
            node_pool: pool.node_pool.name.clone(),
            instance_type_options: options,
            zone: sel.zone.map(str::to_string),
            capacity_type: sel.capacity_type.map(str::to_string),
            labels: labels.clone(),
            requests: pod.requests,
            pods: vec![pod.key()],
        });
    }
    None
}
