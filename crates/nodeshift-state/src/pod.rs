//! Pod predicates used to decide which pods move, block, or are ignored
//! when a node is disrupted.

use crate::types::{Pod, PodPhase, keys};

/// The pod has finished (succeeded or failed).
pub fn is_terminal(pod: &Pod) -> bool {
    matches!(pod.phase, PodPhase::Succeeded | PodPhase::Failed)
}

/// Deletion of the pod has been requested.
pub fn is_terminating(pod: &Pod) -> bool {
    pod.deletion_timestamp.is_some()
}

pub fn is_owned_by_daemonset(pod: &Pod) -> bool {
    pod.owner.as_ref().is_some_and(|o| o.kind == "DaemonSet")
}

/// Static and mirror pods are owned by the node itself.
pub fn is_owned_by_node(pod: &Pod) -> bool {
    pod.owner.as_ref().is_some_and(|o| o.kind == "Node")
}

pub fn is_active(pod: &Pod) -> bool {
    !is_terminal(pod) && !is_terminating(pod)
}

/// The pod must be placed elsewhere when its node goes away.
pub fn is_reschedulable(pod: &Pod) -> bool {
    is_active(pod) && !is_owned_by_daemonset(pod) && !is_owned_by_node(pod)
}

/// The pod does not opt out of graceful disruption.
///
/// Only active pods can opt out; a finished or terminating pod never
/// holds its node.
pub fn is_disruptable(pod: &Pod) -> bool {
    !is_active(pod)
        || pod
            .annotations
            .get(keys::DO_NOT_DISRUPT)
            .is_none_or(|v| v != "true")
}

/// The pod goes through the eviction API (and is therefore subject to PDBs).
pub fn is_evictable(pod: &Pod) -> bool {
    is_active(pod) && !is_owned_by_node(pod)
}

/// The pod still has to be evicted before its node can be drained.
pub fn is_waiting_eviction(pod: &Pod) -> bool {
    !is_terminal(pod) && !is_terminating(pod) && is_evictable(pod)
}
