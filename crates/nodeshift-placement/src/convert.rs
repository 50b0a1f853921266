//! Type conversions between cluster state and placement types.
//!
//! Bridges `nodeshift_state::{StateNode, Pod}` to the packer's
//! `NodeResources` and `PlacementRequirements`.

use nodeshift_state::{Pod, Resources, StateNode, pod};

use crate::scorer::{NodeResources, PlacementRequirements};

/// Convert a [`StateNode`] and the pods bound to it to [`NodeResources`].
///
/// Returns `None` for nodes that have not registered yet, since there is
/// no allocatable capacity to pack against. Only active pods count
/// toward usage.
pub fn state_node_to_resources(
    node: &StateNode,
    pods: &[Pod],
    is_draining: bool,
) -> Option<NodeResources> {
    let registered = node.node.as_ref()?;
    let used: Resources = pods
        .iter()
        .filter(|p| pod::is_active(p))
        .map(|p| p.requests)
        .sum();
    Some(NodeResources {
        node_name: node.name().to_string(),
        labels: node.labels().clone(),
        allocatable: registered.allocatable,
        used,
        is_draining: is_draining || node.marked_for_deletion,
    })
}

/// Convert a [`Pod`] to [`PlacementRequirements`].
pub fn pod_to_requirements(pod: &Pod) -> PlacementRequirements {
    PlacementRequirements {
        requests: pod.requests,
        required_labels: pod.node_selector.clone(),
        preferred_labels: pod.preferred_node_labels.clone(),
    }
}
