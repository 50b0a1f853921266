//! Operator-facing events.
//!
//! Events are fire-and-forget: the engine builds them and hands them to a
//! [`Recorder`], which may drop, log, or forward them. Publishing never
//! fails from the caller's point of view.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::{info, warn};

use nodeshift_state::{ClusterReader, Node, NodeClaim, StateError, keys};

/// Reason attached to events for nodes that cannot be disrupted.
pub const DISRUPTION_BLOCKED: &str = "DisruptionBlocked";

/// Reason attached to events for launches that found no capacity.
pub const INSUFFICIENT_CAPACITY_ERROR: &str = "InsufficientCapacityError";

/// Messages longer than this are cut, and end in "...".
const MAX_MESSAGE_LEN: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventType {
    Normal,
    Warning,
}

/// The object an event is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name")]
pub enum ObjectRef {
    Node(String),
    NodeClaim(String),
    /// `namespace/name`.
    Pod(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub involved_object: ObjectRef,
    #[serde(rename = "type")]
    pub kind: EventType,
    pub reason: String,
    pub message: String,
    /// Values a sink may use to collapse repeats of the same event.
    pub dedupe_values: Vec<String>,
}

/// Sink for events.
pub trait Recorder: Send + Sync {
    fn publish(&self, events: Vec<Event>);
}

/// Writes every event to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogRecorder;

impl Recorder for LogRecorder {
    fn publish(&self, events: Vec<Event>) {
        for event in events {
            match event.kind {
                EventType::Normal => info!(
                    object = ?event.involved_object,
                    reason = %event.reason,
                    "{}",
                    event.message
                ),
                EventType::Warning => warn!(
                    object = ?event.involved_object,
                    reason = %event.reason,
                    "{}",
                    event.message
                ),
            }
        }
    }
}

/// Keeps every published event in memory. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Recorder for MemoryRecorder {
    fn publish(&self, events: Vec<Event>) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(events);
    }
}

/// Capitalize the first letter and end with a period.
pub fn sentence(s: &str) -> String {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let mut out: String = first.to_uppercase().chain(chars).collect();
    if !out.ends_with('.') {
        out.push('.');
    }
    out
}

fn truncate_message(msg: &str) -> String {
    if msg.chars().count() <= MAX_MESSAGE_LEN {
        return msg.to_string();
    }
    let mut out: String = msg.chars().take(MAX_MESSAGE_LEN - 3).collect();
    out.push_str("...");
    out
}

/// One "blocked" event for each of the node and claim that is present.
pub fn blocked(node: Option<&Node>, node_claim: Option<&NodeClaim>, reason: &str) -> Vec<Event> {
    let mut events = Vec::new();
    if let Some(node) = node {
        events.push(Event {
            involved_object: ObjectRef::Node(node.name.clone()),
            kind: EventType::Normal,
            reason: DISRUPTION_BLOCKED.to_string(),
            message: truncate_message(&format!("Cannot disrupt Node: {reason}")),
            dedupe_values: vec![node.uid.clone()],
        });
    }
    if let Some(claim) = node_claim {
        events.push(Event {
            involved_object: ObjectRef::NodeClaim(claim.name.clone()),
            kind: EventType::Normal,
            reason: DISRUPTION_BLOCKED.to_string(),
            message: truncate_message(&format!("Cannot disrupt NodeClaim: {reason}")),
            dedupe_values: vec![claim.uid.clone()],
        });
    }
    events
}

/// Warnings for a claim that could not launch, and for each pod it was
/// opened for that still exists.
///
/// Nothing in this crate launches claims. The orchestrator that executes
/// replace commands calls this when a replacement fails to launch, reading
/// the pods from the claim's nominated-pods annotation.
pub async fn insufficient_capacity_error_events(
    cluster: &dyn ClusterReader,
    node_claim: &NodeClaim,
    err: &str,
) -> Vec<Event> {
    let err = truncate_message(err);
    let mut events = vec![Event {
        involved_object: ObjectRef::NodeClaim(node_claim.name.clone()),
        kind: EventType::Warning,
        reason: INSUFFICIENT_CAPACITY_ERROR.to_string(),
        message: format!("NodeClaim {} event: {err}", node_claim.name),
        dedupe_values: vec![node_claim.uid.clone()],
    }];

    let Some(nominated) = node_claim
        .annotations
        .get(keys::NOMINATED_PODS)
        .filter(|v| !v.is_empty())
    else {
        return events;
    };

    let zone = node_claim
        .requirement_values(keys::ZONE)
        .and_then(|v| v.first())
        .map_or("any az", String::as_str);
    let instance_types = node_claim
        .requirement_values(keys::INSTANCE_TYPE)
        .map(|v| v.join(","))
        .unwrap_or_default();

    for entry in nominated.split(',') {
        let Some((namespace, name)) = entry.split_once('/') else {
            continue;
        };
        match cluster.get_pod(namespace.trim(), name.trim()).await {
            Ok(Some(pod)) => events.push(Event {
                involved_object: ObjectRef::Pod(pod.key()),
                kind: EventType::Warning,
                reason: INSUFFICIENT_CAPACITY_ERROR.to_string(),
                message: format!("Pod could not schedule {instance_types} in {zone}: {err}"),
                dedupe_values: vec![format!("{INSUFFICIENT_CAPACITY_ERROR}{}", pod.uid)],
            }),
            Ok(None) | Err(StateError::NotFound(_)) => {}
            Err(e) => warn!(pod = entry, error = %e, "failed to get pod"),
        }
    }
    events
}
