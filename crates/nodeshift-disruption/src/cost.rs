//! Disruption cost model.
//!
//! ```text
//! disruption_cost = rescheduling_cost(all pods)
//!                 × lifetime_remaining(node claim)
//!                 × utilization(node)
//! ```
//!
//! Lower is cheaper to disrupt. Every factor is non-negative, so the
//! product is too.

use tracing::warn;

use nodeshift_state::{Clock, NodeClaim, NodePool, Pod, keys};

/// Cost of evicting a single pod, in [-10, 10].
///
/// Starts at 1 and is nudged by the pod's deletion-cost annotation and
/// priority, so that important pods make their node more expensive.
pub fn eviction_cost(pod: &Pod) -> f64 {
    let mut cost = 1.0;
    if let Some(raw) = pod.annotations.get(keys::POD_DELETION_COST) {
        match raw.trim().parse::<i32>() {
            Ok(v) => cost += f64::from(v) / 2f64.powi(27),
            Err(e) => warn!(
                pod = %pod.key(),
                value = %raw,
                error = %e,
                "failed parsing pod deletion cost"
            ),
        }
    }
    if let Some(priority) = pod.priority {
        cost += f64::from(priority) / 2f64.powi(25);
    }
    cost.clamp(-10.0, 10.0)
}

/// Summed eviction cost of `pods`, floored at zero.
pub fn rescheduling_cost(pods: &[Pod]) -> f64 {
    pods.iter().map(eviction_cost).sum::<f64>().max(0.0)
}

/// Fraction of the pool's configured node lifetime still ahead of the claim.
///
/// 1.0 when the pool sets no expiry.
pub fn lifetime_remaining(clock: &dyn Clock, node_pool: &NodePool, node_claim: &NodeClaim) -> f64 {
    let Some(expire) = node_pool.disruption.expire_after_secs.filter(|e| *e > 0) else {
        return 1.0;
    };
    let age = clock.now().saturating_sub(node_claim.created_at);
    ((expire as f64 - age as f64) / expire as f64).clamp(0.0, 1.0)
}

/// Combine the three factors.
pub fn disruption_cost(rescheduling: f64, lifetime_remaining: f64, utilization: f64) -> f64 {
    (rescheduling * lifetime_remaining * utilization).max(0.0)
}
