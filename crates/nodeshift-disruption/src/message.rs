//! Operator-facing disruption summaries.

use std::fmt::Write;

use nodeshift_placement::SchedulingResults;

use crate::candidate::Candidate;

/// Describe what is about to happen to `candidates`.
///
/// Names each node as `pool/instance-type/capacity-type/name`, then
/// either the replacements (total of their cheapest prices, and every
/// offering they may launch from) or that nothing replaces them.
pub fn disruption_message(candidates: &[Candidate], results: &SchedulingResults) -> String {
    let mut msg = candidates
        .iter()
        .map(|c| {
            format!(
                "Node {}/{}/{}/{}",
                c.node_pool.name,
                c.instance_type_label(),
                c.capacity_type,
                c.name()
            )
        })
        .collect::<Vec<_>>()
        .join(", ");

    if results.new_node_claims.is_empty() {
        msg.push_str(" is underutilized and will be removed without replacement");
        return msg;
    }

    let total: f64 = results
        .new_node_claims
        .iter()
        .filter_map(|nc| nc.cheapest_price())
        .sum();
    let _ = write!(msg, " with a total price of {total:.3} is being replaced");
    for nc in &results.new_node_claims {
        msg.push_str(" with offerings: [");
        for it in &nc.instance_type_options {
            for o in it.available_offerings(nc.zone.as_deref(), nc.capacity_type.as_deref()) {
                let _ = write!(msg, " {}/{}/{}:{:.3} ", it.name, o.capacity_type, o.zone, o.price);
            }
        }
        msg.push_str(" ]");
    }
    msg
}
