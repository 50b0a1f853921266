//! One evaluation pass of a single method.
//!
//! The periodic loop that drives passes lives outside this crate; this
//! helper is what it calls for each method, and what the CLI runs once.

use tracing::{debug, info};

use nodeshift_state::StateNode;

use crate::budget::DisruptionBudgets;
use crate::candidate::CandidateBuilder;
use crate::context::PassContext;
use crate::error::{DisruptionError, DisruptionResult};
use crate::method::{Evaluation, Method};

/// Build candidates from `nodes`, keep the ones `method` wants, and
/// compute its command.
///
/// Nodes that cannot become candidates are skipped; only cancellation
/// aborts the pass early.
pub async fn evaluate(
    ctx: &PassContext,
    builder: &CandidateBuilder<'_>,
    method: &dyn Method,
    nodes: &[StateNode],
    budgets: &mut DisruptionBudgets,
) -> DisruptionResult<Evaluation> {
    let mut candidates = Vec::new();
    for node in nodes {
        match builder.build(ctx, node, method.class()).await {
            Ok(candidate) => candidates.push(candidate),
            Err(DisruptionError::Cancelled) => return Err(DisruptionError::Cancelled),
            Err(e) => debug!(node = %node.name(), error = %e, "not a disruption candidate"),
        }
    }

    let built = candidates.len();
    candidates.retain(|c| method.should_disrupt(c));
    info!(
        reason = %method.reason(),
        class = %method.class(),
        nodes = nodes.len(),
        candidates = built,
        selected = candidates.len(),
        "evaluating disruption"
    );
    if candidates.is_empty() {
        return Ok(Evaluation::no_op());
    }

    let evaluation = method.compute_command(ctx, budgets, candidates).await?;
    info!(
        reason = %method.reason(),
        decision = %evaluation.command.decision(),
        "disruption command computed"
    );
    Ok(evaluation)
}
