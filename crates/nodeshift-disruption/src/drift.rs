//! Drift — replace nodes whose configuration no longer matches their pool.
//!
//! Each pass disrupts either every empty drifted node the budgets allow,
//! or at most one non-empty drifted node whose pods are shown to fit
//! elsewhere.
//!
//! ```text
//! candidates ──sort by drift time──▶ empty ones within budget?
//!        yes ──▶ delete them all (no simulation)
//!        no  ──▶ sort by pods waiting eviction ──▶ first that simulates cleanly
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use nodeshift_placement::SchedulingResults;
use nodeshift_state::{ClusterReader, ConditionType, DisruptionReason, pod};

use crate::budget::DisruptionBudgets;
use crate::candidate::Candidate;
use crate::command::Command;
use crate::context::PassContext;
use crate::error::{DisruptionError, DisruptionResult};
use crate::events::{self, Recorder};
use crate::method::{DisruptionClass, Evaluation, Method};
use crate::simulation::{SchedulingSimulator, SimulationError};

pub struct Drift {
    cluster: Arc<dyn ClusterReader>,
    simulator: Arc<dyn SchedulingSimulator>,
    recorder: Arc<dyn Recorder>,
}

impl Drift {
    pub fn new(
        cluster: Arc<dyn ClusterReader>,
        simulator: Arc<dyn SchedulingSimulator>,
        recorder: Arc<dyn Recorder>,
    ) -> Self {
        Self {
            cluster,
            simulator,
            recorder,
        }
    }

    /// Pods on the candidate's node that opt out of disruption but still
    /// await eviction. A failed listing counts as the worst case.
    async fn unevictable_pods(
        &self,
        ctx: &PassContext,
        candidate: &Candidate,
        cache: &mut HashMap<String, usize>,
    ) -> DisruptionResult<usize> {
        if let Some(count) = cache.get(candidate.name()) {
            return Ok(*count);
        }
        match ctx.guard(self.cluster.node_pods(candidate.name())).await? {
            Ok(pods) => {
                let count = pods
                    .iter()
                    .filter(|p| !pod::is_disruptable(p) && pod::is_waiting_eviction(p))
                    .count();
                cache.insert(candidate.name().to_string(), count);
                Ok(count)
            }
            Err(e) => {
                debug!(node = %candidate.name(), error = %e, "listing pods on node");
                Ok(usize::MAX)
            }
        }
    }
}

#[async_trait]
impl Method for Drift {
    fn should_disrupt(&self, candidate: &Candidate) -> bool {
        candidate.node_claim.is_true(ConditionType::Drifted)
    }

    async fn compute_command(
        &self,
        ctx: &PassContext,
        budgets: &mut DisruptionBudgets,
        mut candidates: Vec<Candidate>,
    ) -> DisruptionResult<Evaluation> {
        let reason = self.reason();
        candidates.sort_by_key(|c| c.drifted_since().unwrap_or(u64::MAX));

        let mut empty = Vec::new();
        let mut rest = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if candidate.reschedulable_pods.is_empty()
                && budgets.decrement(&candidate.node_pool.name, reason)
            {
                empty.push(candidate);
            } else {
                rest.push(candidate);
            }
        }
        if !empty.is_empty() {
            debug!(count = empty.len(), "prioritizing empty drift candidates");
            return Ok(Evaluation {
                command: Command::new(empty, Vec::new()),
                results: SchedulingResults::default(),
            });
        }

        let mut cache = HashMap::new();
        let mut ranked = Vec::with_capacity(rest.len());
        for candidate in rest {
            let count = self.unevictable_pods(ctx, &candidate, &mut cache).await?;
            ranked.push((count, candidate));
        }
        ranked.sort_by_key(|(count, _)| *count);

        for (count, candidate) in ranked {
            debug!(
                node = %candidate.name(),
                pods_waiting_eviction = count,
                "drift candidate"
            );

            // Drift commands hold one non-empty candidate, so a skip
            // here never needs to give budget back.
            if budgets.remaining(&candidate.node_pool.name, reason) == 0 {
                debug!(
                    node_claim = %candidate.node_claim.name,
                    node_pool = %candidate.node_pool.name,
                    "drifted nodeclaim skipped, no drift budget remaining"
                );
                continue;
            }

            let simulated = ctx
                .guard(self.simulator.simulate(std::slice::from_ref(&candidate)))
                .await?;
            let results = match simulated {
                Ok(results) => results,
                Err(SimulationError::CandidateDeleting) => {
                    debug!(node = %candidate.name(), "candidate is deleting, skipping");
                    continue;
                }
                Err(SimulationError::Failed(e)) => {
                    return Err(DisruptionError::SimulationFailed(e));
                }
            };

            if !results.all_non_pending_pods_scheduled() {
                let errors = results.non_pending_pod_scheduling_errors();
                debug!(
                    node_claim = %candidate.node_claim.name,
                    failures = results.pod_errors.iter().filter(|e| !e.pending).count(),
                    "drifted nodeclaim skipped, pods could not be rescheduled"
                );
                self.recorder.publish(events::blocked(
                    Some(&candidate.node),
                    Some(&candidate.node_claim),
                    &errors,
                ));
                continue;
            }

            debug!(
                node_claim = %candidate.node_claim.name,
                new_node_claims = results.new_node_claims.len(),
                "returning drift candidate"
            );
            let replacements = results.new_node_claims.clone();
            return Ok(Evaluation {
                command: Command::new(vec![candidate], replacements),
                results,
            });
        }

        Ok(Evaluation::no_op())
    }

    fn reason(&self) -> DisruptionReason {
        DisruptionReason::Drifted
    }

    fn class(&self) -> DisruptionClass {
        DisruptionClass::Eventual
    }

    fn consolidation_type(&self) -> &'static str {
        ""
    }
}
