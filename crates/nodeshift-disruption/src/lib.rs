//! nodeshift disruption engine — which nodes may go, and what replaces them.
//!
//! Turns live node state into validated, cost-ranked [`Candidate`]s and
//! lets a [`Method`] pick a [`Command`] (no-op, delete, or replace)
//! within per-pool, per-reason [`DisruptionBudgets`]. Methods confirm
//! that evicted pods can run elsewhere through a [`SchedulingSimulator`]
//! before committing.
//!
//! # Architecture
//!
//! ```text
//! pass::evaluate
//!   ├── CandidateBuilder::build   (validation, in-flight check, cost)
//!   ├── Method::should_disrupt
//!   └── Method::compute_command   (&mut DisruptionBudgets)
//!         └── Drift
//!               ├── SchedulingSimulator  (ClusterSimulator → placement)
//!               └── Recorder             (blocked events)
//! ```

pub mod budget;
pub mod candidate;
pub mod command;
pub mod context;
pub mod cost;
pub mod drift;
pub mod error;
pub mod events;
pub mod message;
pub mod method;
pub mod pass;
pub mod queue;
pub mod simulation;

#[cfg(test)]
mod fixtures;

pub use budget::DisruptionBudgets;
pub use candidate::{Candidate, CandidateBuilder};
pub use command::{Command, CommandSummary, Decision};
pub use context::PassContext;
pub use drift::Drift;
pub use error::{DisruptionError, DisruptionResult};
pub use events::{Event, EventType, LogRecorder, MemoryRecorder, ObjectRef, Recorder};
pub use message::disruption_message;
pub use method::{DisruptionClass, Evaluation, Method};
pub use queue::{DisruptionQueue, InFlightQueue};
pub use simulation::{ClusterSimulator, SchedulingSimulator, SimulationError};
