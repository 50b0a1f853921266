//! nodeshift scheduling simulation — where would evicted pods go?
//!
//! The disruption engine asks this crate one question: if these nodes
//! went away, could their pods run elsewhere, and what would have to be
//! launched to make that true? Nothing here talks to a cluster; inputs
//! are plain values and the answer is a [`SchedulingResults`].
//!
//! # Components
//!
//! - **`scorer`** — Node scoring (bin-packing, affinity, balance)
//! - **`packer`** — Packing engine (existing nodes first, then replacements)
//! - **`results`** — Simulation outcome and replacement node-claim templates
//! - **`convert`** — Type conversions from cluster state types

pub mod convert;
pub mod packer;
pub mod results;
pub mod scorer;

pub use convert::{pod_to_requirements, state_node_to_resources};
pub use packer::{PackingOptions, PoolCapacity, SimPod, pack};
pub use results::{MAX_INSTANCE_TYPES, NodeClaimTemplate, PodError, SchedulingResults};
pub use scorer::{NodeResources, NodeScore, PlacementRequirements, ScoringWeights, rank_nodes, score_node};
