//! nodeshift-state — the cluster model seen by the disruption engine.
//!
//! Provides the object types (nodes, node claims, pods, node pools,
//! instance types), the `StateNode` view that pairs a node with its
//! backing claim, pod predicates, PDB limits, and the `ClusterReader`
//! trait through which live state is fetched.
//!
//! # Architecture
//!
//! ```text
//! ClusterReader (trait)
//!   └── InMemoryCluster ── Arc<RwLock<ClusterSnapshot>>
//! StateNode
//!   ├── validate_node_disruptable()
//!   └── validate_pods_disruptable(pods, &dyn PdbLimits)
//! ```

pub mod clock;
pub mod cluster;
pub mod error;
pub mod node;
pub mod pdb;
pub mod pod;
pub mod types;

pub use clock::{Clock, FakeClock, SystemClock};
pub use cluster::{ClusterReader, ClusterSnapshot, InMemoryCluster};
pub use error::{StateError, StateResult};
pub use node::{PodBlockEviction, StateNode};
pub use pdb::{Limits, PdbLimits, PdbSpec};
pub use types::*;
